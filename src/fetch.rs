use std::{error::Error, thread::sleep, time::Duration};

use reqwest::StatusCode;

use crate::config::FetchConfig;

/// Raw content and response metadata for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub identifier: String,
    /// Decoded body. A body that is not valid UTF-8 is kept as its error so
    /// the headers stay usable.
    pub body: Result<String, RetrievalError>,
    /// Header entries as the http stack returns them (grouped by name), one per value.
    pub headers: Vec<(String, String)>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("{identifier}: invalid identifier: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("{identifier}: {message}")]
    Network { identifier: String, message: String },

    #[error("{identifier}: server responded with {status}")]
    Status { identifier: String, status: u16 },

    #[error("{identifier}: body is not valid utf-8: {reason}")]
    Decoding { identifier: String, reason: String },
}

/// Source of raw resource content.
pub trait Retriever: Send + Sync {
    fn fetch(&self, identifier: &str) -> Result<Resource, RetrievalError>;
}

impl<R: Retriever + ?Sized> Retriever for Box<R> {
    fn fetch(&self, identifier: &str) -> Result<Resource, RetrievalError> {
        (**self).fetch(identifier)
    }
}

impl<R: Retriever + ?Sized> Retriever for &R {
    fn fetch(&self, identifier: &str) -> Result<Resource, RetrievalError> {
        (**self).fetch(identifier)
    }
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

pub struct HttpRetriever {
    client: reqwest::blocking::Client,
    retries: u8,
}

impl HttpRetriever {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let mut client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            log::debug!("using proxy {proxy:#?}");
            client = client.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: client.build()?,
            retries: config.retries,
        })
    }

    fn request_once(
        &self,
        identifier: &str,
        url: &reqwest::Url,
    ) -> Result<Resource, RetrievalError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| RetrievalError::Network {
                identifier: identifier.to_string(),
                message: get_error(&err),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                identifier: identifier.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect::<Vec<_>>();

        let bytes = resp.bytes().map_err(|err| RetrievalError::Network {
            identifier: identifier.to_string(),
            message: get_error(&err),
        })?;

        Ok(Resource {
            identifier: identifier.to_string(),
            body: decode_body(identifier, bytes.to_vec()),
            headers,
        })
    }
}

/// Strict UTF-8 decoding of a response body.
pub fn decode_body(identifier: &str, bytes: Vec<u8>) -> Result<String, RetrievalError> {
    String::from_utf8(bytes).map_err(|e| RetrievalError::Decoding {
        identifier: identifier.to_string(),
        reason: e.utf8_error().to_string(),
    })
}

/// Parse an identifier into a fetchable url. Scheme-relative identifiers
/// are upgraded to https.
pub fn parse_identifier(identifier: &str) -> Result<reqwest::Url, RetrievalError> {
    let url = if identifier.starts_with("//") {
        format!("https:{identifier}")
    } else {
        identifier.to_string()
    };

    reqwest::Url::parse(&url).map_err(|e| RetrievalError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: e.to_string(),
    })
}

impl Retriever for HttpRetriever {
    fn fetch(&self, identifier: &str) -> Result<Resource, RetrievalError> {
        let url = parse_identifier(identifier)?;

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            log::debug!("{identifier}: requesting (attempt {attempt})");

            match self.request_once(identifier, &url) {
                Ok(resource) => {
                    match &resource.body {
                        Ok(body) => log::debug!(
                            "{identifier}: {} bytes, {} headers",
                            body.len(),
                            resource.headers.len()
                        ),
                        Err(err) => log::warn!("{err}"),
                    }
                    return Ok(resource);
                }
                Err(err) if attempt <= self.retries as u64 && is_retryable(&err) => {
                    log::debug!("{err}: retrying");
                    if matches!(
                        err,
                        RetrievalError::Status { status, .. }
                            if status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    ) {
                        sleep(Duration::from_secs(attempt * 4));
                    }
                }
                Err(err) => {
                    log::warn!("{err}");
                    return Err(err);
                }
            }
        }
    }
}

fn is_retryable(err: &RetrievalError) -> bool {
    match err {
        RetrievalError::InvalidIdentifier { .. } | RetrievalError::Decoding { .. } => false,
        RetrievalError::Network { .. } => true,
        RetrievalError::Status { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
    }
}
