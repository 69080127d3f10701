mod app;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fetch::{decode_body, Resource, RetrievalError, Retriever};

/// Retriever serving canned pages. Unknown identifiers fail with a 404.
#[derive(Default)]
pub struct StaticRetriever {
    pages: HashMap<String, Resource>,
    fetches: AtomicUsize,
}

impl StaticRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, identifier: &str, body: &str, headers: &[&str]) -> Self {
        self.raw_page(identifier, body.as_bytes(), headers)
    }

    /// Page served as raw bytes, decoded the way the http retriever decodes them.
    pub fn raw_page(mut self, identifier: &str, body: &[u8], headers: &[&str]) -> Self {
        self.pages.insert(
            identifier.to_string(),
            Resource {
                identifier: identifier.to_string(),
                body: decode_body(identifier, body.to_vec()),
                headers: headers
                    .iter()
                    .map(|name| (name.to_string(), "x".to_string()))
                    .collect(),
            },
        );
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Retriever for StaticRetriever {
    fn fetch(&self, identifier: &str) -> Result<Resource, RetrievalError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(identifier)
            .cloned()
            .ok_or_else(|| RetrievalError::Status {
                identifier: identifier.to_string(),
                status: 404,
            })
    }
}
