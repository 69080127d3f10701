//! Per-channel token extraction.
//!
//! Each channel turns a fetched resource into an ordered token sequence:
//!
//! - `words`: alphanumeric words of the body, lower-cased, stop words removed
//! - `links`: destinations of `<a href="...">` anchors
//! - `stylesheets`: destinations of `<link href="....css"` elements
//! - `scripts`: sources of `<script src="....js"` elements
//! - `headers`: response header names, one per returned entry
//!
//! Body channels treat a failed retrieval, or a body that did not decode, as
//! an empty body. The header channel has nothing to fall back on when the
//! retrieval itself failed and reports the failure instead.

use std::collections::HashSet;
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fetch::{Resource, RetrievalError};

/// Stop words dropped from the word channel.
pub const STOP_WORDS: [&str; 25] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-zA-Z]+").expect("Failed to compile word regex"));

static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href="([^"]+)">"#).expect("Failed to compile link regex"));

static STYLESHEET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link href="([^"]+\.css)""#).expect("Failed to compile stylesheet regex")
});

static SCRIPT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<script src="([^"]+\.js)""#).expect("Failed to compile script regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Words,
    Links,
    Stylesheets,
    Scripts,
    Headers,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Words,
        Channel::Links,
        Channel::Stylesheets,
        Channel::Scripts,
        Channel::Headers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Words => "words",
            Channel::Links => "links",
            Channel::Stylesheets => "stylesheets",
            Channel::Scripts => "scripts",
            Channel::Headers => "headers",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Token extraction for all five channels.
#[derive(Debug, Clone)]
pub struct Extractor {
    stop_words: HashSet<String>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(STOP_WORDS)
    }
}

impl Extractor {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stop_words: stop_words.into_iter().map(Into::into).collect(),
        }
    }

    /// Tokens of `channel` for a fetched resource.
    pub fn extract(
        &self,
        channel: Channel,
        fetched: &Result<Resource, RetrievalError>,
    ) -> Result<Vec<String>, RetrievalError> {
        let resource = match (channel, fetched) {
            (_, Ok(resource)) => resource,
            (Channel::Headers, Err(err)) => return Err(err.clone()),
            (_, Err(err)) => {
                log::debug!("{channel}: {err}, treating body as empty");
                return Ok(Vec::new());
            }
        };

        if channel == Channel::Headers {
            return Ok(header_names(&resource.headers));
        }

        let body = match &resource.body {
            Ok(body) => body,
            Err(err) => {
                log::debug!("{channel}: {err}, treating body as empty");
                return Ok(Vec::new());
            }
        };

        let tokens = match channel {
            Channel::Words => self.words(body),
            Channel::Links => links(body),
            Channel::Stylesheets => stylesheets(body),
            Channel::Scripts => scripts(body),
            Channel::Headers => header_names(&resource.headers),
        };

        Ok(tokens)
    }

    pub fn words(&self, text: &str) -> Vec<String> {
        NON_ALPHANUMERIC
            .replace_all(text, " ")
            .to_ascii_lowercase()
            .split_whitespace()
            .filter(|word| !self.stop_words.contains(*word))
            .map(str::to_string)
            .collect()
    }
}

fn captures(regex: &Regex, text: &str) -> Vec<String> {
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn links(html: &str) -> Vec<String> {
    captures(&LINK_REGEX, html)
}

pub fn stylesheets(html: &str) -> Vec<String> {
    captures(&STYLESHEET_REGEX, html)
}

pub fn scripts(html: &str) -> Vec<String> {
    captures(&SCRIPT_REGEX, html)
}

pub fn header_names(headers: &[(String, String)]) -> Vec<String> {
    headers.iter().map(|(name, _)| name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(body: &str) -> Result<Resource, RetrievalError> {
        Ok(Resource {
            identifier: "https://example.com".into(),
            body: Ok(body.into()),
            headers: vec![
                ("content-type".into(), "text/html".into()),
                ("set-cookie".into(), "a=1".into()),
                ("set-cookie".into(), "b=2".into()),
            ],
        })
    }

    fn failed() -> Result<Resource, RetrievalError> {
        Err(RetrievalError::Status {
            identifier: "https://example.com".into(),
            status: 404,
        })
    }

    #[test]
    fn test_words_drop_stop_words() {
        let extractor = Extractor::default();
        assert_eq!(extractor.words("the cat sat"), vec!["cat", "sat"]);
        assert_eq!(extractor.words("a cat sat"), vec!["cat", "sat"]);
    }

    #[test]
    fn test_words_normalise_punctuation_and_case() {
        let extractor = Extractor::default();
        let words = extractor.words("<p>Hello, WORLD!</p> rust-lang_2024");
        assert_eq!(words, vec!["p", "hello", "world", "p", "rust", "lang", "2024"]);
    }

    #[test]
    fn test_words_keep_short_tokens() {
        let extractor = Extractor::default();
        assert_eq!(extractor.words("x y an z"), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_words_injected_stop_words() {
        let extractor = Extractor::new(["cat"]);
        assert_eq!(extractor.words("the cat sat"), vec!["the", "sat"]);
    }

    #[test]
    fn test_stop_word_list_size() {
        assert_eq!(STOP_WORDS.len(), 25);
    }

    #[test]
    fn test_links_verbatim() {
        let html = r#"<a href="/x">x</a><a href="/x">again</a><a href="https://b.com/?q=1">b</a>
            <a class="nav" href="/skipped">nope</a>"#;
        assert_eq!(links(html), vec!["/x", "/x", "https://b.com/?q=1"]);
    }

    #[test]
    fn test_stylesheets_require_css_suffix() {
        let html = r#"<link href="/main.css" rel="stylesheet">
            <link href="/favicon.ico" rel="icon">
            <link href="/maincss">
            <link rel="stylesheet" href="/other.css">"#;
        assert_eq!(stylesheets(html), vec!["/main.css"]);
    }

    #[test]
    fn test_scripts_require_js_suffix() {
        let html = r#"<script src="/app.js"></script><script src="/data.json"></script>
            <script src="https://cdn.example.com/lib.min.js" defer></script>"#;
        assert_eq!(scripts(html), vec!["/app.js", "https://cdn.example.com/lib.min.js"]);
    }

    #[test]
    fn test_header_names_one_per_entry() {
        let extractor = Extractor::default();
        let tokens = extractor.extract(Channel::Headers, &resource("")).unwrap();
        assert_eq!(tokens, vec!["content-type", "set-cookie", "set-cookie"]);
    }

    #[test]
    fn test_failed_retrieval_is_empty_body() {
        let extractor = Extractor::default();
        for channel in [
            Channel::Words,
            Channel::Links,
            Channel::Stylesheets,
            Channel::Scripts,
        ] {
            assert!(extractor.extract(channel, &failed()).unwrap().is_empty());
        }
    }

    #[test]
    fn test_undecodable_body_keeps_headers() {
        let extractor = Extractor::default();
        let fetched = resource("").map(|resource| Resource {
            body: Err(RetrievalError::Decoding {
                identifier: resource.identifier.clone(),
                reason: "invalid utf-8 sequence of 1 bytes from index 3".into(),
            }),
            ..resource
        });

        for channel in &Channel::ALL[..4] {
            assert!(extractor.extract(*channel, &fetched).unwrap().is_empty());
        }
        let headers = extractor.extract(Channel::Headers, &fetched).unwrap();
        assert_eq!(headers, vec!["content-type", "set-cookie", "set-cookie"]);
    }

    #[test]
    fn test_failed_retrieval_fails_headers() {
        let extractor = Extractor::default();
        let err = extractor.extract(Channel::Headers, &failed()).unwrap_err();
        assert!(matches!(err, RetrievalError::Status { status: 404, .. }));
    }

    #[test]
    fn test_channel_names() {
        let names: Vec<_> = Channel::ALL.iter().map(Channel::name).collect();
        assert_eq!(names, vec!["words", "links", "stylesheets", "scripts", "headers"]);
    }
}
