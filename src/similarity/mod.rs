//! Multi-channel similarity between two web resources.
//!
//! - `vector`: sparse token frequency vectors
//! - `cosine`: cosine similarity over frequency vectors
//! - `extract`: token extraction for the five channels
//! - `aggregate`: fetch, extract, score and average

mod aggregate;
mod cosine;
mod extract;
mod vector;

pub use aggregate::{AggregateScorer, Comparison};
pub use extract::{Channel, Extractor};
