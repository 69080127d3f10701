use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    cosine::cosine,
    extract::{Channel, Extractor},
    vector::FrequencyVector,
};
use crate::fetch::{Resource, RetrievalError, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelScore {
    pub channel: Channel,
    pub score: f64,
}

/// Result of comparing two resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub url1: String,
    pub url2: String,
    /// One entry per channel, in `Channel::ALL` order
    pub channels: Vec<ChannelScore>,
    /// Unweighted mean of the channel scores
    pub score: f64,
}

impl Comparison {
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.score)
    }
}

/// Scores a pair of resources across every channel.
pub struct AggregateScorer<R: Retriever> {
    retriever: R,
    extractor: Extractor,
}

impl<R: Retriever> AggregateScorer<R> {
    pub fn new(retriever: R) -> Self {
        Self::with_extractor(retriever, Extractor::default())
    }

    pub fn with_extractor(retriever: R, extractor: Extractor) -> Self {
        Self {
            retriever,
            extractor,
        }
    }

    /// Fetch both identifiers and score them.
    ///
    /// A failed fetch only degrades the body channels; it fails the whole
    /// comparison through the header channel.
    pub fn compare(&self, url1: &str, url2: &str) -> Result<Comparison, RetrievalError> {
        let (fetched1, fetched2) = rayon::join(
            || self.retriever.fetch(url1),
            || self.retriever.fetch(url2),
        );

        let channels = self.score_fetched(&fetched1, &fetched2)?;
        let score = mean(&channels);

        log::debug!("{url1} <> {url2}: {score}");

        Ok(Comparison {
            url1: url1.to_string(),
            url2: url2.to_string(),
            channels,
            score,
        })
    }

    /// Channel scores for two already fetched resources, in `Channel::ALL` order.
    pub fn score_fetched(
        &self,
        fetched1: &Result<Resource, RetrievalError>,
        fetched2: &Result<Resource, RetrievalError>,
    ) -> Result<Vec<ChannelScore>, RetrievalError> {
        Channel::ALL
            .par_iter()
            .map(|&channel| -> Result<ChannelScore, RetrievalError> {
                let v1: FrequencyVector<String> =
                    self.extractor.extract(channel, fetched1)?.into_iter().collect();
                let v2: FrequencyVector<String> =
                    self.extractor.extract(channel, fetched2)?.into_iter().collect();

                let score = cosine(&v1, &v2);
                log::trace!(
                    "{channel}: {} vs {} distinct tokens, score {score}",
                    v1.len(),
                    v2.len()
                );

                Ok(ChannelScore { channel, score })
            })
            .collect()
    }
}

/// Mean summed in slice order so the result is reproducible.
fn mean(channels: &[ChannelScore]) -> f64 {
    if channels.is_empty() {
        return 0.0;
    }
    let total: f64 = channels.iter().map(|c| c.score).sum();
    total / channels.len() as f64
}
