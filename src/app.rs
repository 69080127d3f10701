use crate::{
    cache::{CacheError, CacheRecord, CsvScoreCache, RecordOutcome, ScoreCache},
    config::Config,
    fetch::{HttpRetriever, RetrievalError, Retriever},
    similarity::{AggregateScorer, Comparison},
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The comparison finished but its score could not be persisted.
    #[error("score computed but not persisted: {source}")]
    CacheWrite {
        comparison: Box<Comparison>,
        source: CacheError,
    },

    #[error("score store error: {0}")]
    Cache(#[from] CacheError),
}

pub struct App {
    scorer: AggregateScorer<Box<dyn Retriever>>,
    cache: Box<dyn ScoreCache>,
    canonical_keys: bool,
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let retriever = HttpRetriever::new(&config.fetch)?;
        let cache = CsvScoreCache::load(&config.cache_path())?;

        Ok(Self::with_parts(
            Box::new(retriever),
            Box::new(cache),
            config.cache.canonical_keys,
        ))
    }

    pub fn with_parts(
        retriever: Box<dyn Retriever>,
        cache: Box<dyn ScoreCache>,
        canonical_keys: bool,
    ) -> Self {
        Self {
            scorer: AggregateScorer::new(retriever),
            cache,
            canonical_keys,
        }
    }

    /// Store key for a pair: as given, or sorted when canonical keys are on.
    fn cache_key<'a>(&self, url1: &'a str, url2: &'a str) -> (&'a str, &'a str) {
        if self.canonical_keys && url2 < url1 {
            (url2, url1)
        } else {
            (url1, url2)
        }
    }

    /// Score two resources and persist the result.
    ///
    /// The score is always recomputed; the store decides whether it replaces
    /// the previously persisted value.
    pub fn compare_similarity(&self, url1: &str, url2: &str) -> Result<Comparison, AppError> {
        let span = tracing::info_span!("compare", url1, url2);
        let _enter = span.enter();

        let comparison = self.scorer.compare(url1, url2)?;

        let (key1, key2) = self.cache_key(url1, url2);
        match self.cache.record(key1, key2, comparison.score) {
            Ok(RecordOutcome::Unchanged { stored }) => {
                log::info!("kept stored score {stored} over {}", comparison.score);
            }
            Ok(outcome) => {
                log::info!("persisted score {} ({outcome:?})", comparison.score);
            }
            Err(source) => {
                log::error!("failed to persist score: {source}");
                return Err(AppError::CacheWrite {
                    comparison: Box::new(comparison),
                    source,
                });
            }
        }

        Ok(comparison)
    }

    pub fn cached(&self, url1: &str, url2: &str) -> Result<Option<CacheRecord>, AppError> {
        let (key1, key2) = self.cache_key(url1, url2);
        Ok(self.cache.get(key1, key2)?)
    }

    pub fn records(&self) -> Result<Vec<CacheRecord>, AppError> {
        Ok(self.cache.list()?)
    }

    pub fn mark_stale(&self, url1: &str, url2: &str) -> Result<bool, AppError> {
        let (key1, key2) = self.cache_key(url1, url2);
        Ok(self.cache.mark_stale(key1, key2)?)
    }

    pub fn mark_all_stale(&self) -> Result<usize, AppError> {
        Ok(self.cache.mark_all_stale()?)
    }
}
