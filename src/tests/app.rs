use std::sync::Mutex;

use super::StaticRetriever;
use crate::app::{App, AppError};
use crate::cache::{CacheError, CacheRecord, CsvScoreCache, RecordOutcome, ScoreCache};
use crate::fetch::RetrievalError;

const HEADERS: &[&str] = &["content-type", "server"];

fn retriever() -> StaticRetriever {
    StaticRetriever::new()
        .page(
            "https://a.com",
            r#"the cat sat <a href="/x">x</a><a href="/x">x</a><a href="/y">y</a>"#,
            HEADERS,
        )
        .page("https://b.com", r#"a cat sat <a href="/y">y</a>"#, HEADERS)
        .page("https://c.com", "nothing alike", &["etag"])
}

/// Creates an App over canned pages and a score store in a temp directory.
fn create_app(canonical_keys: bool) -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let cache = CsvScoreCache::load(&tmp.path().join("scores.csv")).unwrap();
    let app = App::with_parts(Box::new(retriever()), Box::new(cache), canonical_keys);
    (app, tmp)
}

/// Score store whose writes always fail.
#[derive(Default)]
struct BrokenCache {
    attempts: Mutex<Vec<(String, String, f64)>>,
}

impl ScoreCache for BrokenCache {
    fn record(&self, url1: &str, url2: &str, score: f64) -> Result<RecordOutcome, CacheError> {
        self.attempts
            .lock()
            .unwrap()
            .push((url1.to_string(), url2.to_string(), score));
        Err(CacheError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }

    fn get(&self, _url1: &str, _url2: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(None)
    }

    fn list(&self) -> Result<Vec<CacheRecord>, CacheError> {
        Ok(vec![])
    }

    fn mark_stale(&self, _url1: &str, _url2: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn mark_all_stale(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

#[test]
fn compare_persists_score() {
    let (app, _tmp) = create_app(false);

    let comparison = app
        .compare_similarity("https://a.com", "https://b.com")
        .unwrap();
    assert!(comparison.score > 0.0 && comparison.score <= 1.0);

    let record = app.cached("https://a.com", "https://b.com").unwrap().unwrap();
    assert_eq!(record.score, comparison.score);
    assert!(!record.stale);
}

#[test]
fn compare_is_recomputed_but_store_is_monotonic() {
    let (app, _tmp) = create_app(false);

    let first = app
        .compare_similarity("https://a.com", "https://b.com")
        .unwrap();
    let second = app
        .compare_similarity("https://a.com", "https://b.com")
        .unwrap();
    assert_eq!(first.score, second.score);
    assert_eq!(app.records().unwrap().len(), 1);
}

#[test]
fn stale_record_takes_a_lower_score() {
    let (app, tmp) = create_app(false);

    // seed a higher score than the pages will produce
    let seeded = CsvScoreCache::load(&tmp.path().join("scores.csv")).unwrap();
    seeded.record("https://a.com", "https://c.com", 0.9).unwrap();

    let comparison = app
        .compare_similarity("https://a.com", "https://c.com")
        .unwrap();
    assert!(comparison.score < 0.9);
    assert_eq!(
        app.cached("https://a.com", "https://c.com").unwrap().unwrap().score,
        0.9
    );

    assert!(app.mark_stale("https://a.com", "https://c.com").unwrap());
    app.compare_similarity("https://a.com", "https://c.com")
        .unwrap();
    assert_eq!(
        app.cached("https://a.com", "https://c.com").unwrap().unwrap().score,
        comparison.score
    );
}

#[test]
fn reversed_pair_gets_its_own_record() {
    let (app, _tmp) = create_app(false);

    app.compare_similarity("https://a.com", "https://b.com")
        .unwrap();
    app.compare_similarity("https://b.com", "https://a.com")
        .unwrap();

    assert_eq!(app.records().unwrap().len(), 2);
}

#[test]
fn canonical_keys_share_one_record() {
    let (app, _tmp) = create_app(true);

    let comparison = app
        .compare_similarity("https://b.com", "https://a.com")
        .unwrap();
    app.compare_similarity("https://a.com", "https://b.com")
        .unwrap();

    let records = app.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url1, "https://a.com");
    assert_eq!(records[0].url2, "https://b.com");
    assert_eq!(comparison.url1, "https://b.com");
    assert!(app.cached("https://b.com", "https://a.com").unwrap().is_some());
}

#[test]
fn retrieval_failure_writes_nothing() {
    let (app, _tmp) = create_app(false);

    let err = app
        .compare_similarity("https://a.com", "https://gone.com")
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Retrieval(RetrievalError::Status { status: 404, .. })
    ));
    assert!(app.records().unwrap().is_empty());
}

#[test]
fn cache_failure_still_returns_the_score() {
    let app = App::with_parts(Box::new(retriever()), Box::new(BrokenCache::default()), false);

    let err = app
        .compare_similarity("https://a.com", "https://b.com")
        .unwrap_err();

    match err {
        AppError::CacheWrite { comparison, source } => {
            assert!(comparison.score > 0.0);
            assert!(matches!(source, CacheError::Io(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn mark_all_stale_through_app() {
    let (app, _tmp) = create_app(false);
    app.compare_similarity("https://a.com", "https://b.com")
        .unwrap();
    app.compare_similarity("https://a.com", "https://c.com")
        .unwrap();

    assert_eq!(app.mark_all_stale().unwrap(), 2);
    assert!(app.records().unwrap().iter().all(|r| r.stale));
}
