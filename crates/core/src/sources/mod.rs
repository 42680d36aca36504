pub mod files;
pub mod github;
pub mod pdf;
pub mod website;

use crate::models::Document;

/// Outcome of one fetch run. Fetching is best-effort per item: a source that
/// fails to load is recorded and skipped, never aborts the run.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedSource>,
}

#[derive(Debug)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}
