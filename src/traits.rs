use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::harvest::harvest_sites;
use crate::model::StaticUsageRecord;
use crate::parse::{ParserInitError, SourceParser};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Parser initialization failed: {0}")]
    Parser(#[from] ParserInitError),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Scans one file for regex usage sites.
///
/// The per-connection queue worker is generic over this seam so ordering and
/// failure behavior can be tested with mock extractors.
#[async_trait]
pub trait SiteExtractor: Send + Sync {
    /// Returns every regex-construction or implicit-use site in the file.
    ///
    /// An unparsable file is not an error: it yields an empty record set.
    /// I/O faults (e.g. a missing file) do surface as errors and abort the
    /// current task.
    async fn scan(&self, path: &str) -> Result<Vec<StaticUsageRecord>, ScanError>;
}

/// Production extractor: reads the file, parses it, harvests sites.
///
/// Parse and harvest run on a blocking thread; the syntax-tree walk is
/// CPU-bound.
pub struct FileSiteExtractor;

#[async_trait]
impl SiteExtractor for FileSiteExtractor {
    async fn scan(&self, path: &str) -> Result<Vec<StaticUsageRecord>, ScanError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let path = path.to_string();

        let records = tokio::task::spawn_blocking(move || -> Result<_, ScanError> {
            let mut parser = SourceParser::new()?;
            match parser.parse(&contents) {
                Some(tree) => Ok(harvest_sites(&tree, &contents, &path)),
                None => {
                    debug!(path = %path, "file is unparsable, reporting zero sites");
                    Ok(Vec::new())
                }
            }
        })
        .await
        .map_err(|err| ScanError::Unknown(format!("scan task join error: {err}")))??;

        Ok(records)
    }
}
