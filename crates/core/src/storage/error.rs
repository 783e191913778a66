use std::fmt;
use std::path::PathBuf;

/// A stored document that exists but could not be read back. Callers usually log it and
/// treat the document as absent for the current run.
#[derive(Debug, Clone)]
pub struct ArchiveReadError {
    pub path: PathBuf,
    pub stage: &'static str,
    pub detail: String,
}

impl fmt::Display for ArchiveReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "archive read error (path={}, stage={}): {}",
            self.path.display(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for ArchiveReadError {}
