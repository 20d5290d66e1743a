//! Image record data model.
//!
//! An [`ImageSet`] owns the per-image records for one job. Records are created
//! once from the extracted files, keep their sequence index for the job's
//! lifetime, and only ever advance forward through the processing states.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Processing state of a single image.
///
/// States advance forward only: `Pending -> Normalized -> Verified`, or
/// terminate at `Failed` from either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageState {
    /// Freshly discovered, not yet processed.
    Pending,
    /// Rewritten into a clean, compatible form.
    Normalized,
    /// Excluded after a per-image failure.
    Failed,
    /// Passed the decode check and will appear in the manifest.
    Verified,
}

impl ImageState {
    /// Whether the state accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageState::Verified | ImageState::Failed)
    }
}

impl std::fmt::Display for ImageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageState::Pending => write!(f, "pending"),
            ImageState::Normalized => write!(f, "normalized"),
            ImageState::Failed => write!(f, "failed"),
            ImageState::Verified => write!(f, "verified"),
        }
    }
}

/// One image in a job, identified by its sequence index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Position in the original extraction order; never changes.
    pub index: usize,
    /// Path to the image file inside the job's temporary area.
    pub source_path: PathBuf,
    /// Current processing state.
    pub state: ImageState,
    /// Error detail attached when the record fails.
    pub error: Option<String>,
}

/// Ordered collection of all image records for one job.
#[derive(Debug, Default)]
pub struct ImageSet {
    records: Vec<ImageRecord>,
}

impl ImageSet {
    /// Create a set of Pending records from paths in extraction order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        let records = paths
            .into_iter()
            .enumerate()
            .map(|(index, source_path)| ImageRecord {
                index,
                source_path,
                state: ImageState::Pending,
                error: None,
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    /// Number of records currently in the given state.
    pub fn count_in(&self, state: ImageState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }

    /// Dispatch list of (index, path) for records in the given state, in
    /// ascending sequence order.
    pub fn items_in(&self, state: ImageState) -> Vec<(usize, PathBuf)> {
        self.records
            .iter()
            .filter(|r| r.state == state)
            .map(|r| (r.index, r.source_path.clone()))
            .collect()
    }

    /// Paths of Verified records in original order, for the manifest.
    pub fn verified_paths(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter(|r| r.state == ImageState::Verified)
            .map(|r| r.source_path.clone())
            .collect()
    }

    /// Advance a record from Pending to Normalized.
    ///
    /// Returns false (and leaves the record untouched) if the record does not
    /// exist or is not Pending.
    pub fn mark_normalized(&mut self, index: usize) -> bool {
        match self.records.get_mut(index) {
            Some(record) if record.state == ImageState::Pending => {
                record.state = ImageState::Normalized;
                true
            }
            _ => false,
        }
    }

    /// Advance a record from Normalized to Verified.
    pub fn mark_verified(&mut self, index: usize) -> bool {
        match self.records.get_mut(index) {
            Some(record) if record.state == ImageState::Normalized => {
                record.state = ImageState::Verified;
                true
            }
            _ => false,
        }
    }

    /// Terminate a non-terminal record at Failed, attaching the error detail.
    pub fn mark_failed(&mut self, index: usize, detail: impl Into<String>) -> bool {
        match self.records.get_mut(index) {
            Some(record) if !record.state.is_terminal() => {
                record.state = ImageState::Failed;
                record.error = Some(detail.into());
                true
            }
            _ => false,
        }
    }
}
