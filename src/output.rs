//! Feed persistence: writes published snapshots to disk for static hosting.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::errors::ProducerError;
use crate::feed::{FeedListener, FeedSnapshot};

/// Writes every full dataset to `path`, replacing the previous file
/// atomically so readers never see a partial feed.
///
/// Differential messages are not written; the file always holds a complete
/// dataset.
pub struct FeedFileWriter {
    path: PathBuf,
    gzip: bool,
}

impl FeedFileWriter {
    pub fn new(path: impl Into<PathBuf>, gzip: bool) -> Self {
        Self {
            path: path.into(),
            gzip,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_snapshot(&self, snapshot: &FeedSnapshot) -> Result<(), ProducerError> {
        let encoded = snapshot.to_bytes();
        let body = if self.gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&encoded)?;
            encoder.finish()?
        } else {
            encoded
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &body)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            bytes = body.len(),
            index = snapshot.incremental_index(),
            "Feed written"
        );
        Ok(())
    }
}

impl FeedListener for FeedFileWriter {
    fn on_full_update(&self, snapshot: &FeedSnapshot) {
        if let Err(e) = self.write_snapshot(snapshot) {
            error!(path = %self.path.display(), error = %e, "Failed to write feed");
        }
    }

    fn on_differential_update(&self, delta: &FeedSnapshot) {
        debug!(
            path = %self.path.display(),
            index = delta.incremental_index(),
            "Differential update not written"
        );
    }
}
