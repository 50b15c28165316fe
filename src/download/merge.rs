//! Concatenates part files into the final artifact.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::error::DownloadError;
use super::filename::{final_path, part_path, temp_path};

/// Outcome of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The final artifact.
    pub path: PathBuf,
    /// Its size in bytes.
    pub bytes: u64,
}

/// Merges `<name>.part0..N` under one directory into `<name>`.
#[derive(Debug, Clone)]
pub struct Merger {
    dir: PathBuf,
    filename: String,
    parts: usize,
}

impl Merger {
    /// Creates a merger for `parts` part files.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>, parts: usize) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
            parts,
        }
    }

    /// Concatenates the parts in index order into `<name>.temp`, then moves
    /// it over the final path.
    ///
    /// Nothing is written unless every part exists. Each part is deleted once
    /// consumed; on error the temp file is removed.
    ///
    /// # Errors
    ///
    /// [`DownloadError::PartMissing`] for the first absent part, or
    /// [`DownloadError::Io`] on any file system failure.
    #[instrument(skip(self), fields(filename = %self.filename, parts = self.parts))]
    pub async fn merge(&self) -> Result<MergeOutcome, DownloadError> {
        for index in 0..self.parts {
            let part = part_path(&self.dir, &self.filename, index);
            let exists = tokio::fs::try_exists(&part)
                .await
                .map_err(|e| DownloadError::io(&part, e))?;
            if !exists {
                return Err(DownloadError::part_missing(part));
            }
        }

        let temp = temp_path(&self.dir, &self.filename);
        let bytes = match self.concatenate(&temp).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %temp.display(), "removing temp file after failed merge");
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        let target = final_path(&self.dir, &self.filename);
        replace_file(&temp, &target).await?;
        info!(path = %target.display(), bytes, "parts merged");

        Ok(MergeOutcome {
            path: target,
            bytes,
        })
    }

    async fn concatenate(&self, temp: &Path) -> Result<u64, DownloadError> {
        let file = File::create(temp)
            .await
            .map_err(|e| DownloadError::io(temp, e))?;
        let mut writer = BufWriter::new(file);
        let mut total = 0u64;

        for index in 0..self.parts {
            let part = part_path(&self.dir, &self.filename, index);
            let mut reader = File::open(&part).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::part_missing(&part)
                } else {
                    DownloadError::io(&part, e)
                }
            })?;
            let copied = tokio::io::copy(&mut reader, &mut writer)
                .await
                .map_err(|e| DownloadError::io(temp, e))?;
            drop(reader);
            tokio::fs::remove_file(&part)
                .await
                .map_err(|e| DownloadError::io(&part, e))?;
            debug!(index, copied, "part consumed");
            total += copied;
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(temp, e))?;
        Ok(total)
    }
}

/// Moves `from` over `to`, removing an existing `to` first.
pub(crate) async fn replace_file(from: &Path, to: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(to).await {
        Ok(()) => debug!(path = %to.display(), "replaced existing file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadError::io(to, e)),
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| DownloadError::io(to, e))
}
