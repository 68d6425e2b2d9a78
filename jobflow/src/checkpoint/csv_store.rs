//! CSV-backed checkpoint store.

use super::{CheckpointKind, CheckpointRecords, CheckpointStore};
use crate::core::{CoverLetter, JobPosting};
use crate::errors::CheckpointError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One row of the cover-letters checkpoint.
#[derive(Debug, Serialize, Deserialize)]
struct CoverLetterRow {
    job_title: String,
    #[serde(default)]
    company: String,
    job_link: String,
    #[serde(default)]
    job_description: String,
    #[serde(default)]
    cover_letter: String,
}

impl From<&CoverLetter> for CoverLetterRow {
    fn from(letter: &CoverLetter) -> Self {
        Self {
            job_title: letter.job.title.clone(),
            company: letter.job.company.clone(),
            job_link: letter.job.link.clone(),
            job_description: letter.job.description.clone(),
            cover_letter: letter.letter_text.clone(),
        }
    }
}

impl From<CoverLetterRow> for CoverLetter {
    fn from(row: CoverLetterRow) -> Self {
        Self::new(
            JobPosting::new(row.job_title, row.company, row.job_link, row.job_description),
            row.cover_letter,
        )
    }
}

/// Stores checkpoints as CSV files with a header row in a workspace directory.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written checkpoint.
#[derive(Debug, Clone)]
pub struct CsvCheckpointStore {
    dir: PathBuf,
}

impl CsvCheckpointStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The workspace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn write_rows<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp = path.with_extension("csv.tmp");
        let csv_err = |source| CheckpointError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(&tmp).map_err(csv_err)?;
        for row in rows {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        drop(writer);

        fs::rename(&tmp, path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_header_only(&self, path: &Path, kind: CheckpointKind) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut writer = csv::Writer::from_path(path).map_err(|source| CheckpointError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        writer
            .write_record(kind.columns())
            .map_err(|source| CheckpointError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_rows<T>(path: &Path) -> Result<Option<Vec<T>>, CheckpointError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !path.exists() {
            return Ok(None);
        }
        let csv_err = |source| CheckpointError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(csv_err)?;

        Ok(if rows.is_empty() { None } else { Some(rows) })
    }
}

impl CheckpointStore for CsvCheckpointStore {
    fn save(&self, records: &CheckpointRecords) -> Result<(), CheckpointError> {
        let path = self.path_for(records.kind());
        match records {
            // A header-only file still marks the checkpoint as written.
            CheckpointRecords::Jobs(jobs) if jobs.is_empty() => {
                self.write_header_only(&path, CheckpointKind::Jobs)?;
            }
            CheckpointRecords::CoverLetters(letters) if letters.is_empty() => {
                self.write_header_only(&path, CheckpointKind::CoverLetters)?;
            }
            CheckpointRecords::Jobs(jobs) => self.write_rows(&path, jobs)?,
            CheckpointRecords::CoverLetters(letters) => {
                let rows: Vec<CoverLetterRow> = letters.iter().map(CoverLetterRow::from).collect();
                self.write_rows(&path, &rows)?;
            }
        }
        debug!(
            kind = %records.kind(),
            rows = records.len(),
            path = %path.display(),
            "Checkpoint saved"
        );
        Ok(())
    }

    fn load(&self, kind: CheckpointKind) -> Result<Option<CheckpointRecords>, CheckpointError> {
        let path = self.path_for(kind);
        Ok(match kind {
            CheckpointKind::Jobs => {
                Self::read_rows::<JobPosting>(&path)?.map(CheckpointRecords::Jobs)
            }
            CheckpointKind::CoverLetters => Self::read_rows::<CoverLetterRow>(&path)?
                .map(|rows| CheckpointRecords::CoverLetters(rows.into_iter().map(Into::into).collect())),
        })
    }

    fn clear(&self, kind: CheckpointKind) -> Result<(), CheckpointError> {
        let path = self.path_for(kind);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(kind = %kind, path = %path.display(), "Checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }

    fn location(&self, kind: CheckpointKind) -> Option<PathBuf> {
        Some(self.path_for(kind))
    }
}
