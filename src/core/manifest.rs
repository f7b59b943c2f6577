//! Entry store persisted as a CSV manifest.
//!
//! One row per media item, keyed by canonical source URL. Loading is
//! tolerant: a missing or unreadable file yields an empty store, bad rows
//! are skipped, and legacy header names are accepted. Saving writes every
//! column in a fixed order and replaces the file atomically.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::entry::present;
use crate::domain::{Column, Entry, EntryPatch, ItemId};

/// Manifest file name used when none is configured
pub const DEFAULT_MANIFEST_FILE: &str = "processing_manifest.csv";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Manifest has no identity column (expected 'source_url')")]
    MissingIdentityColumn,

    #[error("Failed to flush CSV buffer: {0}")]
    Buffer(String),
}

impl ManifestError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// In-memory manifest plus the file it persists to
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Manifest {
    /// An empty store bound to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Load the manifest, falling back to an empty store on any failure.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No manifest yet, starting fresh");
                return Self::empty(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read manifest, starting with an empty one");
                return Self::empty(path);
            }
        };

        match Self::parse(&bytes) {
            Ok(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "Loaded manifest");
                Self { path, entries }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Manifest is unreadable, starting with an empty one");
                Self::empty(path)
            }
        }
    }

    /// Parse manifest CSV bytes into entries.
    ///
    /// Rows without an identity are dropped; for duplicate identities the
    /// first row wins.
    pub fn parse(bytes: &[u8]) -> Result<Vec<Entry>, ManifestError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let columns: Vec<Option<Column>> = headers.iter().map(Column::from_header).collect();
        let identity_index = columns
            .iter()
            .position(|c| *c == Some(Column::SourceUrl))
            .ok_or(ManifestError::MissingIdentityColumn)?;

        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(row = row + 1, error = %e, "Skipping unreadable manifest row");
                    continue;
                }
            };

            let Some(raw_identity) = present(record.get(identity_index)) else {
                warn!(row = row + 1, "Skipping manifest row without a source URL");
                continue;
            };
            let identity = ItemId::parse(raw_identity)
                .map(|id| id.to_string())
                .unwrap_or_else(|_| raw_identity.to_string());

            if !seen.insert(identity.clone()) {
                warn!(row = row + 1, item = %identity, "Duplicate manifest row, keeping the first");
                continue;
            }

            let mut entry = Entry::new(identity);
            for (cell, column) in record.iter().zip(&columns) {
                if let Some(column) = column {
                    entry.set(*column, Some(cell));
                }
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Serialize every entry with the full column set, in header order
    pub fn to_csv(&self) -> Result<Vec<u8>, ManifestError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(Column::ALL.iter().map(|c| c.as_str()))?;
        for entry in &self.entries {
            writer.write_record(
                Column::ALL
                    .iter()
                    .map(|c| entry.get(*c).unwrap_or_default()),
            )?;
        }
        writer
            .into_inner()
            .map_err(|e| ManifestError::Buffer(e.to_string()))
    }

    /// Write the manifest, replacing the previous file atomically
    pub async fn save(&self) -> Result<(), ManifestError> {
        let bytes = self.to_csv()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ManifestError::io(parent, e))?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| ManifestError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ManifestError::io(&self.path, e))?;

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_MANIFEST_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Get an entry by canonical identity
    pub fn get(&self, identity: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.source_url == identity)
    }

    /// Merge a partial update into an entry, creating it if needed.
    ///
    /// Only the patched columns change. The modification time is always
    /// refreshed.
    pub fn upsert(&mut self, identity: &str, patch: &EntryPatch) -> &Entry {
        let index = match self.entries.iter().position(|e| e.source_url == identity) {
            Some(index) => index,
            None => {
                self.entries.push(Entry::new(identity));
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        entry.apply(patch);
        entry.touch();
        entry
    }

    /// Remove an entry by identity
    pub fn remove(&mut self, identity: &str) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| e.source_url == identity)?;
        Some(self.entries.remove(pos))
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Flag;
    use tempfile::TempDir;

    const ID: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn test_upsert_creates_with_absent_fields() {
        let mut manifest = Manifest::empty("m.csv");
        let patch = EntryPatch::new().text(Column::BaseName, "talk");

        let entry = manifest.upsert(ID, &patch).clone();

        assert_eq!(entry.base_name.as_deref(), Some("talk"));
        assert_eq!(entry.video_path, None);
        assert_eq!(entry.video_status, Flag::Unknown);
        assert!(entry.updated_at.is_some());
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_upsert_only_touches_patched_columns() {
        let mut manifest = Manifest::empty("m.csv");
        manifest.upsert(
            ID,
            &EntryPatch::new()
                .text(Column::BaseName, "talk")
                .path(Column::VideoPath, Some(Path::new("videos/talk.mp4")))
                .flag(Column::VideoStatus, Flag::True),
        );

        let entry = manifest
            .upsert(ID, &EntryPatch::new().flag(Column::AudioStatus, Flag::False))
            .clone();

        assert_eq!(entry.base_name.as_deref(), Some("talk"));
        assert_eq!(entry.video_status, Flag::True);
        assert_eq!(entry.audio_status, Flag::False);
        assert_eq!(entry.video_path, Some(PathBuf::from("videos/talk.mp4")));
    }

    #[test]
    fn test_upsert_normalizes_values() {
        let mut manifest = Manifest::empty("m.csv");
        let mut patch = EntryPatch::new();
        patch.set(Column::VideoStatus, Some("TRUE".into()));
        patch.set(Column::AudioPath, Some("N/A".into()));
        patch.set(Column::AudioStatus, Some("maybe".into()));

        let entry = manifest.upsert(ID, &patch);

        assert_eq!(entry.video_status, Flag::True);
        assert_eq!(entry.audio_path, None);
        assert_eq!(entry.audio_status, Flag::Unknown);
    }

    #[test]
    fn test_parse_drops_rows_without_identity_and_duplicates() {
        let csv = "\
source_url,base_name,video_status
https://youtu.be/dQw4w9WgXcQ,first,true
,orphan,true
NA,orphan2,false
https://www.youtube.com/watch?v=dQw4w9WgXcQ,second,false
";
        let entries = Manifest::parse(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_url, ID);
        assert_eq!(entries[0].base_name.as_deref(), Some("first"));
        assert_eq!(entries[0].video_status, Flag::True);
    }

    #[test]
    fn test_parse_legacy_manifest() {
        let csv = "\
youtube_url,base_filename,video_path,mp3_path,status_video_downloaded,status_mp3_converted,status_transcript_generated,last_updated
https://youtube.com/watch?v=dQw4w9WgXcQ,Old Talk,videos/Old Talk.mp4,nan,True,False,,2023-11-05T08:00:00.000000
";
        let entries = Manifest::parse(csv.as_bytes()).unwrap();
        let entry = &entries[0];

        assert_eq!(entry.source_url, ID);
        assert_eq!(entry.base_name.as_deref(), Some("Old Talk"));
        assert_eq!(entry.video_status, Flag::True);
        assert_eq!(entry.audio_path, None);
        assert_eq!(entry.audio_status, Flag::False);
        assert_eq!(entry.transcript_status, Flag::Unknown);
        assert_eq!(
            entry.updated_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2023-11-05T08:00:00+00:00")
        );
    }

    #[test]
    fn test_parse_without_identity_column_fails() {
        let csv = "title,status\nx,true\n";
        assert!(matches!(
            Manifest::parse(csv.as_bytes()),
            Err(ManifestError::MissingIdentityColumn)
        ));
        assert!(Manifest::parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_header_has_every_column_in_order() {
        let manifest = Manifest::empty("m.csv");
        let bytes = manifest.to_csv().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header: Vec<&str> = text.trim_end().split(',').collect();
        let expected: Vec<&str> = Column::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(header, expected);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("manifest.csv");

        let mut manifest = Manifest::empty(&path);
        manifest.upsert(
            ID,
            &EntryPatch::new()
                .text(Column::BaseName, "Talk, with comma")
                .flag(Column::VideoStatus, Flag::False),
        );
        let mut patch = EntryPatch::new();
        patch.set(Column::ClipPaths, Some("c/a_clip_1.mp4;c/a_clip_2.mp4".into()));
        manifest.upsert("https://example.com/other", &patch);
        manifest.save().await.unwrap();

        assert!(!path.with_file_name("manifest.csv.tmp").exists());

        let reloaded = Manifest::load(&path).await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries(), manifest.entries());
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();

        let missing = Manifest::load(tmp.path().join("nope.csv")).await;
        assert!(missing.is_empty());

        let corrupt_path = tmp.path().join("corrupt.csv");
        std::fs::write(&corrupt_path, "just,some,header\n1,2,3\n").unwrap();
        let corrupt = Manifest::load(&corrupt_path).await;
        assert!(corrupt.is_empty());
        assert_eq!(corrupt.path(), corrupt_path.as_path());
    }

    #[test]
    fn test_remove() {
        let mut manifest = Manifest::empty("m.csv");
        manifest.upsert(ID, &EntryPatch::new());
        assert!(manifest.remove(ID).is_some());
        assert!(manifest.remove(ID).is_none());
        assert!(manifest.get(ID).is_none());
    }
}
