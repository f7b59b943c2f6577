//! Manifest entries: one row per media item.
//!
//! Every textual value that enters an [`Entry`] goes through [`Entry::set`],
//! which is the single place where "NA" spellings, boolean strings and
//! timestamps are normalized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};

use super::identity::sanitize_base_name;
use super::stage::StageId;

/// Cell spellings read as "absent" (compared case-insensitively after trim)
pub const NA_VALUES: &[&str] = &[
    "", "#n/a", "#n/a n/a", "#na", "-1.#ind", "-1.#qnan", "-nan", "1.#ind", "1.#qnan",
    "<na>", "n/a", "na", "null", "nan", "none",
];

/// Separator of list-valued cells in older manifests; lists are now
/// written as a JSON array of strings
pub const LIST_SEPARATOR: char = ';';

/// Returns the trimmed cell text, or `None` for absent/NA cells.
pub fn present(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    let lower = value.to_ascii_lowercase();
    if NA_VALUES.contains(&lower.as_str()) {
        None
    } else {
        Some(value)
    }
}

/// Tri-state stage status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flag {
    True,
    False,
    /// Never attempted, or the cell held something unreadable
    #[default]
    Unknown,
}

impl Flag {
    /// `"true"`/`"false"` in any case map to the booleans; everything else is unknown.
    pub fn normalize(raw: Option<&str>) -> Self {
        match present(raw).map(str::to_ascii_lowercase).as_deref() {
            Some("true") => Flag::True,
            Some("false") => Flag::False,
            _ => Flag::Unknown,
        }
    }

    pub fn is_true(self) -> bool {
        self == Flag::True
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Flag::True => Some(true),
            Flag::False => Some(false),
            Flag::Unknown => None,
        }
    }

    /// Text written to the manifest; unknown is written as an empty cell
    pub fn as_cell(self) -> Option<&'static str> {
        match self {
            Flag::True => Some("true"),
            Flag::False => Some("false"),
            Flag::Unknown => None,
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value {
            Flag::True
        } else {
            Flag::False
        }
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_bool().serialize(serializer)
    }
}

/// What kind of value a column carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Identity,
    Text,
    Path,
    PathList,
    Flag,
    Timestamp,
}

/// A manifest column. `Column::ALL` is the on-disk header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    SourceUrl,
    BaseName,
    VideoPath,
    VideoStatus,
    AudioPath,
    AudioStatus,
    TranscriptPath,
    TranscriptStatus,
    CaptionSrtPath,
    CaptionVttPath,
    CaptionTxtPath,
    CaptionsStatus,
    AnalysisPath,
    AnalysisStatus,
    TimestampsPath,
    TimestampsStatus,
    CaptionedVideoPath,
    CaptionedVideoStatus,
    ClipPaths,
    ClipsStatus,
    UpdatedAt,
}

impl Column {
    pub const ALL: [Column; 21] = [
        Column::SourceUrl,
        Column::BaseName,
        Column::VideoPath,
        Column::VideoStatus,
        Column::AudioPath,
        Column::AudioStatus,
        Column::TranscriptPath,
        Column::TranscriptStatus,
        Column::CaptionSrtPath,
        Column::CaptionVttPath,
        Column::CaptionTxtPath,
        Column::CaptionsStatus,
        Column::AnalysisPath,
        Column::AnalysisStatus,
        Column::TimestampsPath,
        Column::TimestampsStatus,
        Column::CaptionedVideoPath,
        Column::CaptionedVideoStatus,
        Column::ClipPaths,
        Column::ClipsStatus,
        Column::UpdatedAt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::SourceUrl => "source_url",
            Column::BaseName => "base_name",
            Column::VideoPath => "video_path",
            Column::VideoStatus => "video_status",
            Column::AudioPath => "audio_path",
            Column::AudioStatus => "audio_status",
            Column::TranscriptPath => "transcript_path",
            Column::TranscriptStatus => "transcript_status",
            Column::CaptionSrtPath => "caption_srt_path",
            Column::CaptionVttPath => "caption_vtt_path",
            Column::CaptionTxtPath => "caption_txt_path",
            Column::CaptionsStatus => "captions_status",
            Column::AnalysisPath => "analysis_path",
            Column::AnalysisStatus => "analysis_status",
            Column::TimestampsPath => "timestamps_path",
            Column::TimestampsStatus => "timestamps_status",
            Column::CaptionedVideoPath => "captioned_video_path",
            Column::CaptionedVideoStatus => "captioned_video_status",
            Column::ClipPaths => "clip_paths",
            Column::ClipsStatus => "clips_status",
            Column::UpdatedAt => "updated_at",
        }
    }

    /// Maps a header cell to a column, accepting the legacy header names
    /// of older manifests. Unknown headers are ignored by the loader.
    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim().to_ascii_lowercase();
        if let Some(column) = Column::ALL.iter().find(|c| c.as_str() == header) {
            return Some(*column);
        }
        match header.as_str() {
            "youtube_url" | "url" => Some(Column::SourceUrl),
            "base_filename" => Some(Column::BaseName),
            "mp3_path" => Some(Column::AudioPath),
            "status_video_downloaded" => Some(Column::VideoStatus),
            "status_mp3_converted" => Some(Column::AudioStatus),
            "status_transcript_generated" => Some(Column::TranscriptStatus),
            "status_analysis_generated" => Some(Column::AnalysisStatus),
            "status_captions_generated" => Some(Column::CaptionsStatus),
            "last_updated" => Some(Column::UpdatedAt),
            _ => None,
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::SourceUrl => ColumnKind::Identity,
            Column::BaseName => ColumnKind::Text,
            Column::ClipPaths => ColumnKind::PathList,
            Column::UpdatedAt => ColumnKind::Timestamp,
            Column::VideoStatus
            | Column::AudioStatus
            | Column::TranscriptStatus
            | Column::CaptionsStatus
            | Column::AnalysisStatus
            | Column::TimestampsStatus
            | Column::CaptionedVideoStatus
            | Column::ClipsStatus => ColumnKind::Flag,
            _ => ColumnKind::Path,
        }
    }
}

/// One media item's processing record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Canonical identity; immutable once created
    pub source_url: String,

    /// Filesystem-safe name every artifact is derived from
    pub base_name: Option<String>,

    pub video_path: Option<PathBuf>,
    pub video_status: Flag,
    pub audio_path: Option<PathBuf>,
    pub audio_status: Flag,
    pub transcript_path: Option<PathBuf>,
    pub transcript_status: Flag,
    pub caption_srt_path: Option<PathBuf>,
    pub caption_vtt_path: Option<PathBuf>,
    pub caption_txt_path: Option<PathBuf>,
    pub captions_status: Flag,
    pub analysis_path: Option<PathBuf>,
    pub analysis_status: Flag,
    pub timestamps_path: Option<PathBuf>,
    pub timestamps_status: Flag,
    pub captioned_video_path: Option<PathBuf>,
    pub captioned_video_status: Flag,
    pub clip_paths: Vec<PathBuf>,
    pub clips_status: Flag,

    /// Time of the last modification through the store
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// A fresh entry: every field absent except the identity.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            base_name: None,
            video_path: None,
            video_status: Flag::Unknown,
            audio_path: None,
            audio_status: Flag::Unknown,
            transcript_path: None,
            transcript_status: Flag::Unknown,
            caption_srt_path: None,
            caption_vtt_path: None,
            caption_txt_path: None,
            captions_status: Flag::Unknown,
            analysis_path: None,
            analysis_status: Flag::Unknown,
            timestamps_path: None,
            timestamps_status: Flag::Unknown,
            captioned_video_path: None,
            captioned_video_status: Flag::Unknown,
            clip_paths: Vec::new(),
            clips_status: Flag::Unknown,
            updated_at: None,
        }
    }

    /// Human-facing label: base name when known, else the identity
    pub fn label(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.source_url)
    }

    /// Name used to derive artifact file names
    pub fn stem(&self) -> String {
        match &self.base_name {
            Some(name) => name.clone(),
            None => sanitize_base_name(&self.source_url),
        }
    }

    /// Cell text for a column, `None` when absent
    pub fn get(&self, column: Column) -> Option<String> {
        match column.kind() {
            ColumnKind::Identity => Some(self.source_url.clone()),
            ColumnKind::Text => self.base_name.clone(),
            ColumnKind::Path => self
                .path_ref(column)
                .and_then(|p| p.as_ref())
                .map(|p| p.to_string_lossy().into_owned()),
            ColumnKind::PathList => {
                if self.clip_paths.is_empty() {
                    None
                } else {
                    let paths: Vec<String> = self
                        .clip_paths
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect();
                    serde_json::to_string(&paths).ok()
                }
            }
            ColumnKind::Flag => self
                .flag_ref(column)
                .and_then(|f| f.as_cell())
                .map(str::to_string),
            ColumnKind::Timestamp => self.updated_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Writes a raw cell value into a column.
    ///
    /// The identity column is never rewritten here.
    pub fn set(&mut self, column: Column, raw: Option<&str>) {
        let value = present(raw);
        match column.kind() {
            ColumnKind::Identity => {}
            ColumnKind::Text => self.base_name = value.map(str::to_string),
            ColumnKind::Path => {
                if let Some(slot) = self.path_mut(column) {
                    *slot = value.map(PathBuf::from);
                }
            }
            ColumnKind::PathList => {
                self.clip_paths = value.map(parse_path_list).unwrap_or_default();
            }
            ColumnKind::Flag => {
                if let Some(slot) = self.flag_mut(column) {
                    *slot = Flag::normalize(value);
                }
            }
            ColumnKind::Timestamp => self.updated_at = value.and_then(parse_timestamp),
        }
    }

    /// Status flag of a stage
    pub fn status(&self, stage: StageId) -> Flag {
        self.flag_ref(stage.status_column())
            .copied()
            .unwrap_or_default()
    }

    /// Every output locator the entry records for a stage
    pub fn outputs(&self, stage: StageId) -> Vec<PathBuf> {
        let mut outputs = Vec::new();
        for column in stage.locator_columns() {
            match column.kind() {
                ColumnKind::PathList => outputs.extend(self.clip_paths.iter().cloned()),
                _ => {
                    if let Some(Some(path)) = self.path_ref(*column) {
                        outputs.push(path.clone());
                    }
                }
            }
        }
        outputs
    }

    /// Whether the stage's primary locator is recorded
    pub fn has_primary_output(&self, stage: StageId) -> bool {
        match stage.locator_columns().first() {
            Some(Column::ClipPaths) => !self.clip_paths.is_empty(),
            Some(column) => matches!(self.path_ref(*column), Some(Some(_))),
            None => false,
        }
    }

    /// Clears a stage's locators and marks it not done
    pub fn clear_stage(&mut self, stage: StageId) {
        for column in stage.locator_columns() {
            self.set(*column, None);
        }
        self.set(stage.status_column(), Some("false"));
    }

    /// Columns whose cell text differs between `self` and `other`,
    /// carrying `other`'s values. Identity and timestamp are not compared.
    pub fn diff(&self, other: &Entry) -> EntryPatch {
        let mut patch = EntryPatch::new();
        for column in Column::ALL {
            if matches!(column.kind(), ColumnKind::Identity | ColumnKind::Timestamp) {
                continue;
            }
            let theirs = other.get(column);
            if self.get(column) != theirs {
                patch.set(column, theirs);
            }
        }
        patch
    }

    pub fn apply(&mut self, patch: &EntryPatch) {
        for (column, value) in patch.iter() {
            self.set(column, value);
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    fn path_ref(&self, column: Column) -> Option<&Option<PathBuf>> {
        match column {
            Column::VideoPath => Some(&self.video_path),
            Column::AudioPath => Some(&self.audio_path),
            Column::TranscriptPath => Some(&self.transcript_path),
            Column::CaptionSrtPath => Some(&self.caption_srt_path),
            Column::CaptionVttPath => Some(&self.caption_vtt_path),
            Column::CaptionTxtPath => Some(&self.caption_txt_path),
            Column::AnalysisPath => Some(&self.analysis_path),
            Column::TimestampsPath => Some(&self.timestamps_path),
            Column::CaptionedVideoPath => Some(&self.captioned_video_path),
            _ => None,
        }
    }

    fn path_mut(&mut self, column: Column) -> Option<&mut Option<PathBuf>> {
        match column {
            Column::VideoPath => Some(&mut self.video_path),
            Column::AudioPath => Some(&mut self.audio_path),
            Column::TranscriptPath => Some(&mut self.transcript_path),
            Column::CaptionSrtPath => Some(&mut self.caption_srt_path),
            Column::CaptionVttPath => Some(&mut self.caption_vtt_path),
            Column::CaptionTxtPath => Some(&mut self.caption_txt_path),
            Column::AnalysisPath => Some(&mut self.analysis_path),
            Column::TimestampsPath => Some(&mut self.timestamps_path),
            Column::CaptionedVideoPath => Some(&mut self.captioned_video_path),
            _ => None,
        }
    }

    fn flag_ref(&self, column: Column) -> Option<&Flag> {
        match column {
            Column::VideoStatus => Some(&self.video_status),
            Column::AudioStatus => Some(&self.audio_status),
            Column::TranscriptStatus => Some(&self.transcript_status),
            Column::CaptionsStatus => Some(&self.captions_status),
            Column::AnalysisStatus => Some(&self.analysis_status),
            Column::TimestampsStatus => Some(&self.timestamps_status),
            Column::CaptionedVideoStatus => Some(&self.captioned_video_status),
            Column::ClipsStatus => Some(&self.clips_status),
            _ => None,
        }
    }

    fn flag_mut(&mut self, column: Column) -> Option<&mut Flag> {
        match column {
            Column::VideoStatus => Some(&mut self.video_status),
            Column::AudioStatus => Some(&mut self.audio_status),
            Column::TranscriptStatus => Some(&mut self.transcript_status),
            Column::CaptionsStatus => Some(&mut self.captions_status),
            Column::AnalysisStatus => Some(&mut self.analysis_status),
            Column::TimestampsStatus => Some(&mut self.timestamps_status),
            Column::CaptionedVideoStatus => Some(&mut self.captioned_video_status),
            Column::ClipsStatus => Some(&mut self.clips_status),
            _ => None,
        }
    }
}

/// Reads a list cell: a JSON array of strings, or the older
/// `;`-separated form.
fn parse_path_list(value: &str) -> Vec<PathBuf> {
    if value.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
            return items
                .iter()
                .filter_map(|item| present(Some(item)))
                .map(PathBuf::from)
                .collect();
        }
    }
    value
        .split(LIST_SEPARATOR)
        .filter_map(|part| present(Some(part)))
        .map(PathBuf::from)
        .collect()
}

/// Reads RFC 3339, falling back to naive ISO timestamps taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// A partial update: only the listed columns change.
///
/// A column mapped to `None` is cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    fields: BTreeMap<Column, Option<String>>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: Column, value: Option<String>) {
        self.fields.insert(column, value);
    }

    pub fn text(mut self, column: Column, value: impl Into<String>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    pub fn flag(mut self, column: Column, flag: Flag) -> Self {
        self.set(column, flag.as_cell().map(str::to_string));
        self
    }

    pub fn path(mut self, column: Column, path: Option<&Path>) -> Self {
        self.set(column, path.map(|p| p.to_string_lossy().into_owned()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, column: Column) -> bool {
        self.fields.contains_key(&column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, Option<&str>)> {
        self.fields.iter().map(|(c, v)| (*c, v.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_normalization() {
        assert_eq!(Flag::normalize(Some("True")), Flag::True);
        assert_eq!(Flag::normalize(Some(" FALSE ")), Flag::False);
        assert_eq!(Flag::normalize(Some("yes")), Flag::Unknown);
        assert_eq!(Flag::normalize(Some("1")), Flag::Unknown);
        assert_eq!(Flag::normalize(Some("NaN")), Flag::Unknown);
        assert_eq!(Flag::normalize(None), Flag::Unknown);
    }

    #[test]
    fn test_na_spellings_read_as_absent() {
        let mut entry = Entry::new("https://example.com/v");
        for na in ["", "NA", "n/a", "None", "nan", "NULL", "  "] {
            entry.set(Column::VideoPath, Some("/tmp/x.mp4"));
            entry.set(Column::VideoPath, Some(na));
            assert_eq!(entry.video_path, None, "{:?} should be absent", na);
        }
    }

    #[test]
    fn test_legacy_headers() {
        assert_eq!(Column::from_header("youtube_url"), Some(Column::SourceUrl));
        assert_eq!(Column::from_header("base_filename"), Some(Column::BaseName));
        assert_eq!(Column::from_header("mp3_path"), Some(Column::AudioPath));
        assert_eq!(
            Column::from_header("status_captions_generated"),
            Some(Column::CaptionsStatus)
        );
        assert_eq!(Column::from_header(" Clip_Paths "), Some(Column::ClipPaths));
        assert_eq!(Column::from_header("notes"), None);
    }

    #[test]
    fn test_clip_paths_list_cell() {
        let mut entry = Entry::new("id");
        entry.set(Column::ClipPaths, Some("a_clip_1.mp4; a_clip_2.mp4;;"));
        assert_eq!(
            entry.clip_paths,
            vec![PathBuf::from("a_clip_1.mp4"), PathBuf::from("a_clip_2.mp4")]
        );
        assert_eq!(
            entry.get(Column::ClipPaths).as_deref(),
            Some(r#"["a_clip_1.mp4","a_clip_2.mp4"]"#)
        );
    }

    #[test]
    fn test_clip_paths_with_separator_in_directory() {
        let clip = PathBuf::from("/srv/a;b/viral_clips/x_clip_1.mp4");
        let mut entry = Entry::new("id");
        entry.clip_paths = vec![clip.clone()];

        let cell = entry.get(Column::ClipPaths);
        let mut reread = Entry::new("id");
        reread.set(Column::ClipPaths, cell.as_deref());
        assert_eq!(reread.clip_paths, vec![clip]);
    }

    #[test]
    fn test_identity_is_immutable_through_set() {
        let mut entry = Entry::new("original");
        entry.set(Column::SourceUrl, Some("other"));
        assert_eq!(entry.source_url, "original");
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let parsed = parse_timestamp("2024-03-01T10:20:30.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T10:20:30.123456+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_outputs_and_primary() {
        let mut entry = Entry::new("id");
        assert!(!entry.has_primary_output(StageId::Captions));

        entry.caption_vtt_path = Some(PathBuf::from("a.vtt"));
        assert!(!entry.has_primary_output(StageId::Captions));
        assert_eq!(entry.outputs(StageId::Captions), vec![PathBuf::from("a.vtt")]);

        entry.caption_srt_path = Some(PathBuf::from("a.srt"));
        assert!(entry.has_primary_output(StageId::Captions));
        assert_eq!(entry.outputs(StageId::Captions).len(), 2);
    }

    #[test]
    fn test_clear_stage() {
        let mut entry = Entry::new("id");
        entry.caption_srt_path = Some(PathBuf::from("a.srt"));
        entry.caption_txt_path = Some(PathBuf::from("a.txt"));
        entry.captions_status = Flag::True;

        entry.clear_stage(StageId::Captions);

        assert!(entry.outputs(StageId::Captions).is_empty());
        assert_eq!(entry.status(StageId::Captions), Flag::False);
    }

    #[test]
    fn test_diff_and_apply() {
        let before = Entry::new("id");
        let mut after = before.clone();
        after.video_path = Some(PathBuf::from("v.mp4"));
        after.video_status = Flag::True;
        after.updated_at = Some(Utc::now());

        let patch = before.diff(&after);
        assert_eq!(patch.len(), 2);
        assert!(patch.contains(Column::VideoPath));
        assert!(!patch.contains(Column::UpdatedAt));

        let mut merged = before.clone();
        merged.apply(&patch);
        assert_eq!(merged.video_status, Flag::True);
        assert_eq!(merged.video_path, after.video_path);
        assert!(before.diff(&before).is_empty());
    }
}
