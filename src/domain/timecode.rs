//! Clip time ranges and the timestamps file format.

use serde::{Deserialize, Serialize};

/// A clip range in seconds, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Whole-second cut window: rounded, widened by a second each side,
    /// start clamped at zero.
    pub fn padded_window(&self) -> (u64, u64) {
        let start = (self.start.round() - 1.0).max(0.0) as u64;
        let end = (self.end.round() as u64).saturating_add(1);
        (start, end)
    }
}

/// Parses `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `MM:SS` or plain seconds.
pub fn parse_timecode(raw: &str) -> Option<f64> {
    let raw = raw.trim().replace(',', ".");
    if raw.is_empty() {
        return None;
    }
    let mut total = 0.0;
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for part in &parts {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Formats seconds as `HH:MM:SS,mmm`
pub fn format_timecode(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

/// A time value as written by people or models: text or a number of seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Text(String),
}

impl TimeValue {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            TimeValue::Seconds(s) => Some(*s),
            TimeValue::Text(t) => parse_timecode(t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub start_time: Option<TimeValue>,
    #[serde(default)]
    pub end_time: Option<TimeValue>,
}

impl Segment {
    pub fn range(&self) -> Option<TimeRange> {
        let start = self.start_time.as_ref()?.seconds()?;
        let end = self.end_time.as_ref()?.seconds()?;
        TimeRange::new(start, end)
    }
}

/// Contents of a `<base>_timestamps.json` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampFile {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl TimestampFile {
    pub fn from_ranges(ranges: &[TimeRange]) -> Self {
        Self {
            segments: ranges
                .iter()
                .map(|r| Segment {
                    start_time: Some(TimeValue::Text(format_timecode(r.start))),
                    end_time: Some(TimeValue::Text(format_timecode(r.end))),
                })
                .collect(),
        }
    }

    /// Valid ranges, skipping segments with missing or unreadable times
    pub fn ranges(&self) -> Vec<TimeRange> {
        self.segments.iter().filter_map(Segment::range).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timecode_forms() {
        assert_eq!(parse_timecode("00:01:02,500"), Some(62.5));
        assert_eq!(parse_timecode("01:00:00.000"), Some(3600.0));
        assert_eq!(parse_timecode("2:05"), Some(125.0));
        assert_eq!(parse_timecode("42"), Some(42.0));
        assert_eq!(parse_timecode(""), None);
        assert_eq!(parse_timecode("ab:cd"), None);
        assert_eq!(parse_timecode("1:2:3:4"), None);
    }

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(62.5), "00:01:02,500");
        assert_eq!(format_timecode(3723.004), "01:02:03,004");
    }

    #[test]
    fn test_padded_window_saturates_on_huge_end() {
        let file: TimestampFile =
            serde_json::from_str(r#"{"segments":[{"start_time":0,"end_time":1e30}]}"#).unwrap();
        let ranges = file.ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].padded_window(), (0, u64::MAX));
    }

    #[test]
    fn test_padded_window() {
        let range = TimeRange::new(0.4, 10.6).unwrap();
        assert_eq!(range.padded_window(), (0, 12));
        let range = TimeRange::new(30.2, 45.0).unwrap();
        assert_eq!(range.padded_window(), (29, 46));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(TimeRange::new(5.0, 5.0).is_none());
        assert!(TimeRange::new(-1.0, 5.0).is_none());
        assert!(TimeRange::new(10.0, 2.0).is_none());
    }

    #[test]
    fn test_timestamp_file_tolerates_mixed_segments() {
        let json = r#"{"segments": [
            {"start_time": "00:00:10,000", "end_time": "00:00:40,000"},
            {"start_time": 50, "end_time": 75.5},
            {"start_time": "later"},
            {"end_time": "00:01:00,000"}
        ]}"#;
        let file: TimestampFile = serde_json::from_str(json).unwrap();
        let ranges = file.ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], TimeRange { start: 10.0, end: 40.0 });
        assert_eq!(ranges[1], TimeRange { start: 50.0, end: 75.5 });
    }
}
