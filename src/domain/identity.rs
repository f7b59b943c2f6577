//! Item identity: canonical source URLs and filesystem-safe base names.

use std::fmt;

use reqwest::Url;
use thiserror::Error;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtube-nocookie.com"];
const YOUTUBE_ID_PATHS: &[&str] = &["shorts", "embed", "live", "v"];

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Empty source reference")]
    Empty,

    #[error("Not a recognizable media URL: {0}")]
    Invalid(String),

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },
}

/// Canonical identity of a media item.
///
/// Two references to the same item (short links, `www.`/mobile hosts,
/// extra query parameters) canonicalize to the same `ItemId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn parse(reference: &str) -> Result<Self, IdentityError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(IdentityError::Empty);
        }

        if is_video_id(reference) {
            return Ok(Self::youtube(reference));
        }

        let candidate = if reference.contains("://") {
            reference.to_string()
        } else if reference.contains('.') && !reference.contains(char::is_whitespace) {
            format!("https://{}", reference)
        } else {
            return Err(IdentityError::Invalid(reference.to_string()));
        };

        let mut url =
            Url::parse(&candidate).map_err(|_| IdentityError::Invalid(reference.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(IdentityError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: reference.to_string(),
            });
        }

        let host = url
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .ok_or_else(|| IdentityError::Invalid(reference.to_string()))?;
        let bare_host = ["www.", "m.", "music."]
            .iter()
            .find_map(|prefix| host.strip_prefix(prefix))
            .unwrap_or(&host);

        if bare_host == "youtu.be" {
            let id = url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|id| is_video_id(id))
                .ok_or_else(|| IdentityError::Invalid(reference.to_string()))?;
            return Ok(Self::youtube(id));
        }

        if YOUTUBE_HOSTS.contains(&bare_host) {
            return youtube_id_from(&url)
                .map(|id| Self::youtube(&id))
                .ok_or_else(|| IdentityError::Invalid(reference.to_string()));
        }

        url.set_fragment(None);
        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }
        Ok(Self(url.to_string()))
    }

    fn youtube(id: &str) -> Self {
        Self(format!("https://www.youtube.com/watch?v={}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The YouTube video id, when this item is a YouTube video
    pub fn youtube_id(&self) -> Option<&str> {
        self.0
            .strip_prefix("https://www.youtube.com/watch?v=")
            .filter(|id| is_video_id(id))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn youtube_id_from(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    match segments.next()? {
        "watch" => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| is_video_id(id)),
        prefix if YOUTUBE_ID_PATHS.contains(&prefix) => segments
            .next()
            .filter(|id| is_video_id(id))
            .map(str::to_string),
        _ => None,
    }
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Filesystem-safe base name: keeps alphanumerics, spaces, `.`, `_` and `-`,
/// replaces everything else with `_`.
pub fn sanitize_base_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn test_youtube_forms_share_identity() {
        for reference in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "http://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
        ] {
            let id = ItemId::parse(reference).unwrap();
            assert_eq!(id.as_str(), CANONICAL, "{}", reference);
            assert_eq!(id.youtube_id(), Some("dQw4w9WgXcQ"));
        }
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let once = ItemId::parse("https://Example.com/media/clip/#t=3").unwrap();
        let twice = ItemId::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.as_str(), "https://example.com/media/clip");
        assert_eq!(once.youtube_id(), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(ItemId::parse("   "), Err(IdentityError::Empty)));
        assert!(matches!(
            ItemId::parse("not a url"),
            Err(IdentityError::Invalid(_))
        ));
        assert!(matches!(
            ItemId::parse("ftp://example.com/file.mp4"),
            Err(IdentityError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            ItemId::parse("https://www.youtube.com/@somechannel"),
            Err(IdentityError::Invalid(_))
        ));
    }

    #[test]
    fn test_sanitize_base_name() {
        assert_eq!(
            sanitize_base_name("My Video: Part 1/2?"),
            "My Video_ Part 1_2_"
        );
        assert_eq!(sanitize_base_name("clip-v1.2_final"), "clip-v1.2_final");
        assert_eq!(sanitize_base_name("  ...  "), "untitled");
    }
}
