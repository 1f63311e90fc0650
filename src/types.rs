//! Shared types: catalog status enum and recognition payloads
//!
//! The payload mirrors the external recognition service's response shape:
//! either a match list with nested track metadata, or a structured error
//! with an optional status code and retry hint.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-item fetch status, persisted as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    NotFetched = 0,
    InProgress = 1,
    Downloaded = 2,
    Processed = 3,
    Blocked = 4,
}

impl FetchStatus {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(FetchStatus::NotFetched),
            1 => Some(FetchStatus::InProgress),
            2 => Some(FetchStatus::Downloaded),
            3 => Some(FetchStatus::Processed),
            4 => Some(FetchStatus::Blocked),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

/// Result of one recognition attempt for one item
///
/// Success carries `matches` plus `track` metadata; failures carry `error`
/// with an optional HTTP status code and service-specified retry delay.
/// An empty payload with `note` set is the "insufficient data" sentinel
/// produced when not even one signature could be generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, rename = "retryms", skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// How the engine should react to a service response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Match,
    NoMatch,
    RateLimited,
    RetryHint(Duration),
    HardError,
}

impl RecognitionPayload {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn insufficient_data() -> Self {
        Self {
            note: Some("not enough audio data".to_string()),
            ..Default::default()
        }
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Classify the payload for the recognition loop.
    ///
    /// An explicit rate-limit signal (HTTP 429) is handled before any other
    /// error; a retry hint only applies to otherwise-empty responses.
    pub fn disposition(&self) -> Disposition {
        if self.error.is_some() {
            if self.status_code == Some(429) {
                return Disposition::RateLimited;
            }
            return Disposition::HardError;
        }
        if self.has_matches() {
            return Disposition::Match;
        }
        if let Some(ms) = self.retry_ms {
            return Disposition::RetryHint(Duration::from_millis(ms));
        }
        Disposition::NoMatch
    }
}

/// One entry of the service's match list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// Nested track metadata of a successful recognition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<TrackImages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<Hub>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverart: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Loosely-typed section of track metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, rename = "type")]
    pub section_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hub {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<HubAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubAction {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Identity fields required to upsert a recognized entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    /// External recognition id, unique upsert key
    pub recognition_id: String,
    pub display_name: String,
    pub image_url: Option<String>,
    /// Canonical share URL the recognition id was extracted from
    pub share_url: String,
    /// Playable-media URI when the hub carries one, else the share URL
    pub play_url: String,
}

/// Recognition id lives in a path segment of the canonical URL
static RECOGNITION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/track/(\d+)").expect("valid recognition id pattern"));

// Extraction helpers scan the loosely-typed payload shape and fail closed:
// a malformed or missing section yields None, never an error.
impl Track {
    pub fn canonical_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.share.as_ref().and_then(|s| s.href.as_deref()))
    }

    pub fn display_name(&self) -> Option<&str> {
        self.share
            .as_ref()
            .and_then(|s| s.subject.as_deref())
            .or(self.title.as_deref())
    }

    pub fn image_url(&self) -> Option<&str> {
        self.images
            .as_ref()
            .and_then(|i| i.background.as_deref().or(i.coverart.as_deref()))
    }

    pub fn recognition_id(&self) -> Option<String> {
        let url = self.canonical_url()?;
        RECOGNITION_ID_RE
            .captures(url)
            .map(|caps| caps[1].to_string())
    }

    /// Label name: the SONG-typed section's metadata entry titled "Label"
    pub fn label_name(&self) -> Option<String> {
        self.sections
            .iter()
            .find(|s| s.section_type == "SONG")?
            .metadata
            .iter()
            .find(|m| m.title.as_deref() == Some("Label"))?
            .text
            .clone()
    }

    /// First hub action whose URI points at the playable-media host
    pub fn playable_uri(&self, host_prefix: &str) -> Option<String> {
        self.hub
            .as_ref()?
            .actions
            .iter()
            .filter_map(|a| a.uri.as_deref())
            .find(|uri| uri.starts_with(host_prefix))
            .map(|uri| uri.to_string())
    }

    pub fn identity(&self, playable_host_prefix: &str) -> Option<EntityIdentity> {
        let share_url = self.canonical_url()?.to_string();
        let identity = EntityIdentity {
            recognition_id: self.recognition_id()?,
            display_name: self.display_name()?.to_string(),
            image_url: self.image_url().map(|s| s.to_string()),
            play_url: self
                .playable_uri(playable_host_prefix)
                .unwrap_or_else(|| share_url.clone()),
            share_url,
        };
        Some(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_fixture() -> Track {
        Track {
            title: Some("Test Song".to_string()),
            url: Some("https://www.shazam.com/track/631594639/test-song".to_string()),
            images: Some(TrackImages {
                background: Some("https://images.example/bg.jpg".to_string()),
                coverart: None,
            }),
            share: Some(ShareInfo {
                subject: Some("Test Song - Test Artist".to_string()),
                text: None,
                href: None,
            }),
            sections: vec![Section {
                section_type: "SONG".to_string(),
                metadata: vec![
                    MetadataItem {
                        title: Some("Album".to_string()),
                        text: Some("Test Album".to_string()),
                    },
                    MetadataItem {
                        title: Some("Label".to_string()),
                        text: Some("Test Records".to_string()),
                    },
                ],
            }],
            hub: Some(Hub {
                actions: vec![
                    HubAction {
                        action_type: Some("applemusicplay".to_string()),
                        uri: None,
                    },
                    HubAction {
                        action_type: Some("uri".to_string()),
                        uri: Some(
                            "https://audio-ssl.itunes.apple.com/preview/clip.m4a".to_string(),
                        ),
                    },
                ],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_round_trip() {
        for value in 0..5 {
            let status = FetchStatus::from_i64(value).unwrap();
            assert_eq!(status.as_i64(), value);
        }
        assert!(FetchStatus::from_i64(5).is_none());
    }

    #[test]
    fn test_disposition_classification() {
        assert_eq!(
            RecognitionPayload::from_error("boom").disposition(),
            Disposition::HardError
        );

        let rate_limited = RecognitionPayload {
            error: Some("too many requests".to_string()),
            status_code: Some(429),
            ..Default::default()
        };
        assert_eq!(rate_limited.disposition(), Disposition::RateLimited);

        let retry = RecognitionPayload {
            retry_ms: Some(1500),
            ..Default::default()
        };
        assert_eq!(
            retry.disposition(),
            Disposition::RetryHint(Duration::from_millis(1500))
        );

        let matched = RecognitionPayload {
            matches: vec![MatchEntry {
                id: "m1".to_string(),
                offset: None,
            }],
            ..Default::default()
        };
        assert_eq!(matched.disposition(), Disposition::Match);

        assert_eq!(
            RecognitionPayload::default().disposition(),
            Disposition::NoMatch
        );
        assert_eq!(
            RecognitionPayload::insufficient_data().disposition(),
            Disposition::NoMatch
        );
    }

    #[test]
    fn test_extract_identity() {
        let track = track_fixture();
        let identity = track
            .identity("https://audio-ssl.itunes.apple.com")
            .expect("identity present");

        assert_eq!(identity.recognition_id, "631594639");
        assert_eq!(identity.display_name, "Test Song - Test Artist");
        assert_eq!(
            identity.image_url.as_deref(),
            Some("https://images.example/bg.jpg")
        );
        assert_eq!(
            identity.play_url,
            "https://audio-ssl.itunes.apple.com/preview/clip.m4a"
        );
    }

    #[test]
    fn test_extract_label_name() {
        assert_eq!(
            track_fixture().label_name().as_deref(),
            Some("Test Records")
        );
    }

    #[test]
    fn test_extraction_fails_closed_on_malformed_shapes() {
        let track = Track {
            // No url and no share href: no id can be extracted
            title: Some("Untitled".to_string()),
            sections: vec![Section {
                section_type: "ARTIST".to_string(),
                metadata: vec![],
            }],
            ..Default::default()
        };

        assert!(track.recognition_id().is_none());
        assert!(track.label_name().is_none());
        assert!(track.playable_uri("https://audio-ssl.itunes.apple.com").is_none());
        assert!(track.identity("https://audio-ssl.itunes.apple.com").is_none());
    }

    #[test]
    fn test_play_url_falls_back_to_share_url() {
        let mut track = track_fixture();
        track.hub = None;

        let identity = track.identity("https://audio-ssl.itunes.apple.com").unwrap();
        assert_eq!(identity.play_url, identity.share_url);
    }

    #[test]
    fn test_payload_serde_round_trip() {
        let payload = RecognitionPayload {
            matches: vec![MatchEntry {
                id: "m1".to_string(),
                offset: Some(12.5),
            }],
            track: Some(track_fixture()),
            ..Default::default()
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: RecognitionPayload = serde_json::from_str(&json).unwrap();
        assert!(back.has_matches());
        assert_eq!(back.track.unwrap().recognition_id().as_deref(), Some("631594639"));
    }
}
