//! Value types parsed at the API boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every Helix list response.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}

/// One currently-live stream as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: String,
    pub user_id: String,
    /// Lowercase login handle.
    pub user_login: String,
    /// Display name with original casing.
    pub user_name: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    /// Stream start time; absent or malformed values deserialize to `None`.
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub started_at: Option<DateTime<Utc>>,
    /// Template URL containing `{width}` and `{height}` placeholders.
    #[serde(default)]
    pub thumbnail_url: String,
    /// Filled in by the client via a secondary user lookup; empty when the
    /// enrichment lookup fails.
    #[serde(default)]
    pub profile_image_url: String,
}

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

/// Channel metadata for a broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub broadcaster_name: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
}

/// A published video (archive, highlight, upload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

/// Composite "what did this streamer last broadcast" answer, assembled from
/// the user, channel and archive-video endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LastStreamInfo {
    pub login: String,
    pub display_name: String,
    pub game_name: Option<String>,
    pub title: Option<String>,
    pub last_streamed_at: Option<DateTime<Utc>>,
    pub profile_image_url: String,
}

/// Accept RFC 3339 timestamps but map absent/empty/garbage to `None` instead
/// of failing the whole batch decode.
fn lenient_datetime<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_record_parses_with_started_at() {
        let json = r#"{
            "id": "9001",
            "user_id": "123",
            "user_login": "somestreamer",
            "user_name": "SomeStreamer",
            "game_name": "Science & Technology",
            "title": "building things",
            "viewer_count": 742,
            "started_at": "2024-05-01T18:04:00Z",
            "thumbnail_url": "https://cdn.example/previews/{width}x{height}.jpg"
        }"#;

        let record: StreamRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.user_login, "somestreamer");
        assert_eq!(record.viewer_count, 742);
        assert!(record.started_at.is_some());
        assert!(record.profile_image_url.is_empty());
    }

    #[test]
    fn stream_record_tolerates_missing_started_at() {
        let json = r#"{
            "id": "9002",
            "user_id": "124",
            "user_login": "other",
            "user_name": "Other",
            "title": "hi"
        }"#;

        let record: StreamRecord = serde_json::from_str(json).unwrap();
        assert!(record.started_at.is_none());
        assert_eq!(record.game_name, "");
    }

    #[test]
    fn stream_record_tolerates_empty_started_at() {
        let json = r#"{
            "id": "9003",
            "user_id": "125",
            "user_login": "third",
            "user_name": "Third",
            "started_at": ""
        }"#;

        let record: StreamRecord = serde_json::from_str(json).unwrap();
        assert!(record.started_at.is_none());
    }

    #[test]
    fn envelope_unwraps_data() {
        let json = r#"{"data":[{"id":"1","login":"abc","display_name":"Abc","profile_image_url":"https://cdn.example/abc.png"}]}"#;
        let envelope: DataEnvelope<UserRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].login, "abc");
    }

    #[test]
    fn video_record_parses() {
        let json = r#"{"id":"v1","title":"vod","created_at":"2024-04-30T20:00:00Z","url":"https://example/videos/v1"}"#;
        let video: VideoRecord = serde_json::from_str(json).unwrap();
        assert!(video.created_at.is_some());
    }
}
