use super::{require_text, CatalogError, Entity};
use crate::storage::Record;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

const DEFAULT_VIDEO_TITLE: &str = "Video";

/// Integers that may arrive as JSON numbers or as numeric strings (HTML form
/// values). Empty strings and `null` count as absent.
fn flexible_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, got {:?}", s))),
        Some(other) => Err(D::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

fn integer_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(flexible_integer(deserializer)?.unwrap_or(0))
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

// =============================================================================
// Tracks
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub downloads: i64,
    #[serde(default)]
    pub wav_clicks: i64,
    #[serde(default)]
    pub plays: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub bandcamp: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub stats: TrackStats,
}

/// M-House entries share the track shape and live in their own collection.
pub type MhouseTrack = Track;

#[derive(Debug, Default, Deserialize)]
pub struct TrackDraft {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub bandcamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackPatch {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub bandcamp: Option<String>,
}

impl Entity for Track {
    type Draft = TrackDraft;
    type Patch = TrackPatch;
    const NAME: &'static str = "track";

    fn prepare_create(draft: TrackDraft, now: &str) -> Result<Record, CatalogError> {
        let title = require_text("Title", draft.title)?;
        Ok(into_record(json!({
            "title": title,
            "genre": draft.genre,
            "image": draft.image,
            "audio": draft.audio,
            "bandcamp": draft.bandcamp,
            "uploadDate": now,
            "stats": TrackStats::default(),
        })))
    }

    fn prepare_update(
        existing: &Record,
        patch: TrackPatch,
        now: &str,
    ) -> Result<Record, CatalogError> {
        let mut fields = Record::new();
        if patch.title.is_some() {
            fields.insert("title".into(), require_text("Title", patch.title)?.into());
        }
        for (name, value) in [
            ("genre", patch.genre),
            ("image", patch.image),
            ("audio", patch.audio),
            ("bandcamp", patch.bandcamp),
        ] {
            if let Some(value) = value {
                fields.insert(name.into(), value.into());
            }
        }

        // Records written before dates and counters existed get them now.
        if existing.get("uploadDate").and_then(Value::as_str).is_none() {
            fields.insert("uploadDate".into(), now.into());
        }
        if !existing.get("stats").is_some_and(Value::is_object) {
            fields.insert("stats".into(), json!(TrackStats::default()));
        }
        Ok(fields)
    }
}

// =============================================================================
// Banners
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: i64,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default, deserialize_with = "integer_or_zero")]
    pub display_order: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerDraft {
    #[serde(alias = "image_path")]
    pub image_path: Option<String>,
    #[serde(alias = "link_url")]
    pub link_url: Option<String>,
    #[serde(alias = "display_order", default, deserialize_with = "flexible_integer")]
    pub display_order: Option<i64>,
}

pub type BannerPatch = BannerDraft;

impl Entity for Banner {
    type Draft = BannerDraft;
    type Patch = BannerPatch;
    const NAME: &'static str = "banner";

    fn prepare_create(draft: BannerDraft, _now: &str) -> Result<Record, CatalogError> {
        let image_path = require_text("Image path", draft.image_path)?;
        Ok(into_record(json!({
            "imagePath": image_path,
            "linkUrl": draft.link_url,
            "displayOrder": draft.display_order.unwrap_or(0),
        })))
    }

    fn prepare_update(
        _existing: &Record,
        patch: BannerPatch,
        _now: &str,
    ) -> Result<Record, CatalogError> {
        let mut fields = Record::new();
        if patch.image_path.is_some() {
            fields.insert(
                "imagePath".into(),
                require_text("Image path", patch.image_path)?.into(),
            );
        }
        if let Some(link_url) = patch.link_url {
            fields.insert("linkUrl".into(), link_url.into());
        }
        if let Some(display_order) = patch.display_order {
            fields.insert("displayOrder".into(), display_order.into());
        }
        Ok(fields)
    }
}

// =============================================================================
// YouTube
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeEntry {
    pub id: i64,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "integer_or_zero")]
    pub display_order: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeDraft {
    #[serde(alias = "video_id")]
    pub video_id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "display_order", default, deserialize_with = "flexible_integer")]
    pub display_order: Option<i64>,
}

pub type YoutubePatch = YoutubeDraft;

fn video_title(title: Option<String>) -> String {
    match title {
        Some(title) if !title.trim().is_empty() => title,
        _ => DEFAULT_VIDEO_TITLE.to_string(),
    }
}

impl Entity for YoutubeEntry {
    type Draft = YoutubeDraft;
    type Patch = YoutubePatch;
    const NAME: &'static str = "video";

    fn prepare_create(draft: YoutubeDraft, _now: &str) -> Result<Record, CatalogError> {
        let video_id = require_text("Video id", draft.video_id)?;
        Ok(into_record(json!({
            "videoId": video_id.trim(),
            "title": video_title(draft.title),
            "displayOrder": draft.display_order.unwrap_or(0),
        })))
    }

    fn prepare_update(
        _existing: &Record,
        patch: YoutubePatch,
        _now: &str,
    ) -> Result<Record, CatalogError> {
        let mut fields = Record::new();
        if patch.video_id.is_some() {
            let video_id = require_text("Video id", patch.video_id)?;
            fields.insert("videoId".into(), video_id.trim().into());
        }
        if patch.title.is_some() {
            fields.insert("title".into(), video_title(patch.title).into());
        }
        if let Some(display_order) = patch.display_order {
            fields.insert("displayOrder".into(), display_order.into());
        }
        Ok(fields)
    }
}
