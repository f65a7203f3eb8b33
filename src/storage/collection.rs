//! Collection registry.
//!
//! Every collection is described once: where it lives in each backend, how
//! its JSON fields map onto SQL columns, how it is ordered and which records
//! are materialized when its file does not exist yet.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{json, Value};

use super::schema::{BANNERS_TABLE, MHOUSE_TRACKS_TABLE, TRACKS_TABLE, YOUTUBE_TABLE};
use super::Record;
use crate::sqlite_persistence::{SqlType, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tracks,
    Mhouse,
    Banners,
    Youtube,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Tracks,
        Collection::Mhouse,
        Collection::Banners,
        Collection::Youtube,
    ];

    pub fn spec(&self) -> &'static CollectionSpec {
        match self {
            Collection::Tracks => &TRACKS,
            Collection::Mhouse => &MHOUSE,
            Collection::Banners => &BANNERS,
            Collection::Youtube => &YOUTUBE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn parse(s: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.name() == s)
    }

    /// Whether records of this collection carry engagement counters.
    pub fn has_stats(&self) -> bool {
        matches!(self, Collection::Tracks | Collection::Mhouse)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One JSON field of a record and the SQL column backing it.
///
/// `parent` names the nested object the field lives in, if any
/// (`stats.views` is stored in the flat `views` column).
#[derive(Debug)]
pub struct FieldMapping {
    pub field: &'static str,
    pub parent: Option<&'static str>,
    pub column: &'static str,
    pub sql_type: &'static SqlType,
}

impl FieldMapping {
    pub fn lookup<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        match self.parent {
            Some(parent) => record.get(parent)?.as_object()?.get(self.field),
            None => record.get(self.field),
        }
    }

    pub fn assign(&self, record: &mut Record, value: Value) {
        match self.parent {
            Some(parent) => {
                let nested = record
                    .entry(parent)
                    .or_insert_with(|| Value::Object(Record::new()));
                if !nested.is_object() {
                    *nested = Value::Object(Record::new());
                }
                if let Value::Object(nested) = nested {
                    nested.insert(self.field.to_string(), value);
                }
            }
            None => {
                record.insert(self.field.to_string(), value);
            }
        }
    }
}

macro_rules! field {
    ($field:expr, $column:expr, $sql_type:expr) => {
        FieldMapping {
            field: $field,
            parent: None,
            column: $column,
            sql_type: $sql_type,
        }
    };
    ($parent:expr => $field:expr, $column:expr, $sql_type:expr) => {
        FieldMapping {
            field: $field,
            parent: Some($parent),
            column: $column,
            sql_type: $sql_type,
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Primary sort key of a collection. Ties are broken by `id` in the same
/// direction.
pub struct SortRule {
    pub field: &'static str,
    pub direction: SortDirection,
}

pub struct CollectionSpec {
    pub name: &'static str,
    pub table: &'static Table,
    pub file_name: &'static str,
    pub fields: &'static [FieldMapping],
    pub sort: SortRule,
    pub seed: Option<fn(&str) -> Vec<Record>>,
}

impl CollectionSpec {
    pub fn field(&self, name: &str) -> Option<&'static FieldMapping> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn order_by_sql(&self) -> String {
        let direction = self.sort.direction.as_sql();
        let column = self
            .field(self.sort.field)
            .map(|f| f.column)
            .unwrap_or("id");
        format!("{} {}, id {}", column, direction, direction)
    }

    /// Orders records the same way `order_by_sql` orders rows.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let primary = match self.field(self.sort.field) {
            Some(mapping) if *mapping.sql_type == SqlType::Integer => {
                compare_numbers(mapping.lookup(a), mapping.lookup(b))
            }
            Some(mapping) => compare_values(mapping.lookup(a), mapping.lookup(b)),
            None => Ordering::Equal,
        };
        let ordering = primary.then_with(|| compare_values(a.get("id"), b.get("id")));
        match self.sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => value_as_text(a).cmp(&value_as_text(b)),
    }
}

/// Integer fields may hold numeric strings written by older clients.
/// Anything that is not a number sorts like a missing value.
fn compare_numbers(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.and_then(value_as_number);
    let b = b.and_then(value_as_number);
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const TRACK_FIELDS: &[FieldMapping] = &[
    field!("title", "title", &SqlType::Text),
    field!("genre", "genre", &SqlType::Text),
    field!("image", "image", &SqlType::Text),
    field!("audio", "audio", &SqlType::Text),
    field!("bandcamp", "bandcamp", &SqlType::Text),
    field!("uploadDate", "upload_date", &SqlType::Text),
    field!("stats" => "views", "views", &SqlType::Integer),
    field!("stats" => "downloads", "downloads", &SqlType::Integer),
    field!("stats" => "wavClicks", "wav_clicks", &SqlType::Integer),
    field!("stats" => "plays", "plays", &SqlType::Integer),
];

static TRACKS: CollectionSpec = CollectionSpec {
    name: "tracks",
    table: &TRACKS_TABLE,
    file_name: "tracks.json",
    fields: TRACK_FIELDS,
    sort: SortRule {
        field: "uploadDate",
        direction: SortDirection::Descending,
    },
    seed: Some(seed_tracks),
};

static MHOUSE: CollectionSpec = CollectionSpec {
    name: "mhouse",
    table: &MHOUSE_TRACKS_TABLE,
    file_name: "mhouse.json",
    fields: TRACK_FIELDS,
    sort: SortRule {
        field: "uploadDate",
        direction: SortDirection::Descending,
    },
    seed: Some(seed_mhouse),
};

static BANNERS: CollectionSpec = CollectionSpec {
    name: "banners",
    table: &BANNERS_TABLE,
    file_name: "banners.json",
    fields: &[
        field!("imagePath", "image_path", &SqlType::Text),
        field!("linkUrl", "link_url", &SqlType::Text),
        field!("displayOrder", "display_order", &SqlType::Integer),
    ],
    sort: SortRule {
        field: "displayOrder",
        direction: SortDirection::Ascending,
    },
    seed: None,
};

static YOUTUBE: CollectionSpec = CollectionSpec {
    name: "youtube",
    table: &YOUTUBE_TABLE,
    file_name: "youtube.json",
    fields: &[
        field!("videoId", "video_id", &SqlType::Text),
        field!("title", "title", &SqlType::Text),
        field!("displayOrder", "display_order", &SqlType::Integer),
    ],
    sort: SortRule {
        field: "displayOrder",
        direction: SortDirection::Ascending,
    },
    seed: Some(seed_youtube),
};

// =============================================================================
// Seed sets
// =============================================================================

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn seed_track(title: &str, image: &str, audio: &str, bandcamp: &str, now: &str) -> Record {
    into_record(json!({
        "title": title,
        "genre": "House",
        "image": image,
        "audio": audio,
        "bandcamp": bandcamp,
        "uploadDate": now,
        "stats": { "views": 0, "downloads": 0, "wavClicks": 0, "plays": 0 },
    }))
}

fn seed_tracks(now: &str) -> Vec<Record> {
    [
        (
            "Chandra (Kratex Remix)",
            "assets/chandra.png",
            "assets/music/chandra.wav",
            "https://bandcamp.com/tag/kratex",
        ),
        ("Ethereal Frequencies", "assets/album1.png", "", "https://bandcamp.com"),
        ("Deep Echoes", "assets/album2.png", "", "https://bandcamp.com"),
        ("Urban Pulse", "assets/album3.png", "", "https://bandcamp.com"),
        (
            "Chandra (Original)",
            "assets/chandra.png",
            "assets/music/chandra.wav",
            "https://bandcamp.com",
        ),
        (
            "Velvet Underground",
            "https://placehold.co/500x500/222/FFF?text=Velvet",
            "",
            "https://bandcamp.com",
        ),
        (
            "Concrete Jungle",
            "https://placehold.co/500x500/333/FFF?text=Concrete",
            "",
            "https://bandcamp.com",
        ),
        (
            "Analog Dreams",
            "https://placehold.co/500x500/444/FFF?text=Analog",
            "",
            "https://bandcamp.com",
        ),
        (
            "Digital Soul",
            "https://placehold.co/500x500/555/FFF?text=Soul",
            "",
            "https://bandcamp.com",
        ),
        (
            "System Glitch",
            "https://placehold.co/500x500/666/FFF?text=Glitch",
            "",
            "https://bandcamp.com",
        ),
    ]
    .into_iter()
    .map(|(title, image, audio, bandcamp)| seed_track(title, image, audio, bandcamp, now))
    .collect()
}

fn seed_mhouse(now: &str) -> Vec<Record> {
    [
        ("Deep Unity", "https://placehold.co/300x300/111/FFF?text=MH001"),
        ("Rhythm Soul", "https://placehold.co/300x300/222/FFF?text=MH002"),
        ("Late Night", "https://placehold.co/300x300/333/FFF?text=MH003"),
        ("Vibes", "https://placehold.co/300x300/444/FFF?text=MH004"),
        ("Anthem", "https://placehold.co/300x300/555/FFF?text=MH005"),
    ]
    .into_iter()
    .map(|(title, image)| seed_track(title, image, "", "", now))
    .collect()
}

fn seed_youtube(_now: &str) -> Vec<Record> {
    ["dQw4w9WgXcQ", "kJQP7kiw5Fk", "dummy_id_1", "dummy_id_2", "dummy_id_3"]
        .into_iter()
        .enumerate()
        .map(|(position, video_id)| {
            into_record(json!({
                "videoId": video_id,
                "title": "Video",
                "displayOrder": position,
            }))
        })
        .collect()
}
