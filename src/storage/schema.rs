//! SQLite table definitions for the relational backend.
//!
//! Tracks and M-House tracks share one column layout; the stats counters
//! are flat columns that get reshaped into a nested `stats` object on read.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table};

const TRACK_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!(
        "id",
        &SqlType::Integer,
        is_primary_key = true,
        autoincrement = true
    ),
    sqlite_column!("title", &SqlType::Text, non_null = true),
    sqlite_column!("genre", &SqlType::Text),
    sqlite_column!("image", &SqlType::Text),
    sqlite_column!("audio", &SqlType::Text),
    sqlite_column!("bandcamp", &SqlType::Text),
    sqlite_column!("upload_date", &SqlType::Text),
    sqlite_column!(
        "views",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("0")
    ),
    sqlite_column!(
        "downloads",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("0")
    ),
    sqlite_column!(
        "wav_clicks",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("0")
    ),
    sqlite_column!(
        "plays",
        &SqlType::Integer,
        non_null = true,
        default_value = Some("0")
    ),
];

pub const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: TRACK_COLUMNS,
    indices: &[("idx_tracks_upload_date", "upload_date")],
};

pub const MHOUSE_TRACKS_TABLE: Table = Table {
    name: "mhouse_tracks",
    columns: TRACK_COLUMNS,
    indices: &[("idx_mhouse_tracks_upload_date", "upload_date")],
};

pub const BANNERS_TABLE: Table = Table {
    name: "banners",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            autoincrement = true
        ),
        sqlite_column!("image_path", &SqlType::Text, non_null = true),
        sqlite_column!("link_url", &SqlType::Text),
        sqlite_column!(
            "display_order",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_banners_display_order", "display_order")],
};

pub const YOUTUBE_TABLE: Table = Table {
    name: "youtube_tracks",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            autoincrement = true
        ),
        sqlite_column!("video_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!(
            "display_order",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_youtube_tracks_display_order", "display_order")],
};

pub const SETTINGS_TABLE: Table = Table {
    name: "settings",
    columns: &[
        sqlite_column!("key_name", &SqlType::Text, is_primary_key = true),
        sqlite_column!("key_value", &SqlType::Text),
    ],
    indices: &[],
};

pub const ALL_TABLES: &[&Table] = &[
    &TRACKS_TABLE,
    &MHOUSE_TRACKS_TABLE,
    &BANNERS_TABLE,
    &YOUTUBE_TABLE,
    &SETTINGS_TABLE,
];
