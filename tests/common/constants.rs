//! Shared constants for end-to-end tests
//!
//! When seed data or test fixtures change, update only this file.

// ============================================================================
// Seed Data
// ============================================================================

/// Number of tracks materialized into a fresh file-mode catalog
pub const SEEDED_TRACKS_COUNT: usize = 10;

/// Number of M-House tracks materialized into a fresh file-mode catalog
pub const SEEDED_MHOUSE_COUNT: usize = 5;

/// Number of YouTube entries materialized into a fresh file-mode catalog
pub const SEEDED_YOUTUBE_COUNT: usize = 5;

/// Title of the first seeded track
pub const SEEDED_TRACK_1_TITLE: &str = "Chandra (Kratex Remix)";

// ============================================================================
// Fixtures
// ============================================================================

/// Admin password used by settings tests
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Small fake PNG payload for upload tests
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";

/// Small fake WAV payload for upload tests
pub const FAKE_WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for a spawned server to answer
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout of a single test request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Delay between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
