//! Shared constants for end-to-end tests
//!
//! When seeded test data changes, update only this file and fixtures.rs.

// ============================================================================
// Test Users
// ============================================================================

pub const USER_1: &str = "user-1";
pub const USER_2: &str = "user-2";
pub const USER_3: &str = "user-3";

// ============================================================================
// Seeded Catalog
// ============================================================================

pub const AUTHOR_NAME: &str = "The Test Band";

pub const SONG_TITLES: [&str; 3] = ["Opening Track", "Middle Track", "Closing Track"];

pub const ALBUM_TITLE: &str = "First Album";

pub const VIDEO_TITLE: &str = "Live Session";

pub const VIDEO_URL: &str = "https://videos.example.com/live-session.mp4";

/// Well-formed id that no seeded item uses.
pub const UNKNOWN_ITEM_ID: &str = "3f2b1c4e-1111-2222-3333-444455556666";

// ============================================================================
// Timeouts
// ============================================================================

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub const WS_MESSAGE_TIMEOUT_MS: u64 = 3000;
