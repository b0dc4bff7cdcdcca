/// File name of the timeline cache database inside the data directory
pub const TIMELINE_DB_FILE: &str = "timeline.db";

/// Default capacity of the in-memory user profile cache
pub const DEFAULT_PROFILE_CACHE_CAPACITY: usize = 100;

/// Default capacity of the in-memory room cache
pub const DEFAULT_ROOM_CACHE_CAPACITY: usize = 100;

/// Default number of media records retained locally
pub const DEFAULT_MEDIA_MAX_ENTRIES: usize = 500;

/// Length of a hex-encoded BLAKE3 digest
pub const MEDIA_KEY_HEX_LEN: usize = 64;
