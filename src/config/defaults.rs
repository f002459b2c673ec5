/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Upstream timeouts (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LINK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROFILE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_GENRE_LISTING_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MEDIA_TIMEOUT_SECS: u64 = 30;

// Portal device emulation
pub const DEFAULT_MAC_ADDRESS: &str = "00:1A:79:00:00:00";
pub const DEFAULT_GENRE_BATCH_SIZE: usize = 5;

// Player user agents tried in order against Xtream panels
pub const DEFAULT_XTREAM_USER_AGENTS: &[&str] = &[
    "VLC/3.0.18 LibVLC/3.0.18",
    "Lavf/58.76.100",
    "okhttp/4.9.3",
];

// Sync defaults
pub const DEFAULT_SYNC_ON_STARTUP: bool = false;

// Environment variable prefix for overrides (nested keys split on "__")
pub const ENV_PREFIX: &str = "PORTAL_PROXY_";
