//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "RestaurantRealtime";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default push endpoint of the restaurant backend.
pub const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:8000/ws/restaurant/";

/// Environment variable overriding the push endpoint.
pub const WEBSOCKET_URL_ENV: &str = "RMS_WEBSOCKET_URL";

/// Environment variable supplying a bearer token.
pub const TOKEN_ENV: &str = "RMS_TOKEN";

/// Query parameter carrying the bearer token on the push endpoint.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Maximum consecutive reconnect attempts after abnormal closes.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Delay before the first reconnect attempt, in milliseconds.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Multiplier applied to the reconnect delay per attempt.
pub const RECONNECT_GROWTH_FACTOR: f64 = 1.5;

/// Cap on the exponential part of the reconnect delay, in milliseconds.
pub const RECONNECT_MAX_DELAY_MS: u64 = 5_000;

/// Upper (exclusive) bound of the random jitter added to each delay, in milliseconds.
pub const RECONNECT_MAX_JITTER_MS: u64 = 1_000;

/// File name of the persisted session token inside the data directory.
pub const SESSION_TOKEN_FILE: &str = "session.token";

/// Log file name prefix.
pub const LOG_FILE_NAME: &str = "rms-realtime.log";
