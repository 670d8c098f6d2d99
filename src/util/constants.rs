// LogDeck - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogDeck";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogDeck";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// HTTP client
// =============================================================================

/// Base URL used when neither the environment nor config.toml supplies one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the configured API base URL.
pub const API_BASE_URL_ENV: &str = "LOGDECK_API_BASE_URL";

/// Request timeout after which a call is treated as failed.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Lower bound accepted for `[api] timeout_secs`.
pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;

/// Upper bound accepted for `[api] timeout_secs`.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("logdeck/", env!("CARGO_PKG_VERSION"));

/// Maximum number of characters of an error response body kept in an
/// `ApiError::Status` message.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

// =============================================================================
// Polling
// =============================================================================

/// Interval between status checks while any watched entity is in flight.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Lower bound accepted for `[polling] interval_secs`.
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// Upper bound accepted for `[polling] interval_secs`.
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

/// The poll worker sleeps in slices of this length so a stop request is
/// observed promptly.
pub const POLL_CANCEL_CHECK_INTERVAL_MS: u64 = 50;

// =============================================================================
// Projects
// =============================================================================

/// Page requested when the caller does not specify one.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size requested when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Hard upper bound on page size accepted from the command line.
pub const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// Wizard
// =============================================================================

/// Field names every parsing configuration starts with. They cannot be
/// deleted and no other field may be renamed onto them.
pub const DEFAULT_FIELD_NAMES: [&str; 3] = ["timestamp", "level", "msg_detail"];

/// Field that carries the event timestamp (sent in its own request slot).
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field that carries the severity level (sent in its own request slot).
pub const LEVEL_FIELD: &str = "level";

/// Fallback JSON path for the timestamp when the field has no path.
pub const DEFAULT_TIMESTAMP_JSON_PATH: &str = "data.timestamp";

/// Fallback JSON path for the level when the field has no path.
pub const DEFAULT_LEVEL_JSON_PATH: &str = "data.level";

/// Multiline start-of-record pattern offered for plain-text logs.
pub const DEFAULT_MULTILINE_PATTERN: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}";

/// Project name length bounds (characters).
pub const MIN_PROJECT_NAME_CHARS: usize = 2;
pub const MAX_PROJECT_NAME_CHARS: usize = 50;

/// Maximum project description length (characters).
pub const MAX_PROJECT_DESCRIPTION_CHARS: usize = 500;

/// Maximum length of any user-supplied regex pattern.
pub const MAX_PATTERN_LENGTH: usize = 4096;

/// Number of wizard steps before submission.
pub const WIZARD_STEP_COUNT: u8 = 4;

// =============================================================================
// Persistence and configuration
// =============================================================================

/// Config file name (lives in the app config directory).
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Persisted auth state file name (lives in the app data directory).
pub const AUTH_STORAGE_FILE_NAME: &str = "auth-storage.json";

// =============================================================================
// Logging
// =============================================================================

/// Default log level when neither RUST_LOG, --debug, nor config is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";
