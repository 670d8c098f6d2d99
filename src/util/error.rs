// LogDeck - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation: every error keeps its cause so the
// full chain can be logged.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogDeck operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogDeckError {
    /// An HTTP call failed outside of a store or creation flow.
    Api(ApiError),

    /// A project store operation failed.
    Store(StoreError),

    /// The two-phase project creation failed.
    Creation(CreationError),

    /// The wizard session rejected its input.
    Wizard(WizardError),

    /// A field/filter edit was rejected.
    Field(FieldError),

    /// Persisted credentials could not be written.
    Credential(CredentialError),

    /// The command requires a logged-in user and none is stored.
    NotAuthenticated,

    /// I/O error with context.
    Io {
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LogDeckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "Request failed: {e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Creation(e) => write!(f, "{e}"),
            Self::Wizard(e) => write!(f, "Invalid project definition: {e}"),
            Self::Field(e) => write!(f, "Invalid field configuration: {e}"),
            Self::Credential(e) => write!(f, "Credential storage error: {e}"),
            Self::NotAuthenticated => write!(f, "Not logged in. Run `logdeck login` first."),
            Self::Io { operation, source } => write!(f, "I/O error during {operation}: {source}"),
        }
    }
}

impl std::error::Error for LogDeckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Creation(e) => Some(e),
            Self::Wizard(e) => Some(e),
            Self::Field(e) => Some(e),
            Self::Credential(e) => Some(e),
            Self::NotAuthenticated => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// API errors
// ---------------------------------------------------------------------------

/// Errors produced by the HTTP client wrapper.
#[derive(Debug)]
pub enum ApiError {
    /// The configured base URL cannot be used.
    InvalidBaseUrl { url: String, reason: String },

    /// The underlying HTTP client could not be constructed.
    ClientBuild { source: reqwest::Error },

    /// Connection-level failure (DNS, refused, TLS, reset).
    Network {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    Timeout { endpoint: String },

    /// The server answered 401. The stored token has already been cleared.
    Unauthorized { endpoint: String },

    /// The server answered with a non-success status.
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status code, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl { url, reason } => {
                write!(f, "Invalid API base URL '{url}': {reason}")
            }
            Self::ClientBuild { source } => write!(f, "Cannot build HTTP client: {source}"),
            Self::Network { endpoint, source } => {
                write!(f, "Network error calling {endpoint}: {source}")
            }
            Self::Timeout { endpoint } => write!(f, "Request to {endpoint} timed out"),
            Self::Unauthorized { endpoint } => {
                write!(f, "Unauthorized calling {endpoint}; please log in again")
            }
            Self::Status {
                endpoint,
                status,
                message,
            } => {
                if message.is_empty() {
                    write!(f, "{endpoint} returned HTTP {status}")
                } else {
                    write!(f, "{endpoint} returned HTTP {status}: {message}")
                }
            }
            Self::Decode { endpoint, source } => {
                write!(f, "Unexpected response from {endpoint}: {source}")
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ClientBuild { source } => Some(source),
            Self::Network { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ApiError> for LogDeckError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Project store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    FetchList,
    FetchOne,
    Update,
    Delete,
    GenerateDashboard,
}

impl StoreOperation {
    /// User-facing message for a failure of this operation.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::FetchList => "Failed to fetch projects",
            Self::FetchOne => "Failed to fetch project details",
            Self::Update => "Failed to update project",
            Self::Delete => "Failed to delete project",
            Self::GenerateDashboard => "Failed to generate dashboard link",
        }
    }
}

/// A project store operation failed; carries the operation for messaging.
#[derive(Debug)]
pub struct StoreError {
    pub operation: StoreOperation,
    pub source: ApiError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation.failure_message(), self.source)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<StoreError> for LogDeckError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Field / filter errors
// ---------------------------------------------------------------------------

/// A field or filter-condition edit was rejected. The display text is the
/// warning shown to the user; state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Default fields cannot be removed or renamed.
    ProtectedField { name: String },

    /// Another field already uses this default name.
    DuplicateDefaultName { name: String },

    /// No field with this id exists.
    UnknownField { id: String },

    /// A filter condition may only reference an existing field name.
    UnknownFieldName { name: String },

    /// No filter condition with this id exists.
    UnknownFilter { id: String },

    /// A reorder index is outside the field list.
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectedField { name } => {
                write!(f, "'{name}' is a default field and cannot be renamed or deleted")
            }
            Self::DuplicateDefaultName { name } => {
                write!(f, "'{name}' is a default field and cannot be used twice")
            }
            Self::UnknownField { id } => write!(f, "No field with id '{id}'"),
            Self::UnknownFieldName { name } => {
                write!(f, "No field named '{name}' to filter on")
            }
            Self::UnknownFilter { id } => write!(f, "No filter condition with id '{id}'"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "Position {index} is outside the field list (length {len})")
            }
        }
    }
}

impl std::error::Error for FieldError {}

impl From<FieldError> for LogDeckError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

// ---------------------------------------------------------------------------
// Wizard errors
// ---------------------------------------------------------------------------

/// Errors raised by wizard step validation and definition loading.
#[derive(Debug)]
pub enum WizardError {
    /// A required value is empty.
    MissingRequired { field: &'static str },

    /// A value is present but out of bounds.
    InvalidValue { field: &'static str, reason: String },

    /// A regex pattern does not compile.
    InvalidPattern {
        field: String,
        pattern: String,
        source: regex::Error,
    },

    /// A regex pattern exceeds the maximum allowed length.
    PatternTooLong {
        field: String,
        length: usize,
        max_length: usize,
    },

    /// A wizard definition file could not be read or parsed.
    Definition { path: PathBuf, reason: String },

    /// A field edit inside a definition file was rejected.
    Field(FieldError),
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { field } => write!(f, "Missing required field: {field}"),
            Self::InvalidValue { field, reason } => write!(f, "Invalid {field}: {reason}"),
            Self::InvalidPattern {
                field,
                pattern,
                source,
            } => write!(f, "Invalid pattern for '{field}' ('{pattern}'): {source}"),
            Self::PatternTooLong {
                field,
                length,
                max_length,
            } => write!(
                f,
                "Pattern for '{field}' is {length} chars, exceeds maximum of {max_length}"
            ),
            Self::Definition { path, reason } => {
                write!(f, "Cannot load '{}': {reason}", path.display())
            }
            Self::Field(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WizardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPattern { source, .. } => Some(source),
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for WizardError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<WizardError> for LogDeckError {
    fn from(e: WizardError) -> Self {
        Self::Wizard(e)
    }
}

// ---------------------------------------------------------------------------
// Creation errors
// ---------------------------------------------------------------------------

/// Failures of the two-phase project creation protocol.
///
/// Phase-1 and phase-2 failures are separate variants with
/// separate messages: a phase-2 failure means log collection was already
/// configured and only the dashboard is missing.
#[derive(Debug)]
pub enum CreationError {
    /// Client-side check failed; no request was sent.
    MissingRequired(WizardError),

    /// Log-collection configuration request failed.
    Phase1(ApiError),

    /// Dashboard generation request failed.
    Phase2(ApiError),

    /// The requested action is not valid in the current phase.
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },

    /// The background worker exited without reporting a result.
    WorkerLost { phase: &'static str },
}

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired(e) => write!(f, "Cannot submit project: {e}"),
            Self::Phase1(e) => write!(
                f,
                "Project creation failed while generating the log collection setup: {e}"
            ),
            Self::Phase2(e) => write!(
                f,
                "Dashboard generation failed (log collection is already configured; \
                 retry the dashboard step): {e}"
            ),
            Self::InvalidPhase { action, phase } => {
                write!(f, "Cannot {action} while in the '{phase}' phase")
            }
            Self::WorkerLost { phase } => {
                write!(f, "The {phase} request ended without a result")
            }
        }
    }
}

impl std::error::Error for CreationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingRequired(e) => Some(e),
            Self::Phase1(e) | Self::Phase2(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CreationError> for LogDeckError {
    fn from(e: CreationError) -> Self {
        Self::Creation(e)
    }
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

/// Errors writing the persisted auth state.
#[derive(Debug)]
pub enum CredentialError {
    /// The auth state could not be serialised.
    Serialize { source: serde_json::Error },

    /// Filesystem failure with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { source } => write!(f, "Cannot serialise auth state: {source}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize { source } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<CredentialError> for LogDeckError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}
