// LogDeck - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// These types are the shared vocabulary across all layers: server-side
// resources (projects, dashboards, users), wizard-local parsing
// configuration, and the progress messages background workers send.

use crate::util::error::{ApiError, CreationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Project status
// =============================================================================

/// Server-reported lifecycle state of a project or dashboard job.
///
/// Progression is INITIATED -> IN_PROGRESS -> READY, with FAILED reachable
/// from either non-terminal state. Unknown values are kept verbatim in
/// `Other` and treated as in flight, so a newer server can add states
/// without breaking polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    Initiated,
    InProgress,
    Ready,
    Failed,
    Other(String),
}

impl ProjectStatus {
    /// True for states from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initiated => "INITIATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ProjectStatus {
    fn from(s: String) -> Self {
        // The aggregate dashboard endpoint reports creating/completed/failed.
        match s.as_str() {
            "INITIATED" | "initiated" => Self::Initiated,
            "IN_PROGRESS" | "in_progress" | "creating" => Self::InProgress,
            "READY" | "ready" | "completed" => Self::Ready,
            "FAILED" | "failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        match status {
            ProjectStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Projects and dashboards
// =============================================================================

/// Monitoring dashboard generated for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "dataSources")]
    pub data_sources: Vec<String>,
    /// Not set until the dashboard has been provisioned.
    #[serde(default)]
    pub url: Option<String>,
}

/// Publicly shareable view of a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicDashboard {
    #[serde(alias = "publicUrl")]
    pub public_url: String,
    #[serde(alias = "dashboardId")]
    pub dashboard_id: String,
}

/// A log-collection project as reported by the server.
///
/// The client never writes `status` except by copying a polled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default, alias = "owner", alias = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "projectType", alias = "type")]
    pub project_type: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub dashboard: Option<Dashboard>,
    #[serde(default, alias = "publicDashboard")]
    pub public_dashboard: Option<PublicDashboard>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of a paged listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Body of `PATCH /projects/{id}`. Absent values are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateProjectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response of `POST /projects/{id}/dashboard`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardLink {
    #[serde(alias = "dashboardUrl")]
    pub dashboard_url: String,
}

/// Response of `GET /projects/{id}/dashboard-status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectDashboardStatus {
    pub status: ProjectStatus,
}

/// Response of the aggregate `GET /projects/dashboard-status` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCreationStatus {
    pub in_progress: bool,
    #[serde(default)]
    pub projects_in_progress: Vec<DashboardJob>,
}

/// One project whose dashboard is still being generated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardJob {
    pub project_id: String,
    pub project_name: String,
    pub status: ProjectStatus,
}

// =============================================================================
// Users and authentication
// =============================================================================

/// Minimal user identity kept alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Full profile returned by `/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Body of `PATCH /profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Response of password login, signup, and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
}

/// Token pair returned by the OAuth exchange endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

// =============================================================================
// Response envelopes
// =============================================================================

/// Responses arrive either wrapped as `{"data": T}` or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Enveloped<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Enveloped<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(inner) => inner,
        }
    }
}

// =============================================================================
// Parsing configuration (wizard-local)
// =============================================================================

/// Source log format. Changing it resets the field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LogFormat {
    #[default]
    Json,
    PlainText,
    Csv,
    Xml,
}

impl LogFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::PlainText => "plainText",
            Self::Csv => "csv",
            Self::Xml => "xml",
        }
    }
}

/// Operating system the install script targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    #[default]
    Linux,
}

/// One extraction field. `path` is a JSON dot-path for JSON logs and a
/// regex pattern for plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Locally generated; stable for the editing session.
    pub id: String,
    pub name: String,
    pub path: String,
}

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    #[default]
    Equals,
    NotEquals,
}

/// A filter on one field. `field` is matched against field names by string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub id: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

// =============================================================================
// Two-phase creation wire types
// =============================================================================

/// Custom JSON field mapping in the phase-1 request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonFieldMapping {
    pub name: String,
    pub json_path: String,
}

/// Filter as sent in the phase-1 request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

/// Body of `POST /monitoring/log-project/step1`. Slots that do not apply to
/// the chosen format are sent as empty strings or empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step1Request {
    pub log_paths: Vec<String>,
    pub project_name: String,
    pub project_description: String,
    pub multiline_pattern: String,
    pub timestamp_field: String,
    pub timestamp_json_path: String,
    pub log_level: String,
    pub log_level_json_path: String,
    pub custom_json_fields: Vec<JsonFieldMapping>,
    pub custom_plain_fields: Vec<String>,
    pub filters: Vec<FilterSpec>,
    pub platform: Platform,
}

/// Response of phase 1: the provisional project and its install script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step1Response {
    pub project_id: String,
    pub set_up_script_url: String,
}

/// Body of `POST /monitoring/log-project/step2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step2Request {
    pub project_id: String,
}

// =============================================================================
// Polling
// =============================================================================

/// One entity under observation: id, last-known display name and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEntity {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
}

impl WatchedEntity {
    pub fn is_in_flight(&self) -> bool {
        !self.status.is_terminal()
    }
}

impl From<&Project> for WatchedEntity {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            status: project.status.clone(),
        }
    }
}

impl From<&DashboardJob> for WatchedEntity {
    fn from(job: &DashboardJob) -> Self {
        Self {
            id: job.project_id.clone(),
            name: job.project_name.clone(),
            status: job.status.clone(),
        }
    }
}

/// Messages sent from the poll worker to its manager.
#[derive(Debug)]
pub enum PollProgress {
    /// Worker started watching this many entities.
    Started { count: usize },

    /// A tick finished. `changed` lists ids whose status moved this tick.
    Snapshot {
        entities: Vec<WatchedEntity>,
        changed: Vec<String>,
    },

    /// Fetching one entity failed; its last-known status is retained.
    EntityError { id: String, message: String },

    /// Every watched entity is terminal; the worker has exited.
    Completed { entities: Vec<WatchedEntity> },

    /// The worker observed a stop request and exited.
    Stopped,
}

// =============================================================================
// Creation
// =============================================================================

/// Messages sent from the creation worker to its manager.
#[derive(Debug)]
pub enum CreationProgress {
    Phase1Finished(Result<Step1Response, ApiError>),
    Phase2Finished(Result<(), ApiError>),
}

/// Where the caller should go once creation has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectListRoute {
    /// Start the list view's polling immediately: the new project is still
    /// transitioning.
    pub dashboard_creating: bool,
}

/// Outcome of applying a creation progress message.
#[derive(Debug)]
pub enum CreationEvent {
    /// Phase 1 succeeded; the install guide should be shown.
    ReadyToInstall {
        project_id: String,
        script_url: String,
    },
    /// Phase 2 succeeded.
    Succeeded { route: ProjectListRoute },
    /// A phase failed and the flow rolled back.
    Failed(CreationError),
}
