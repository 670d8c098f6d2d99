// LogDeck - app/api.rs
//
// HTTP client wrapper and the backend API surface.
//
// - One `reqwest::blocking::Client` per process, built with the configured
//   timeout; calls run on whichever thread invokes them (the managers use
//   background workers).
// - The bearer token is read from the shared `AuthStore` on every request.
// - A 401 clears the stored token and surfaces `ApiError::Unauthorized`;
//   navigation is left to the caller.
// - Responses are accepted either wrapped as `{"data": ...}` or bare.
//
// `ProjectApi` is the seam the stores and managers depend on so they can
// be driven by an in-process fake in tests.

use crate::app::auth::AuthStore;
use crate::core::model::{
    AuthResponse, DashboardCreationStatus, DashboardLink, Enveloped, OAuthTokens, Page,
    Profile, Project, ProjectDashboardStatus, ProjectStatus, Step1Request, Step1Response,
    Step2Request, UpdateProfileRequest, UpdateProjectRequest,
};
use crate::util::constants::{MAX_ERROR_BODY_CHARS, USER_AGENT};
use crate::util::error::ApiError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Project, creation, and status endpoints.
pub trait ProjectApi: Send + Sync {
    fn list_projects(&self, page: u32, page_size: u32) -> Result<Page<Project>, ApiError>;
    fn get_project(&self, id: &str) -> Result<Project, ApiError>;
    fn update_project(&self, id: &str, update: &UpdateProjectRequest)
        -> Result<Project, ApiError>;
    fn delete_project(&self, id: &str) -> Result<(), ApiError>;
    fn generate_dashboard_link(&self, id: &str) -> Result<DashboardLink, ApiError>;

    /// Phase 1: configure log collection, returning the provisional id.
    fn create_step1(&self, request: &Step1Request) -> Result<Step1Response, ApiError>;
    /// Phase 2: generate the dashboard for a provisioned project.
    fn create_step2(&self, request: &Step2Request) -> Result<(), ApiError>;

    /// Aggregate status of every dashboard still being generated.
    fn dashboard_creation_status(&self) -> Result<DashboardCreationStatus, ApiError>;
    /// Status of one project's dashboard.
    fn project_dashboard_status(&self, id: &str) -> Result<ProjectStatus, ApiError>;
}

// =============================================================================
// ApiClient
// =============================================================================

pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthStore,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, auth: AuthStore) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::ClientBuild { source: e })?;
        tracing::debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "API client ready");
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and return the body of a successful response.
    fn execute(&self, endpoint: &str, builder: RequestBuilder) -> Result<String, ApiError> {
        tracing::debug!(endpoint, "Sending request");
        let response = builder.send().map_err(|e| transport_error(endpoint, e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.auth.clear_token();
            return Err(ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }

        let body = response.text().map_err(|e| transport_error(endpoint, e))?;
        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "Request rejected");
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }

    fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(endpoint, builder)?;
        decode(endpoint, &body)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(path, self.request(Method::GET, path))
    }

    // -- Auth --

    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let path = "/auth/login";
        let body = json!({ "email": email, "password": password });
        self.call(path, self.request(Method::POST, path).json(&body))
    }

    pub fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let path = "/auth/signup";
        let body = json!({ "name": name, "email": email, "password": password });
        self.call(path, self.request(Method::POST, path).json(&body))
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        let path = "/auth/logout";
        self.execute(path, self.request(Method::POST, path))?;
        Ok(())
    }

    pub fn me(&self) -> Result<AuthResponse, ApiError> {
        self.get("/auth/me")
    }

    pub fn exchange_google(&self, google_token: &str) -> Result<OAuthTokens, ApiError> {
        let path = "/user/login/google";
        let body = json!({ "token": google_token });
        self.call(path, self.request(Method::POST, path).json(&body))
    }

    pub fn exchange_github(&self, code: &str) -> Result<OAuthTokens, ApiError> {
        let path = "/user/login/github";
        let body = json!({ "code": code });
        self.call(path, self.request(Method::POST, path).json(&body))
    }

    // -- Profile --

    pub fn get_profile(&self) -> Result<Profile, ApiError> {
        self.get("/profile")
    }

    pub fn update_profile(&self, update: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        let path = "/profile";
        self.call(path, self.request(Method::PATCH, path).json(update))
    }

    pub fn change_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        let path = "/profile/change-password";
        let body = json!({ "currentPassword": current, "newPassword": new });
        self.execute(path, self.request(Method::POST, path).json(&body))?;
        Ok(())
    }
}

impl ProjectApi for ApiClient {
    fn list_projects(&self, page: u32, page_size: u32) -> Result<Page<Project>, ApiError> {
        let path = "/monitoring/projects/";
        let builder = self
            .request(Method::GET, path)
            .query(&[("page", page), ("page_size", page_size)]);
        self.call(path, builder)
    }

    fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.get(&format!("/projects/{id}"))
    }

    fn update_project(
        &self,
        id: &str,
        update: &UpdateProjectRequest,
    ) -> Result<Project, ApiError> {
        let path = format!("/projects/{id}");
        self.call(&path, self.request(Method::PATCH, &path).json(update))
    }

    fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/projects/{id}");
        self.execute(&path, self.request(Method::DELETE, &path))?;
        Ok(())
    }

    fn generate_dashboard_link(&self, id: &str) -> Result<DashboardLink, ApiError> {
        let path = format!("/projects/{id}/dashboard");
        self.call(&path, self.request(Method::POST, &path))
    }

    fn create_step1(&self, request: &Step1Request) -> Result<Step1Response, ApiError> {
        let path = "/monitoring/log-project/step1";
        self.call(path, self.request(Method::POST, path).json(request))
    }

    fn create_step2(&self, request: &Step2Request) -> Result<(), ApiError> {
        let path = "/monitoring/log-project/step2";
        self.execute(path, self.request(Method::POST, path).json(request))?;
        Ok(())
    }

    fn dashboard_creation_status(&self) -> Result<DashboardCreationStatus, ApiError> {
        self.get("/projects/dashboard-status")
    }

    fn project_dashboard_status(&self, id: &str) -> Result<ProjectStatus, ApiError> {
        let status: ProjectDashboardStatus = self.get(&format!("/projects/{id}/dashboard-status"))?;
        Ok(status.status)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn transport_error(endpoint: &str, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        ApiError::Network {
            endpoint: endpoint.to_string(),
            source: e,
        }
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str::<Enveloped<T>>(body)
        .map(Enveloped::into_inner)
        .map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source: e,
        })
}

/// Best-effort human message from an error body: `detail`, `message`, or
/// `error` if the body is JSON, otherwise the (truncated) raw text.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_detail() {
        assert_eq!(error_message(r#"{"detail":"name taken"}"#), "name taken");
        assert_eq!(error_message(r#"{"message":"bad path"}"#), "bad path");
        assert_eq!(error_message("  upstream down \n"), "upstream down");
    }

    #[test]
    fn test_error_message_truncates_raw_body() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS * 2);
        assert_eq!(error_message(&body).len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_decode_paged_envelope() {
        let body = r#"{"data":{"items":[
            {"id":"p1","name":"a","status":"READY"},
            {"id":"p2","name":"b","status":"IN_PROGRESS"},
            {"id":"p3","name":"c","status":"INITIATED"}],
            "total_items":25,"total_pages":3,"current_page":1,"page_size":10,
            "has_previous":false,"has_next":true}}"#;
        let page: Page<Project> = decode("/monitoring/projects/", body).unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
    }

    #[test]
    fn test_decode_failure_names_endpoint() {
        let err = decode::<Step1Response>("/monitoring/log-project/step1", "{}").unwrap_err();
        assert!(err.to_string().contains("step1"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = ApiClient::new("not a url", Duration::from_secs(1), AuthStore::in_memory());
        assert!(matches!(result, Err(ApiError::InvalidBaseUrl { .. })));
    }
}
