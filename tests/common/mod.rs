// LogDeck - tests/common/mod.rs
//
// Shared fixtures for the end-to-end tests: a scriptable in-process
// `ProjectApi` and a minimal HTTP/1.1 server on a loopback socket.

#![allow(dead_code)]

use logdeck::app::api::ProjectApi;
use logdeck::core::model::{
    DashboardCreationStatus, DashboardLink, Page, Project, ProjectStatus, Step1Request,
    Step1Response, Step2Request, UpdateProjectRequest,
};
use logdeck::util::error::ApiError;
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Fake API
// =============================================================================

pub fn http_error(endpoint: &str, status: u16) -> ApiError {
    ApiError::Status {
        endpoint: endpoint.to_string(),
        status,
        message: String::new(),
    }
}

/// Scripted responses. Per-project status queues repeat their last entry;
/// `None` in a queue means "this fetch fails with HTTP 500".
#[derive(Default)]
pub struct FakeApi {
    pub step1: Mutex<VecDeque<Result<Step1Response, ApiError>>>,
    pub step2: Mutex<VecDeque<Result<(), ApiError>>>,
    pub step2_delay: Mutex<Duration>,
    pub statuses: Mutex<HashMap<String, VecDeque<Option<ProjectStatus>>>>,
    pub aggregate: Mutex<VecDeque<Result<DashboardCreationStatus, ApiError>>>,
    pub calls: Mutex<Vec<String>>,
    pub step1_requests: Mutex<Vec<Step1Request>>,
}

impl FakeApi {
    pub fn script_status(&self, id: &str, statuses: Vec<Option<ProjectStatus>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), statuses.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProjectApi for FakeApi {
    fn list_projects(&self, page: u32, page_size: u32) -> Result<Page<Project>, ApiError> {
        self.record(format!("list {page} {page_size}"));
        Ok(Page {
            items: Vec::new(),
            total_items: 0,
            total_pages: 0,
            current_page: page,
            page_size,
            has_previous: false,
            has_next: false,
        })
    }

    fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.record(format!("get {id}"));
        Err(http_error(&format!("/projects/{id}"), 404))
    }

    fn update_project(&self, id: &str, _: &UpdateProjectRequest) -> Result<Project, ApiError> {
        self.record(format!("update {id}"));
        Err(http_error(&format!("/projects/{id}"), 404))
    }

    fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.record(format!("delete {id}"));
        Ok(())
    }

    fn generate_dashboard_link(&self, id: &str) -> Result<DashboardLink, ApiError> {
        self.record(format!("link {id}"));
        Ok(DashboardLink {
            dashboard_url: format!("https://grafana.example.com/d/{id}"),
        })
    }

    fn create_step1(&self, request: &Step1Request) -> Result<Step1Response, ApiError> {
        self.record("step1".to_string());
        self.step1_requests.lock().unwrap().push(request.clone());
        self.step1
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(http_error("/monitoring/log-project/step1", 500)))
    }

    fn create_step2(&self, request: &Step2Request) -> Result<(), ApiError> {
        self.record(format!("step2 {}", request.project_id));
        let delay = *self.step2_delay.lock().unwrap();
        std::thread::sleep(delay);
        self.step2
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(http_error("/monitoring/log-project/step2", 500)))
    }

    fn dashboard_creation_status(&self) -> Result<DashboardCreationStatus, ApiError> {
        self.record("aggregate".to_string());
        let mut queue = self.aggregate.lock().unwrap();
        if queue.len() > 1 {
            return queue.pop_front().unwrap();
        }
        match queue.front() {
            Some(Ok(status)) => Ok(status.clone()),
            _ => Err(http_error("/projects/dashboard-status", 500)),
        }
    }

    fn project_dashboard_status(&self, id: &str) -> Result<ProjectStatus, ApiError> {
        self.record(format!("status {id}"));
        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses
            .get_mut(id)
            .ok_or_else(|| http_error(&format!("/projects/{id}/dashboard-status"), 404))?;
        let next = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        };
        next.ok_or_else(|| http_error(&format!("/projects/{id}/dashboard-status"), 500))
    }
}

// =============================================================================
// Loopback HTTP server
// =============================================================================

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct TestServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Serve every connection with `route(method, target) -> (status, body)`.
pub fn serve<F>(route: F) -> TestServer
where
    F: Fn(&str, &str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            handle(stream, &route, &log);
        }
    });
    TestServer { base_url, requests }
}

fn handle<F>(mut stream: TcpStream, route: &F, log: &Mutex<Vec<Recorded>>) -> Option<()>
where
    F: Fn(&str, &str) -> (u16, String),
{
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;

    let (status, response_body) = route(&method, &target);
    // Recorded before responding so the client never observes a response
    // whose request is not yet in the log.
    log.lock().unwrap().push(Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    let response = format!(
        "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
        response_body.len()
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()
}
