// LogDeck - app/store.rs
//
// Project store: explicit state container for the project list, the
// currently selected project, and pagination.
//
// Single writer (the owner of the `ProjectStore`), read through `state()`.
// Every failed operation records an operation-specific message in
// `state.error` and also returns the error, so callers can both render and
// branch on it.

use crate::app::api::ProjectApi;
use crate::core::model::{DashboardLink, Page, Project, UpdateProjectRequest, WatchedEntity};
use crate::util::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::util::error::{ApiError, StoreError, StoreOperation};
use std::sync::Arc;

/// Observable state of the project store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    pub projects: Vec<Project>,
    pub current_project: Option<Project>,
    pub total_items: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            current_project: None,
            total_items: 0,
            total_pages: 0,
            current_page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            has_previous: false,
            has_next: false,
            is_loading: false,
            error: None,
        }
    }
}

pub struct ProjectStore {
    api: Arc<dyn ProjectApi>,
    state: ProjectState,
}

impl ProjectStore {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            state: ProjectState::default(),
        }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    /// Fetch one page. `page` defaults to 1 and `page_size` to 10.
    pub fn fetch_projects(
        &mut self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<&[Project], StoreError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let result = self.run(StoreOperation::FetchList, |api| {
            api.list_projects(page, page_size)
        })?;
        self.apply_page(result);
        tracing::debug!(
            page,
            count = self.state.projects.len(),
            total = self.state.total_items,
            "Projects fetched"
        );
        Ok(&self.state.projects)
    }

    pub fn fetch_project(&mut self, id: &str) -> Result<&Project, StoreError> {
        let project = self.run(StoreOperation::FetchOne, |api| api.get_project(id))?;
        self.replace_in_list(&project);
        Ok(self.state.current_project.insert(project))
    }

    pub fn update_project(
        &mut self,
        id: &str,
        update: &UpdateProjectRequest,
    ) -> Result<&Project, StoreError> {
        let project = self.run(StoreOperation::Update, |api| api.update_project(id, update))?;
        self.replace_in_list(&project);
        tracing::info!(id, "Project updated");
        Ok(self.state.current_project.insert(project))
    }

    /// Delete remotely, then drop it from the list and from
    /// `current_project` if it was selected.
    pub fn delete_project(&mut self, id: &str) -> Result<(), StoreError> {
        self.run(StoreOperation::Delete, |api| api.delete_project(id))?;
        let before = self.state.projects.len();
        self.state.projects.retain(|p| p.id != id);
        if self.state.projects.len() < before {
            self.state.total_items = self.state.total_items.saturating_sub(1);
        }
        if self
            .state
            .current_project
            .as_ref()
            .is_some_and(|p| p.id == id)
        {
            self.state.current_project = None;
        }
        tracing::info!(id, "Project deleted");
        Ok(())
    }

    pub fn generate_dashboard_link(&mut self, id: &str) -> Result<DashboardLink, StoreError> {
        self.run(StoreOperation::GenerateDashboard, |api| {
            api.generate_dashboard_link(id)
        })
    }

    pub fn set_current_project(&mut self, project: Option<Project>) {
        self.state.current_project = project;
    }

    /// Copy polled statuses into the cached projects. Returns how many
    /// cached entries changed.
    pub fn apply_polled(&mut self, snapshot: &[WatchedEntity]) -> usize {
        let mut updated = 0;
        let cached = self
            .state
            .projects
            .iter_mut()
            .chain(self.state.current_project.iter_mut());
        for project in cached {
            if let Some(entity) = snapshot.iter().find(|e| e.id == project.id) {
                if project.status != entity.status {
                    project.status = entity.status.clone();
                    updated += 1;
                }
            }
        }
        updated
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    pub fn reset(&mut self) {
        self.state = ProjectState::default();
    }

    /// Run one API call with loading/error bookkeeping.
    fn run<T>(
        &mut self,
        operation: StoreOperation,
        call: impl FnOnce(&dyn ProjectApi) -> Result<T, ApiError>,
    ) -> Result<T, StoreError> {
        self.state.is_loading = true;
        self.state.error = None;
        let result = call(self.api.as_ref());
        self.state.is_loading = false;
        result.map_err(|source| {
            let err = StoreError { operation, source };
            tracing::warn!(error = %err, "Project store operation failed");
            self.state.error = Some(err.to_string());
            err
        })
    }

    fn apply_page(&mut self, page: Page<Project>) {
        self.state.projects = page.items;
        self.state.total_items = page.total_items;
        self.state.total_pages = page.total_pages;
        self.state.current_page = page.current_page;
        self.state.page_size = page.page_size;
        self.state.has_previous = page.has_previous;
        self.state.has_next = page.has_next;
    }

    fn replace_in_list(&mut self, project: &Project) {
        if let Some(slot) = self.state.projects.iter_mut().find(|p| p.id == project.id) {
            *slot = project.clone();
        }
    }
}
