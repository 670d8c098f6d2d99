// LogDeck - core/creation.rs
//
// Two-phase project creation state machine.
//
//   Form -> Generating -> Download -> GrafanaCreating -> Success
//
// Phase-1 failure rolls back to Form with wizard data intact. Phase-2
// failure rolls back to Download with the provisional project id intact,
// so only the dashboard step has to be retried.
//
// Pure transitions only: the caller performs the requests and feeds the
// results back in. Results that arrive for a phase the flow is no longer
// in are ignored.

use crate::core::model::{
    CreationEvent, ProjectListRoute, Step1Request, Step1Response, Step2Request,
};
use crate::core::wizard::WizardSession;
use crate::util::error::{ApiError, CreationError};

/// Current phase of the creation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationPhase {
    Form,
    Generating,
    Download {
        project_id: String,
        script_url: String,
    },
    GrafanaCreating {
        project_id: String,
        script_url: String,
    },
    Success {
        project_id: String,
    },
}

impl CreationPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Generating => "generating",
            Self::Download { .. } => "download",
            Self::GrafanaCreating { .. } => "grafana-creating",
            Self::Success { .. } => "success",
        }
    }

    /// Provisional project id, once phase 1 has succeeded.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Download { project_id, .. }
            | Self::GrafanaCreating { project_id, .. }
            | Self::Success { project_id } => Some(project_id),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CreationFlow {
    phase: CreationPhase,
    session: WizardSession,
    last_error: Option<String>,
}

impl CreationFlow {
    pub fn new(session: WizardSession) -> Self {
        Self {
            phase: CreationPhase::Form,
            session,
            last_error: None,
        }
    }

    pub fn phase(&self) -> &CreationPhase {
        &self.phase
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WizardSession {
        &mut self.session
    }

    /// Message of the most recent failure, cleared when a new request starts.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// A request is in flight; re-submission must be disabled.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            CreationPhase::Generating | CreationPhase::GrafanaCreating { .. }
        )
    }

    /// Form -> Generating. Runs the pre-submission guard and builds the
    /// phase-1 request. No state changes if the guard fails.
    pub fn begin_submit(&mut self) -> Result<Step1Request, CreationError> {
        self.require("submit", matches!(self.phase, CreationPhase::Form))?;
        if let Err(e) = self.session.validate_for_submit() {
            self.last_error = Some(e.to_string());
            return Err(CreationError::MissingRequired(e));
        }
        let request = self.session.build_step1_request();
        self.phase = CreationPhase::Generating;
        self.last_error = None;
        tracing::debug!(project = %request.project_name, "Phase 1 submitted");
        Ok(request)
    }

    /// Apply the phase-1 result. Returns `None` if the flow has left
    /// `Generating` in the meantime.
    pub fn on_phase1(
        &mut self,
        result: Result<Step1Response, ApiError>,
    ) -> Option<CreationEvent> {
        if self.phase != CreationPhase::Generating {
            tracing::debug!(phase = self.phase.name(), "Ignoring stale phase 1 result");
            return None;
        }
        match result {
            Ok(response) => {
                self.phase = CreationPhase::Download {
                    project_id: response.project_id.clone(),
                    script_url: response.set_up_script_url.clone(),
                };
                Some(CreationEvent::ReadyToInstall {
                    project_id: response.project_id,
                    script_url: response.set_up_script_url,
                })
            }
            Err(e) => {
                let err = CreationError::Phase1(e);
                tracing::warn!(error = %err, "Phase 1 failed; returning to form");
                self.last_error = Some(err.to_string());
                self.phase = CreationPhase::Form;
                Some(CreationEvent::Failed(err))
            }
        }
    }

    /// Download -> GrafanaCreating, after the user confirms the install
    /// script has been run on the target host.
    pub fn confirm_install(&mut self) -> Result<Step2Request, CreationError> {
        let CreationPhase::Download {
            project_id,
            script_url,
        } = &self.phase
        else {
            return Err(CreationError::InvalidPhase {
                action: "start dashboard generation",
                phase: self.phase.name(),
            });
        };
        let request = Step2Request {
            project_id: project_id.clone(),
        };
        self.phase = CreationPhase::GrafanaCreating {
            project_id: project_id.clone(),
            script_url: script_url.clone(),
        };
        self.last_error = None;
        Ok(request)
    }

    /// Apply the phase-2 result. Returns `None` if the flow has left
    /// `GrafanaCreating` in the meantime.
    pub fn on_phase2(&mut self, result: Result<(), ApiError>) -> Option<CreationEvent> {
        let CreationPhase::GrafanaCreating {
            project_id,
            script_url,
        } = &self.phase
        else {
            tracing::debug!(phase = self.phase.name(), "Ignoring stale phase 2 result");
            return None;
        };
        let (project_id, script_url) = (project_id.clone(), script_url.clone());
        match result {
            Ok(()) => {
                self.phase = CreationPhase::Success { project_id };
                Some(CreationEvent::Succeeded {
                    route: ProjectListRoute {
                        dashboard_creating: true,
                    },
                })
            }
            Err(e) => {
                let err = CreationError::Phase2(e);
                tracing::warn!(project_id = %project_id, error = %err, "Phase 2 failed; returning to download");
                self.last_error = Some(err.to_string());
                self.phase = CreationPhase::Download {
                    project_id,
                    script_url,
                };
                Some(CreationEvent::Failed(err))
            }
        }
    }

    /// The request for the current phase ended without a result. Rolls
    /// back the same way a failed request would.
    pub fn on_worker_lost(&mut self) -> Option<CreationEvent> {
        let (err, rollback) = match &self.phase {
            CreationPhase::Generating => (
                CreationError::WorkerLost { phase: "phase 1" },
                CreationPhase::Form,
            ),
            CreationPhase::GrafanaCreating {
                project_id,
                script_url,
            } => (
                CreationError::WorkerLost { phase: "phase 2" },
                CreationPhase::Download {
                    project_id: project_id.clone(),
                    script_url: script_url.clone(),
                },
            ),
            _ => return None,
        };
        tracing::warn!(error = %err, "Creation request lost");
        self.last_error = Some(err.to_string());
        self.phase = rollback;
        Some(CreationEvent::Failed(err))
    }

    /// Leave the install guide and return to the wizard's review step.
    /// Not allowed while a request is in flight.
    pub fn cancel_to_form(&mut self) -> Result<(), CreationError> {
        if self.is_busy() || matches!(self.phase, CreationPhase::Success { .. }) {
            return Err(CreationError::InvalidPhase {
                action: "cancel",
                phase: self.phase.name(),
            });
        }
        self.phase = CreationPhase::Form;
        self.session.return_to_review();
        Ok(())
    }

    fn require(&self, action: &'static str, ok: bool) -> Result<(), CreationError> {
        if ok {
            Ok(())
        } else {
            Err(CreationError::InvalidPhase {
                action,
                phase: self.phase.name(),
            })
        }
    }
}

// =============================================================================
// Unit tests
// =============================================================================
