// LogDeck - app/creation.rs
//
// Runs the two-phase creation requests on a background thread and feeds
// the results into the `CreationFlow` state machine.
//
// Same shape as the poll manager: a worker thread per request, an mpsc
// channel back to the caller, and a liveness flag. After `shutdown()` a
// late response is dropped on the worker side and never reaches the flow,
// which has already rolled back to its previous phase.

use crate::app::api::ProjectApi;
use crate::core::creation::{CreationFlow, CreationPhase};
use crate::core::model::{CreationEvent, CreationProgress};
use crate::core::wizard::WizardSession;
use crate::util::error::CreationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

pub struct CreationManager {
    api: Arc<dyn ProjectApi>,
    flow: CreationFlow,
    progress_rx: Option<mpsc::Receiver<CreationProgress>>,
    alive: Arc<AtomicBool>,
}

impl CreationManager {
    pub fn new(api: Arc<dyn ProjectApi>, session: WizardSession) -> Self {
        Self {
            api,
            flow: CreationFlow::new(session),
            progress_rx: None,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn flow(&self) -> &CreationFlow {
        &self.flow
    }

    pub fn phase(&self) -> &CreationPhase {
        self.flow.phase()
    }

    /// Wizard state, editable only while the form is showing.
    pub fn session_mut(&mut self) -> Option<&mut WizardSession> {
        match self.flow.phase() {
            CreationPhase::Form => Some(self.flow.session_mut()),
            _ => None,
        }
    }

    /// Start phase 1 in the background.
    pub fn submit(&mut self) -> Result<(), CreationError> {
        let request = self.flow.begin_submit()?;
        let api = Arc::clone(&self.api);
        self.spawn("phase 1", move || {
            CreationProgress::Phase1Finished(api.create_step1(&request))
        });
        Ok(())
    }

    /// The install script has been run; start phase 2 in the background.
    pub fn confirm_install(&mut self) -> Result<(), CreationError> {
        let request = self.flow.confirm_install()?;
        let api = Arc::clone(&self.api);
        self.spawn("phase 2", move || {
            CreationProgress::Phase2Finished(api.create_step2(&request))
        });
        Ok(())
    }

    pub fn cancel_to_form(&mut self) -> Result<(), CreationError> {
        self.flow.cancel_to_form()
    }

    fn spawn(
        &mut self,
        phase: &'static str,
        request: impl FnOnce() -> CreationProgress + Send + 'static,
    ) {
        let (tx, rx) = mpsc::channel();
        let alive = Arc::clone(&self.alive);
        self.progress_rx = Some(rx);
        std::thread::spawn(move || {
            let result = request();
            if !alive.load(Ordering::SeqCst) {
                tracing::debug!(phase, "Creation manager shut down; discarding response");
                return;
            }
            // Receiver gone means the manager was dropped.
            let _ = tx.send(result);
        });
        tracing::debug!(phase, "Creation request started");
    }

    /// Apply any finished request without blocking.
    pub fn poll_progress(&mut self) -> Vec<CreationEvent> {
        let Some(rx) = &self.progress_rx else {
            return Vec::new();
        };
        let received = rx.try_recv();
        match received {
            Ok(progress) => self.apply(progress).into_iter().collect(),
            Err(mpsc::TryRecvError::Empty) => Vec::new(),
            Err(mpsc::TryRecvError::Disconnected) => self.worker_lost().into_iter().collect(),
        }
    }

    /// Block until the in-flight request finishes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<CreationEvent> {
        let received = self.progress_rx.as_ref()?.recv_timeout(timeout);
        match received {
            Ok(progress) => self.apply(progress),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => self.worker_lost(),
        }
    }

    fn apply(&mut self, progress: CreationProgress) -> Option<CreationEvent> {
        self.progress_rx = None;
        match progress {
            CreationProgress::Phase1Finished(result) => self.flow.on_phase1(result),
            CreationProgress::Phase2Finished(result) => self.flow.on_phase2(result),
        }
    }

    fn worker_lost(&mut self) -> Option<CreationEvent> {
        self.progress_rx = None;
        self.flow.on_worker_lost()
    }

    /// Tear down: any response still in flight is discarded and the flow
    /// rolls back as if the worker had died, so it is never left busy.
    /// The manager stays usable; a later submit runs with a fresh flag.
    pub fn shutdown(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.alive = Arc::new(AtomicBool::new(true));
        if self.progress_rx.take().is_some() {
            self.flow.on_worker_lost();
            tracing::debug!(phase = self.flow.phase().name(), "In-flight request abandoned");
        }
    }
}

impl Drop for CreationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
