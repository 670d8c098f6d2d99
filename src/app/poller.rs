// LogDeck - app/poller.rs
//
// Status polling: watches a set of in-flight entities until every one of
// them is terminal.
//
// Architecture:
//   - `PollManager` lives on the caller's thread; `run_poller` runs on a
//     background thread and re-fetches statuses on a fixed interval.
//   - An `Arc<AtomicBool>` cancel flag stops the worker. Results are sent as
//     `PollProgress` messages over an mpsc channel; the caller drains them
//     with `poll_progress()`.
//   - One worker per manager. Ticks run sequentially on that worker, and the
//     next interval is measured from the end of the previous tick, so ticks
//     never overlap.
//   - A stopped worker discards whatever it fetched: it checks the cancel
//     flag after every fetch and cannot send once the receiver is dropped.
//
// Two status sources exist: `ProjectStatusSource` (one request per watched
// project) and `DashboardStatusSource` (one aggregate request per tick).
//
// State machine: Idle -> Running -> Stopping -> Idle. `start()` while
// Running is a no-op; `start()` while Stopping waits for the old worker.
// A worker that finished on its own is reaped by `start()`, `state()` and
// `is_running()`: its messages are absorbed immediately and held in
// `pending` until the caller reads them.

use crate::app::api::ProjectApi;
use crate::core::model::{PollProgress, ProjectStatus, WatchedEntity};
use crate::core::polling::{filter_in_flight, in_flight_count, merge_tick, EntityFetch};
use crate::util::constants::{DEFAULT_POLL_INTERVAL_MS, POLL_CANCEL_CHECK_INTERVAL_MS};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// =============================================================================
// Status sources
// =============================================================================

/// Fetches the current status of the watched entities for one tick.
///
/// Implementations must isolate failures: one entity failing yields a
/// `Failed` entry for it and does not affect the others.
pub trait StatusSource: Clone + Send + 'static {
    fn refresh(&mut self, watched: &[WatchedEntity]) -> Vec<EntityFetch>;
}

/// Polls `GET /projects/{id}/dashboard-status` for each in-flight entity.
#[derive(Clone)]
pub struct ProjectStatusSource {
    api: Arc<dyn ProjectApi>,
}

impl ProjectStatusSource {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self { api }
    }
}

impl StatusSource for ProjectStatusSource {
    fn refresh(&mut self, watched: &[WatchedEntity]) -> Vec<EntityFetch> {
        watched
            .iter()
            .filter(|e| e.is_in_flight())
            .map(|entity| match self.api.project_dashboard_status(&entity.id) {
                Ok(status) => EntityFetch::Updated(WatchedEntity {
                    status,
                    ..entity.clone()
                }),
                Err(e) => EntityFetch::Failed {
                    id: entity.id.clone(),
                    message: e.to_string(),
                },
            })
            .collect()
    }
}

/// Polls the aggregate `GET /projects/dashboard-status` endpoint.
///
/// Watched entities no longer listed as in progress are reported READY,
/// as is everything once the server says nothing is in progress. The
/// caller is expected to re-list projects on completion for the
/// authoritative final state.
///
/// Built with `new`, every listed job joins the watched set, so polling
/// runs until the server has nothing in progress. Built with
/// `watched_only`, listed jobs outside the initial set are ignored.
#[derive(Clone)]
pub struct DashboardStatusSource {
    api: Arc<dyn ProjectApi>,
    watched_only: bool,
}

impl DashboardStatusSource {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            watched_only: false,
        }
    }

    /// Follow only the entities passed to `start()`.
    pub fn watched_only(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            watched_only: true,
        }
    }
}

impl StatusSource for DashboardStatusSource {
    fn refresh(&mut self, watched: &[WatchedEntity]) -> Vec<EntityFetch> {
        let in_flight = watched.iter().filter(|e| e.is_in_flight());
        let status = match self.api.dashboard_creation_status() {
            Ok(status) => status,
            Err(e) => {
                let message = e.to_string();
                return in_flight
                    .map(|entity| EntityFetch::Failed {
                        id: entity.id.clone(),
                        message: message.clone(),
                    })
                    .collect();
            }
        };

        let mut fetches: Vec<EntityFetch> = status
            .projects_in_progress
            .iter()
            .filter(|job| !self.watched_only || watched.iter().any(|e| e.id == job.project_id))
            .map(|job| {
                let mut entity = WatchedEntity::from(job);
                if !status.in_progress && entity.is_in_flight() {
                    entity.status = ProjectStatus::Ready;
                }
                EntityFetch::Updated(entity)
            })
            .collect();

        for entity in in_flight {
            let listed = status
                .projects_in_progress
                .iter()
                .any(|job| job.project_id == entity.id);
            if !listed {
                fetches.push(EntityFetch::Updated(WatchedEntity {
                    status: ProjectStatus::Ready,
                    ..entity.clone()
                }));
            }
        }
        fetches
    }
}

// =============================================================================
// PollManager
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopping,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    progress_rx: mpsc::Receiver<PollProgress>,
}

type CompletionCallback = Box<dyn FnMut(&[WatchedEntity])>;

/// Manages one polling worker and the latest snapshot it reported.
pub struct PollManager<S: StatusSource> {
    source: S,
    interval: Duration,
    worker: Option<Worker>,
    stopping: Option<JoinHandle<()>>,
    snapshot: Vec<WatchedEntity>,
    notification_visible: bool,
    on_complete: Option<CompletionCallback>,
    /// Already absorbed, not yet returned to the caller.
    pending: VecDeque<PollProgress>,
}

impl<S: StatusSource> PollManager<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn with_interval(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            worker: None,
            stopping: None,
            snapshot: Vec::new(),
            notification_visible: false,
            on_complete: None,
            pending: VecDeque::new(),
        }
    }

    /// Called on the caller's thread once every watched entity is terminal,
    /// from whichever call first observes the completion.
    pub fn on_complete(&mut self, callback: impl FnMut(&[WatchedEntity]) + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn state(&mut self) -> PollerState {
        self.reap_finished();
        if self.worker.is_some() {
            return PollerState::Running;
        }
        let finished = match &self.stopping {
            Some(handle) => handle.is_finished(),
            None => return PollerState::Idle,
        };
        if !finished {
            return PollerState::Stopping;
        }
        self.stopping = None;
        PollerState::Idle
    }

    /// True while a worker is alive or its progress has not all been read.
    pub fn is_running(&mut self) -> bool {
        self.reap_finished();
        self.worker.is_some() || !self.pending.is_empty()
    }

    /// If the worker exited on its own, absorb everything it sent so the
    /// manager is Idle. The messages stay queued for `poll_progress()`.
    fn reap_finished(&mut self) {
        let finished = self
            .worker
            .as_ref()
            .is_some_and(|w| w.handle.is_finished());
        if finished {
            let messages = self.drain_channel();
            self.pending.extend(messages);
        }
    }

    /// Start watching the in-flight subset of `entities`.
    ///
    /// Returns `false` without starting a worker when nothing is in flight
    /// or a worker is already running.
    pub fn start(&mut self, entities: &[WatchedEntity]) -> bool {
        self.reap_finished();
        if self.worker.is_some() {
            tracing::debug!("Poller already running; start ignored");
            return false;
        }
        let watched = filter_in_flight(entities);
        if watched.is_empty() {
            tracing::debug!("Nothing in flight; poller not started");
            return false;
        }
        self.join_stopping();
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "Discarding unread progress of previous run");
            self.pending.clear();
        }

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let source = self.source.clone();
        let interval = self.interval;
        let worker_cancel = Arc::clone(&cancel);
        let worker_watched = watched.clone();
        let handle = std::thread::spawn(move || {
            run_poller(source, worker_watched, interval, tx, worker_cancel);
        });

        tracing::info!(count = watched.len(), interval_ms = interval.as_millis() as u64, "Polling started");
        self.snapshot = watched;
        self.notification_visible = true;
        self.worker = Some(Worker {
            handle,
            cancel,
            progress_rx: rx,
        });
        true
    }

    /// Stop polling and clear the watched set. Idempotent.
    ///
    /// Messages not yet drained are discarded. The worker exits within
    /// one cancel-check slice, or after its in-flight request returns.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::SeqCst);
            self.stopping = Some(worker.handle);
            tracing::info!("Polling stopped");
        }
        self.pending.clear();
        self.snapshot.clear();
        self.notification_visible = false;
    }

    /// Stop and wait for the worker thread to exit.
    pub fn shutdown(&mut self) {
        self.stop();
        self.join_stopping();
    }

    fn join_stopping(&mut self) {
        if let Some(handle) = self.stopping.take() {
            if handle.join().is_err() {
                tracing::warn!("Poll worker panicked");
            }
        }
    }

    /// Drain pending messages, update the snapshot, and return them.
    pub fn poll_progress(&mut self) -> Vec<PollProgress> {
        let mut messages: Vec<PollProgress> = self.pending.drain(..).collect();
        messages.extend(self.drain_channel());
        messages
    }

    fn drain_channel(&mut self) -> Vec<PollProgress> {
        let mut messages = Vec::new();
        let mut disconnected = false;
        if let Some(worker) = &self.worker {
            loop {
                match worker.progress_rx.try_recv() {
                    Ok(msg) => messages.push(msg),
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        self.absorb(&messages);
        if disconnected && self.worker.is_some() {
            tracing::warn!("Poll worker exited unexpectedly");
            self.stop();
        }
        messages
    }

    /// Block until the next message arrives or `timeout` passes.
    pub fn wait_progress(&mut self, timeout: Duration) -> Option<PollProgress> {
        if let Some(msg) = self.pending.pop_front() {
            return Some(msg);
        }
        let received = self.worker.as_ref()?.progress_rx.recv_timeout(timeout);
        match received {
            Ok(msg) => {
                self.absorb(std::slice::from_ref(&msg));
                Some(msg)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::warn!("Poll worker exited unexpectedly");
                self.stop();
                None
            }
        }
    }

    fn absorb(&mut self, messages: &[PollProgress]) {
        for msg in messages {
            match msg {
                PollProgress::Snapshot { entities, .. } => self.snapshot = entities.clone(),
                PollProgress::Completed { entities } => {
                    self.finish_completed();
                    if let Some(callback) = self.on_complete.as_mut() {
                        callback(entities);
                    }
                }
                PollProgress::Started { .. }
                | PollProgress::EntityError { .. }
                | PollProgress::Stopped => {}
            }
        }
    }

    /// The worker has already exited; move to Idle.
    fn finish_completed(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stopping = Some(worker.handle);
        }
        self.snapshot.clear();
        self.notification_visible = false;
        tracing::info!("Polling completed; all entities terminal");
    }

    /// Latest snapshot of watched entities.
    pub fn snapshot(&self) -> &[WatchedEntity] {
        &self.snapshot
    }

    /// Number of watched entities still in flight.
    pub fn in_flight(&self) -> usize {
        in_flight_count(&self.snapshot)
    }

    /// Whether the "N items still processing" notification should show.
    pub fn is_notification_visible(&self) -> bool {
        self.notification_visible && self.in_flight() > 0
    }

    /// Dismiss the notification. Polling continues.
    pub fn hide_notification(&mut self) {
        self.notification_visible = false;
    }
}

impl<S: StatusSource> Drop for PollManager<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Background poll loop
// =============================================================================

fn run_poller<S: StatusSource>(
    mut source: S,
    mut watched: Vec<WatchedEntity>,
    interval: Duration,
    tx: mpsc::Sender<PollProgress>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Manager dropped or stopped; exit silently.
                return;
            }
        };
    }

    macro_rules! check_cancel {
        () => {
            if cancel.load(Ordering::SeqCst) {
                tracing::debug!("Poll worker observed stop request");
                let _ = tx.send(PollProgress::Stopped);
                return;
            }
        };
    }

    send!(PollProgress::Started {
        count: watched.len()
    });

    let slice = Duration::from_millis(POLL_CANCEL_CHECK_INTERVAL_MS);
    let mut tick: u64 = 0;
    loop {
        check_cancel!();
        tick += 1;

        let fetches = source.refresh(&watched);
        check_cancel!();

        let outcome = merge_tick(&watched, fetches);
        for (id, message) in outcome.errors {
            tracing::warn!(id = %id, error = %message, "Status fetch failed; keeping last known status");
            send!(PollProgress::EntityError { id, message });
        }
        watched = outcome.snapshot;
        tracing::debug!(
            tick,
            changed = outcome.changed.len(),
            in_flight = in_flight_count(&watched),
            "Poll tick finished"
        );

        if outcome.all_terminal {
            send!(PollProgress::Completed { entities: watched });
            return;
        }
        send!(PollProgress::Snapshot {
            entities: watched.clone(),
            changed: outcome.changed,
        });

        let deadline = Instant::now() + interval;
        loop {
            check_cancel!();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Scripted source: each id walks through its list of statuses, one per
    /// tick, repeating the last one. Ids in `failing` always fail.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        script: Arc<Mutex<HashMap<String, Vec<ProjectStatus>>>>,
        failing: Arc<Mutex<Vec<String>>>,
        ticks: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn with(script: &[(&str, Vec<ProjectStatus>)]) -> Self {
            let source = Self::default();
            {
                let mut map = source.script.lock().unwrap();
                for (id, statuses) in script {
                    map.insert(id.to_string(), statuses.clone());
                }
            }
            source
        }

        fn ticks(&self) -> usize {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for ScriptedSource {
        fn refresh(&mut self, watched: &[WatchedEntity]) -> Vec<EntityFetch> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            let failing = self.failing.lock().unwrap().clone();
            let mut script = self.script.lock().unwrap();
            watched
                .iter()
                .filter(|e| e.is_in_flight())
                .map(|e| {
                    if failing.contains(&e.id) {
                        return EntityFetch::Failed {
                            id: e.id.clone(),
                            message: "HTTP 500".to_string(),
                        };
                    }
                    let statuses = script.get_mut(&e.id).expect("scripted id");
                    let status = if statuses.len() > 1 {
                        statuses.remove(0)
                    } else {
                        statuses[0].clone()
                    };
                    EntityFetch::Updated(WatchedEntity {
                        status,
                        ..e.clone()
                    })
                })
                .collect()
        }
    }

    fn entity(id: &str, status: ProjectStatus) -> WatchedEntity {
        WatchedEntity {
            id: id.to_string(),
            name: format!("project-{id}"),
            status,
        }
    }

    fn fast(source: ScriptedSource) -> PollManager<ScriptedSource> {
        PollManager::with_interval(source, Duration::from_millis(20))
    }

    fn drain_until_idle(manager: &mut PollManager<ScriptedSource>) -> Vec<PollProgress> {
        let mut all = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.is_running() && Instant::now() < deadline {
            if let Some(msg) = manager.wait_progress(Duration::from_millis(100)) {
                all.push(msg);
            }
        }
        all
    }

    #[test]
    fn test_start_with_nothing_in_flight_creates_no_worker() {
        let source = ScriptedSource::default();
        let mut manager = fast(source.clone());
        assert!(!manager.start(&[]));
        assert!(!manager.start(&[
            entity("a", ProjectStatus::Ready),
            entity("b", ProjectStatus::Failed),
        ]));
        assert_eq!(manager.state(), PollerState::Idle);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(source.ticks(), 0);
    }

    #[test]
    fn test_stops_after_last_entity_terminal() {
        let source = ScriptedSource::with(&[
            ("a", vec![ProjectStatus::InProgress, ProjectStatus::Ready]),
            ("b", vec![ProjectStatus::Failed]),
        ]);
        let mut manager = fast(source.clone());
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);
        manager.on_complete(move |entities| {
            sink.lock().unwrap().extend(entities.iter().map(|e| e.id.clone()));
        });

        assert!(manager.start(&[
            entity("a", ProjectStatus::Initiated),
            entity("b", ProjectStatus::InProgress),
        ]));
        let messages = drain_until_idle(&mut manager);

        assert!(matches!(messages.last(), Some(PollProgress::Completed { .. })));
        assert_eq!(*completed.lock().unwrap(), vec!["a", "b"]);
        manager.shutdown();
        assert_eq!(manager.state(), PollerState::Idle);

        let ticks = source.ticks();
        assert_eq!(ticks, 2);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(source.ticks(), ticks);
    }

    #[test]
    fn test_second_start_is_noop() {
        let source = ScriptedSource::with(&[("a", vec![ProjectStatus::InProgress])]);
        let mut manager = fast(source);
        assert!(manager.start(&[entity("a", ProjectStatus::InProgress)]));
        assert!(!manager.start(&[entity("a", ProjectStatus::InProgress)]));
        assert_eq!(manager.state(), PollerState::Running);
        manager.shutdown();
    }

    #[test]
    fn test_failed_entity_keeps_status_and_polling_continues() {
        let source = ScriptedSource::with(&[
            ("a", vec![ProjectStatus::Ready]),
            ("b", vec![ProjectStatus::InProgress, ProjectStatus::Ready]),
        ]);
        source.failing.lock().unwrap().push("a".to_string());
        let mut manager = fast(source.clone());
        manager.start(&[
            entity("a", ProjectStatus::Initiated),
            entity("b", ProjectStatus::Initiated),
        ]);

        let deadline = Instant::now() + Duration::from_secs(5);
        while source.ticks() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        let messages = manager.poll_progress();
        assert!(messages
            .iter()
            .any(|m| matches!(m, PollProgress::EntityError { id, .. } if id == "a")));
        assert!(manager.is_running());
        let a = manager.snapshot().iter().find(|e| e.id == "a").unwrap();
        assert_eq!(a.status, ProjectStatus::Initiated);

        // Recovery on a later tick finishes the job.
        source.failing.lock().unwrap().clear();
        drain_until_idle(&mut manager);
        assert!(!manager.is_running());
        manager.shutdown();
    }

    #[test]
    fn test_hiding_notification_keeps_polling() {
        let source = ScriptedSource::with(&[("a", vec![ProjectStatus::InProgress])]);
        let mut manager = fast(source.clone());
        manager.start(&[entity("a", ProjectStatus::InProgress)]);
        assert!(manager.is_notification_visible());

        manager.hide_notification();
        assert!(!manager.is_notification_visible());
        let before = source.ticks();
        std::thread::sleep(Duration::from_millis(120));
        assert!(source.ticks() > before);
        assert_eq!(manager.state(), PollerState::Running);
        manager.shutdown();
    }

    #[test]
    fn test_stop_is_idempotent_and_discards_results() {
        let source = ScriptedSource::with(&[("a", vec![ProjectStatus::InProgress])]);
        let mut manager = fast(source.clone());
        manager.stop();
        manager.start(&[entity("a", ProjectStatus::InProgress)]);
        manager.stop();
        manager.stop();
        assert!(manager.snapshot().is_empty());
        assert!(manager.poll_progress().is_empty());
        manager.shutdown();
        assert_eq!(manager.state(), PollerState::Idle);

        let ticks = source.ticks();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(source.ticks(), ticks);
    }

    #[test]
    fn test_finished_worker_does_not_block_next_start() {
        let source = ScriptedSource::with(&[
            ("a", vec![ProjectStatus::Ready]),
            ("b", vec![ProjectStatus::InProgress]),
        ]);
        let mut manager = fast(source);
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        manager.on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(manager.start(&[entity("a", ProjectStatus::InProgress)]));
        std::thread::sleep(Duration::from_millis(200));

        // Nothing drained the channel, yet the exited worker is not Running.
        assert_eq!(manager.state(), PollerState::Idle);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(manager.start(&[entity("b", ProjectStatus::InProgress)]));
        assert_eq!(manager.state(), PollerState::Running);
        assert_eq!(manager.snapshot()[0].id, "b");
        manager.shutdown();
    }

    #[test]
    fn test_reaped_progress_still_delivered() {
        let source = ScriptedSource::with(&[("a", vec![ProjectStatus::Ready])]);
        let mut manager = fast(source);
        manager.start(&[entity("a", ProjectStatus::InProgress)]);
        std::thread::sleep(Duration::from_millis(200));

        assert!(manager.is_running(), "unread progress keeps the run visible");
        assert_eq!(manager.state(), PollerState::Idle);
        let messages = manager.poll_progress();
        assert!(matches!(messages.first(), Some(PollProgress::Started { count: 1 })));
        assert!(matches!(messages.last(), Some(PollProgress::Completed { .. })));
        assert!(!manager.is_running());
        manager.shutdown();
    }

    #[test]
    fn test_restart_after_stop_watches_new_set() {
        let source = ScriptedSource::with(&[
            ("a", vec![ProjectStatus::InProgress]),
            ("b", vec![ProjectStatus::Ready]),
        ]);
        let mut manager = fast(source);
        manager.start(&[entity("a", ProjectStatus::InProgress)]);
        manager.stop();
        assert!(manager.start(&[entity("b", ProjectStatus::InProgress)]));
        let messages = drain_until_idle(&mut manager);
        let Some(PollProgress::Completed { entities }) = messages.last() else {
            panic!("expected completion");
        };
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "b");
        manager.shutdown();
    }
}
