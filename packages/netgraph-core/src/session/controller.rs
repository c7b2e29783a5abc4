//! Scan lifecycle controller.
//!
//! [`ScanController`] drives one scan from request to terminal phase:
//! validate the target, ask the backend to start, then consume a
//! [`StatusPoller`] from a background task. It is single-flight: a second
//! `start` while one scan is validating, requesting, or polling is
//! rejected outright, never queued.
//!
//! Every snapshot application is guarded by a session epoch so a late
//! response from a superseded or cancelled session can never touch newer
//! state.

use super::poller::{PollError, PollOptions, StatusPoller};
use super::{Phase, ScanSession};
use crate::backend::{ScanBackend, ScanRequest, ScanStatus, ScanStatusSnapshot};
use crate::error::{Error, Result};
use crate::validate;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub struct ScanController {
    backend: Arc<dyn ScanBackend>,
    options: PollOptions,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    phase: Phase,
    session: Option<ScanSession>,
    cancel: Option<CancellationToken>,
    /// Bumped on every accepted start; snapshots carry the epoch they
    /// belong to and are dropped on mismatch.
    epoch: u64,
}

/// What applying one snapshot did to the session.
#[derive(Debug, PartialEq, Eq)]
enum SnapshotOutcome {
    /// Non-terminal snapshot applied; keep polling
    Progressed,
    /// Snapshot belonged to a superseded or non-polling session; dropped
    Stale,
    /// Backend says completed; fetch full devices before finalizing
    CompletedPending,
    /// Backend says failed; session finalized
    TerminalFailed,
    /// Backend says cancelled; session finalized
    TerminalCancelled,
}

impl ScanController {
    pub fn new(backend: Arc<dyn ScanBackend>, options: PollOptions) -> Self {
        Self {
            backend,
            options,
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Idle,
                session: None,
                cancel: None,
                epoch: 0,
            })),
        }
    }

    pub fn with_defaults(backend: Arc<dyn ScanBackend>) -> Self {
        Self::new(backend, PollOptions::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover from poisoning; state transitions never panic mid-write
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Snapshot of the current session, if one exists.
    pub fn session(&self) -> Option<ScanSession> {
        self.lock().session.clone()
    }

    /// Start a new scan.
    ///
    /// Rejected with [`Error::ScanInFlight`] while another scan is
    /// validating, requesting, or polling. Validation and request failures
    /// return the controller to `Idle` with no session left behind. On
    /// success the returned session reflects the backend's accepted state
    /// and polling continues in the background.
    pub async fn start(&self, request: ScanRequest) -> Result<ScanSession> {
        {
            let mut inner = self.lock();
            if inner.phase.is_busy() {
                tracing::warn!("Rejecting scan start: another scan is in flight");
                return Err(Error::ScanInFlight);
            }
            // Starting from a terminal phase implicitly resets
            inner.session = None;
            inner.cancel = None;
            inner.phase = Phase::Validating;
        }

        if !request.user_consent {
            self.lock().phase = Phase::Idle;
            return Err(Error::Validation(
                "user consent is required before scanning".to_string(),
            ));
        }

        if let Err(e) = validate::validate_target(&request.target) {
            self.lock().phase = Phase::Idle;
            return Err(e);
        }

        self.lock().phase = Phase::Requesting;

        let resp = match self.backend.start_scan(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                // No session persists after a failed start
                let mut inner = self.lock();
                inner.phase = Phase::Idle;
                inner.session = None;
                return Err(e);
            }
        };

        let session = ScanSession::from_start_response(&resp, request.scan_type);
        let cancel = CancellationToken::new();

        let epoch = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.session = Some(session.clone());
            inner.cancel = Some(cancel.clone());
            inner.phase = Phase::Polling;
            inner.epoch
        };

        tracing::info!(
            "Scan {} accepted for {}, polling every {:?}",
            session.session_id,
            session.target,
            self.options.interval
        );

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.inner);
        let options = self.options.clone();
        let scan_id = session.session_id.clone();
        tokio::spawn(async move {
            run_poll_loop(backend, shared, scan_id, epoch, options, cancel).await;
        });

        Ok(session)
    }

    /// Cancel the scan currently polling.
    ///
    /// Transitions to `Cancelled` synchronously, invalidates the polling
    /// token, and fires a best-effort backend cancel whose failure is only
    /// logged. A no-op in any other phase.
    pub fn cancel(&self) {
        let (token, scan_id) = {
            let mut inner = self.lock();
            if inner.phase != Phase::Polling {
                return;
            }
            inner.phase = Phase::Cancelled;
            let token = inner.cancel.take();
            let scan_id = inner.session.as_mut().map(|s| {
                s.status = ScanStatus::Cancelled;
                s.completed_at = Some(Utc::now());
                s.session_id.clone()
            });
            (token, scan_id)
        };

        if let Some(token) = token {
            token.cancel();
        }

        if let Some(id) = scan_id {
            tracing::info!("Scan {} cancelled", id);
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move {
                if let Err(e) = backend.cancel_scan(&id).await {
                    tracing::warn!("Best-effort backend cancel for scan {} failed: {}", id, e);
                }
            });
        }
    }

    /// Clear the session and return to `Idle`.
    ///
    /// Valid from `Idle` (no-op) or any terminal phase; rejected while a
    /// scan is in flight.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.phase.is_busy() {
            return Err(Error::InvalidState("reset"));
        }
        inner.session = None;
        inner.cancel = None;
        inner.phase = Phase::Idle;
        Ok(())
    }
}

/// Drive one poller to completion, applying snapshots to the shared state.
async fn run_poll_loop(
    backend: Arc<dyn ScanBackend>,
    shared: Arc<Mutex<Inner>>,
    scan_id: String,
    epoch: u64,
    options: PollOptions,
    cancel: CancellationToken,
) {
    let mut poller = StatusPoller::new(Arc::clone(&backend), &scan_id, options, cancel.clone());

    while let Some(item) = poller.next().await {
        match item {
            Ok(snapshot) => match apply_snapshot(&shared, epoch, &snapshot) {
                SnapshotOutcome::Progressed => {}
                SnapshotOutcome::Stale => return,
                SnapshotOutcome::TerminalFailed | SnapshotOutcome::TerminalCancelled => return,
                SnapshotOutcome::CompletedPending => {
                    // One extra fetch for the full device list, still
                    // abandonable by the same token
                    let result = tokio::select! {
                        _ = cancel.cancelled() => return,
                        r = backend.scan_result(&scan_id) => r,
                    };
                    finalize_completed(&shared, epoch, result);
                    return;
                }
            },
            Err(PollError::Fetch(e)) => {
                // Mid-poll backend errors are fatal for this session; retry
                // is a fresh start() by the caller
                mark_failed(&shared, epoch, e.user_message());
                return;
            }
            Err(PollError::Exhausted { attempts }) => {
                mark_failed(
                    &shared,
                    epoch,
                    Error::PollingExhausted { attempts }.user_message(),
                );
                return;
            }
        }
    }
    // Sequence ended via cancellation; cancel() already finalized the state
}

/// Apply one status snapshot, dropping it if the session was superseded.
fn apply_snapshot(
    shared: &Arc<Mutex<Inner>>,
    epoch: u64,
    snapshot: &ScanStatusSnapshot,
) -> SnapshotOutcome {
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());

    if inner.epoch != epoch || inner.phase != Phase::Polling {
        tracing::debug!(
            "Dropping stale snapshot for scan {} (epoch {})",
            snapshot.scan_id,
            epoch
        );
        return SnapshotOutcome::Stale;
    }

    let Some(session) = inner.session.as_mut() else {
        return SnapshotOutcome::Stale;
    };
    if session.session_id != snapshot.scan_id {
        return SnapshotOutcome::Stale;
    }

    // Progress is monotonic non-decreasing while non-terminal; the backend
    // may repeat a value but never walks the bar backwards on screen
    session.progress = session.progress.max(snapshot.progress);
    session.device_count = snapshot.device_count.max(session.device_count);
    session.status = snapshot.status;

    match snapshot.status {
        ScanStatus::Completed => {
            session.progress = 100.0;
            SnapshotOutcome::CompletedPending
        }
        ScanStatus::Failed => {
            session.error_message = snapshot
                .error_message
                .clone()
                .or_else(|| Some("scan failed".to_string()));
            session.completed_at = Some(Utc::now());
            inner.phase = Phase::Failed;
            SnapshotOutcome::TerminalFailed
        }
        ScanStatus::Cancelled => {
            session.completed_at = Some(Utc::now());
            inner.phase = Phase::Cancelled;
            SnapshotOutcome::TerminalCancelled
        }
        ScanStatus::Pending | ScanStatus::Running => SnapshotOutcome::Progressed,
    }
}

/// Record the full result fetched after a completed status, or fail the
/// session if that fetch broke.
fn finalize_completed(
    shared: &Arc<Mutex<Inner>>,
    epoch: u64,
    result: Result<crate::backend::ScanResponse>,
) {
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());

    if inner.epoch != epoch || inner.phase != Phase::Polling {
        return;
    }
    let Some(session) = inner.session.as_mut() else {
        return;
    };

    match result {
        Ok(resp) => {
            session.devices = resp.devices;
            session.device_count = session.devices.len() as u32;
            session.completed_at = resp.completed_at.or_else(|| Some(Utc::now()));
            session.status = ScanStatus::Completed;
            session.progress = 100.0;
            tracing::info!(
                "Scan {} completed with {} devices",
                session.session_id,
                session.device_count
            );
            inner.phase = Phase::Completed;
        }
        Err(e) => {
            session.status = ScanStatus::Failed;
            session.error_message = Some(format!(
                "scan completed but fetching devices failed: {}",
                e
            ));
            session.completed_at = Some(Utc::now());
            inner.phase = Phase::Failed;
        }
    }
}

/// Fail the session with a recorded message instead of throwing past the
/// controller boundary.
fn mark_failed(shared: &Arc<Mutex<Inner>>, epoch: u64, message: String) {
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());

    if inner.epoch != epoch || inner.phase != Phase::Polling {
        return;
    }
    if let Some(session) = inner.session.as_mut() {
        session.status = ScanStatus::Failed;
        session.error_message = Some(message);
        session.completed_at = Some(Utc::now());
    }
    inner.phase = Phase::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CancelAck, Device, ScanResponse, ScanType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fake backend with a scripted status sequence and call counters.
    struct FakeBackend {
        statuses: Vec<ScanStatusSnapshot>,
        status_calls: AtomicU32,
        cancel_calls: AtomicU32,
        devices: Vec<Device>,
        fail_start: bool,
    }

    impl FakeBackend {
        fn new(statuses: Vec<ScanStatusSnapshot>) -> Self {
            Self {
                statuses,
                status_calls: AtomicU32::new(0),
                cancel_calls: AtomicU32::new(0),
                devices: Vec::new(),
                fail_start: false,
            }
        }

        fn with_devices(mut self, devices: Vec<Device>) -> Self {
            self.devices = devices;
            self
        }
    }

    fn device(ip: &str) -> Device {
        serde_json::from_value(serde_json::json!({ "ip": ip })).unwrap()
    }

    fn running(progress: f64) -> ScanStatusSnapshot {
        ScanStatusSnapshot {
            scan_id: "scan-1".to_string(),
            status: ScanStatus::Running,
            progress,
            device_count: 0,
            error_message: None,
        }
    }

    fn completed() -> ScanStatusSnapshot {
        ScanStatusSnapshot {
            scan_id: "scan-1".to_string(),
            status: ScanStatus::Completed,
            progress: 100.0,
            device_count: 0,
            error_message: None,
        }
    }

    #[async_trait]
    impl ScanBackend for FakeBackend {
        async fn start_scan(&self, request: &ScanRequest) -> crate::error::Result<ScanResponse> {
            if self.fail_start {
                return Err(Error::Backend("scanner unavailable".to_string()));
            }
            Ok(ScanResponse {
                scan_id: "scan-1".to_string(),
                target_range: request.target.clone(),
                scan_type: request.scan_type.to_string(),
                status: ScanStatus::Pending,
                devices: Vec::new(),
                started_at: Some(Utc::now()),
                completed_at: None,
                error_message: None,
                progress: 0.0,
                scanned_hosts: 0,
                total_hosts: 0,
                device_count: 0,
            })
        }

        async fn scan_status(&self, _scan_id: &str) -> crate::error::Result<ScanStatusSnapshot> {
            let i = self.status_calls.fetch_add(1, Ordering::SeqCst) as usize;
            let i = i.min(self.statuses.len().saturating_sub(1));
            Ok(self.statuses[i].clone())
        }

        async fn scan_result(&self, scan_id: &str) -> crate::error::Result<ScanResponse> {
            Ok(ScanResponse {
                scan_id: scan_id.to_string(),
                target_range: "192.168.1.0/24".to_string(),
                scan_type: "quick".to_string(),
                status: ScanStatus::Completed,
                devices: self.devices.clone(),
                started_at: None,
                completed_at: Some(Utc::now()),
                error_message: None,
                progress: 100.0,
                scanned_hosts: 0,
                total_hosts: 0,
                device_count: self.devices.len() as u32,
            })
        }

        async fn cancel_scan(&self, scan_id: &str) -> crate::error::Result<CancelAck> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            Ok(CancelAck {
                scan_id: Some(scan_id.to_string()),
                message: None,
            })
        }
    }

    fn fast_options() -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(5),
            max_attempts: 50,
        }
    }

    fn request() -> ScanRequest {
        ScanRequest::new("192.168.1.0/24", ScanType::Quick)
    }

    async fn wait_terminal(controller: &ScanController) {
        for _ in 0..200 {
            if controller.phase().is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("controller never reached a terminal phase");
    }

    #[tokio::test]
    async fn test_scan_runs_to_completion_with_device_fetch() {
        let backend = Arc::new(
            FakeBackend::new(vec![running(30.0), running(70.0), completed()])
                .with_devices(vec![device("192.168.1.1"), device("192.168.1.20")]),
        );
        let controller = ScanController::new(backend.clone(), fast_options());

        let session = controller.start(request()).await.unwrap();
        assert_eq!(session.session_id, "scan-1");
        assert_eq!(controller.phase(), Phase::Polling);

        wait_terminal(&controller).await;
        assert_eq!(controller.phase(), Phase::Completed);

        let session = controller.session().unwrap();
        assert_eq!(session.status, ScanStatus::Completed);
        assert_eq!(session.progress, 100.0);
        assert_eq!(session.devices.len(), 2);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_no_session() {
        let backend = Arc::new(FakeBackend::new(vec![completed()]));
        let controller = ScanController::new(backend, fast_options());

        let err = controller
            .start(ScanRequest::new("8.8.8.8", ScanType::Quick))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn test_consent_required_before_any_network_call() {
        let backend = Arc::new(FakeBackend::new(vec![completed()]));
        let controller = ScanController::new(backend, fast_options());

        let mut req = request();
        req.user_consent = false;
        let err = controller.start(req).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_backend_start_failure_returns_to_idle() {
        let mut fake = FakeBackend::new(vec![completed()]);
        fake.fail_start = true;
        let controller = ScanController::new(Arc::new(fake), fast_options());

        let err = controller.start(request()).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn test_single_flight_rejects_second_start() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(
            backend,
            PollOptions {
                interval: Duration::from_millis(5),
                max_attempts: 1000,
            },
        );

        controller.start(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let before = controller.session().unwrap();

        let err = controller.start(request()).await.unwrap_err();
        assert!(matches!(err, Error::ScanInFlight));

        // Existing session completely unchanged by the rejected start
        let after = controller.session().unwrap();
        assert_eq!(after.session_id, before.session_id);
        assert_eq!(after.status, before.status);
        assert_eq!(controller.phase(), Phase::Polling);

        controller.cancel();
    }

    #[tokio::test]
    async fn test_cancel_before_first_tick_applies_no_snapshots() {
        let backend = Arc::new(FakeBackend::new(vec![running(50.0)]));
        let controller = ScanController::new(
            backend.clone(),
            PollOptions {
                interval: Duration::from_millis(100),
                max_attempts: 100,
            },
        );

        controller.start(request()).await.unwrap();
        controller.cancel();

        assert_eq!(controller.phase(), Phase::Cancelled);
        let session = controller.session().unwrap();
        assert_eq!(session.status, ScanStatus::Cancelled);
        assert_eq!(session.progress, 0.0);

        // Give the poll task time to observe cancellation; no fetch happens
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(backend.clone(), fast_options());

        controller.start(request()).await.unwrap();
        controller.cancel();
        controller.cancel();
        controller.cancel();

        assert_eq!(controller.phase(), Phase::Cancelled);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_records_error_message() {
        let backend = Arc::new(FakeBackend::new(vec![
            running(20.0),
            ScanStatusSnapshot {
                scan_id: "scan-1".to_string(),
                status: ScanStatus::Failed,
                progress: 20.0,
                device_count: 0,
                error_message: Some("nmap exited with code 1".to_string()),
            },
        ]));
        let controller = ScanController::new(backend, fast_options());

        controller.start(request()).await.unwrap();
        wait_terminal(&controller).await;

        assert_eq!(controller.phase(), Phase::Failed);
        let session = controller.session().unwrap();
        assert_eq!(session.status, ScanStatus::Failed);
        assert_eq!(
            session.error_message.as_deref(),
            Some("nmap exited with code 1")
        );
    }

    #[tokio::test]
    async fn test_exhaustion_fails_the_session() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(
            backend.clone(),
            PollOptions {
                interval: Duration::from_millis(2),
                max_attempts: 3,
            },
        );

        controller.start(request()).await.unwrap();
        wait_terminal(&controller).await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 3);
        let session = controller.session().unwrap();
        assert!(session.error_message.is_some());
    }

    #[tokio::test]
    async fn test_reset_only_from_terminal() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(backend, fast_options());

        assert!(controller.reset().is_ok()); // Idle no-op

        controller.start(request()).await.unwrap();
        assert!(matches!(
            controller.reset(),
            Err(Error::InvalidState("reset"))
        ));

        controller.cancel();
        assert!(controller.reset().is_ok());
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_dropped_after_cancel_and_reset() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(backend, fast_options());

        controller.start(request()).await.unwrap();
        let epoch = controller.lock().epoch;
        controller.cancel();
        controller.reset().unwrap();

        // A late snapshot for the old session arrives after reset
        let outcome = apply_snapshot(&controller.inner, epoch, &running(95.0));
        assert_eq!(outcome, SnapshotOutcome::Stale);
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn test_stale_epoch_dropped_even_while_new_scan_polls() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(backend, fast_options());

        controller.start(request()).await.unwrap();
        let old_epoch = controller.lock().epoch;
        controller.cancel();
        controller.start(request()).await.unwrap();

        let before = controller.session().unwrap();
        let outcome = apply_snapshot(&controller.inner, old_epoch, &running(95.0));
        assert_eq!(outcome, SnapshotOutcome::Stale);
        let after = controller.session().unwrap();
        assert_eq!(after.progress, before.progress);

        controller.cancel();
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_across_snapshots() {
        let backend = Arc::new(FakeBackend::new(vec![running(10.0)]));
        let controller = ScanController::new(backend, fast_options());

        controller.start(request()).await.unwrap();
        let epoch = controller.lock().epoch;

        apply_snapshot(&controller.inner, epoch, &running(60.0));
        // Backend repeats a lower value; the session never walks backwards
        apply_snapshot(&controller.inner, epoch, &running(40.0));
        assert_eq!(controller.session().unwrap().progress, 60.0);

        controller.cancel();
    }
}
