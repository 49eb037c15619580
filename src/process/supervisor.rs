//! # ProcessSupervisor: lifecycle, output capture and termination of agent processes.
//!
//! The [`ProcessSupervisor`] owns a registry of tracked processes keyed by
//! agent id. For every registered [`ProcessHandle`] it attaches stream and
//! exit observers, keeps two bounded [`OutputBuffer`]s, scans output for
//! [`StatusMarker`]s and publishes [`ProcessEvent`]s on its [`Notifier`].
//!
//! ## Architecture
//! ```text
//! register_process(agent, handle)
//!     ├─► Tracked { record: Spawning ─► Running, stdout/stderr buffers, control }
//!     ├─► stdout reader ──┐
//!     ├─► stderr reader ──┴─► capture_output() ─► buffer + marker scan ─► Output / StatusMarker
//!     └─► exit observer ───► handle_exit()     ─► Exited | Failed ─► Exited event
//!                                                    └─► purge after cfg.purge_grace ─► Purged
//!
//! terminate_process(agent, timeout)
//!     ├─► already exited ───────────────► Ok (no signal)
//!     ├─► signal(Graceful), arm kill timer (CancellationToken stored in Tracked)
//!     │       ├─ exit observed first ─► timer cancelled under the registry lock
//!     │       └─ timer fires first   ─► signal(Force) ─► ForceKilled
//!     └─► await observed exit (watch channel)
//! ```
//!
//! ## Rules
//! - Status transitions are monotonic; `Exited`/`Failed` are terminal.
//! - Only the supervisor's own observers mutate a record.
//! - The force-kill decision and exit recording happen under the same lock,
//!   so an exited process never receives a spurious kill.
//! - Every value returned is a copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::process::handle::{HandleParts, Lifecycle, OutputReader};
use crate::process::{
    Notifier, OutputBuffer, OutputSnapshot, ProcessControl, ProcessEvent, ProcessEventKind,
    ProcessHandle, ProcessRecord, ProcessStatus, StatusMarker, StopLevel, StreamKind,
};

/// Supervisor-side state of one process.
struct Tracked {
    /// Distinguishes successive registrations of the same agent id.
    generation: u64,
    record: ProcessRecord,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    control: Arc<dyn ProcessControl>,
    /// Flips to `true` once exit (or a spawn error) is observed.
    exit_tx: watch::Sender<bool>,
    /// Pending force-kill timer of an in-flight termination.
    kill_timer: Option<CancellationToken>,
    /// Stops the stream/exit observers when the entry is purged.
    observers: CancellationToken,
}

impl Tracked {
    fn buffer_mut(&mut self, stream: StreamKind) -> &mut OutputBuffer {
        match stream {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        }
    }

    /// Marks the exit as observed: disarms the kill timer and releases waiters.
    fn settle(&mut self) {
        if let Some(timer) = self.kill_timer.take() {
            timer.cancel();
        }
        self.exit_tx.send_replace(true);
    }
}

/// Registry and lifecycle manager of agent subprocesses.
pub struct ProcessSupervisor {
    cfg: SupervisorConfig,
    notifier: Notifier,
    processes: RwLock<HashMap<String, Tracked>>,
    generation: AtomicU64,
}

impl ProcessSupervisor {
    /// Creates a new supervisor.
    pub fn new(cfg: SupervisorConfig) -> Arc<Self> {
        let notifier = Notifier::new(cfg.event_capacity_clamped());
        Arc::new(Self {
            cfg,
            notifier,
            processes: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        })
    }

    /// Supervisor configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Receiver for notifications published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.notifier.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Tracked>> {
        self.processes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Tracked>> {
        self.processes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `handle` under `agent_id` and attaches its observers.
    ///
    /// Fails with [`SupervisorError::AlreadyRegistered`] if the id is still
    /// tracked, or [`SupervisorError::MissingPid`] if the handle has no pid.
    /// Must be called inside a tokio runtime.
    pub fn register_process(
        self: &Arc<Self>,
        agent_id: &str,
        handle: ProcessHandle,
    ) -> Result<ProcessRecord, SupervisorError> {
        let pid = handle.pid();
        let mut map = self.write();
        if map.contains_key(agent_id) {
            return Err(SupervisorError::AlreadyRegistered {
                agent_id: agent_id.to_string(),
            });
        }
        let Some(pid) = pid else {
            return Err(SupervisorError::MissingPid {
                agent_id: agent_id.to_string(),
            });
        };

        let parts = handle.into_parts();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let capacity = self.cfg.buffer_capacity_clamped();
        let observers = CancellationToken::new();

        let mut record = ProcessRecord::new(agent_id, pid);
        record.status = ProcessStatus::Running;
        let snapshot = record.clone();

        let (exit_tx, _) = watch::channel(false);
        map.insert(
            agent_id.to_string(),
            Tracked {
                generation,
                record,
                stdout: OutputBuffer::new(capacity),
                stderr: OutputBuffer::new(capacity),
                control: parts.control.clone(),
                exit_tx,
                kill_timer: None,
                observers: observers.clone(),
            },
        );
        drop(map);

        info!(agent_id, pid, "process registered");
        self.notifier
            .publish(ProcessEvent::new(ProcessEventKind::Spawned, agent_id).with_pid(pid));
        self.attach_observers(agent_id, generation, parts, observers);
        Ok(snapshot)
    }

    fn attach_observers(
        self: &Arc<Self>,
        agent_id: &str,
        generation: u64,
        parts: HandleParts,
        stop: CancellationToken,
    ) {
        let HandleParts {
            stdout,
            stderr,
            lifecycle,
            ..
        } = parts;

        for (stream, reader) in [(StreamKind::Stdout, stdout), (StreamKind::Stderr, stderr)] {
            if let Some(reader) = reader {
                let me = Arc::clone(self);
                let id = agent_id.to_string();
                let stop = stop.clone();
                tokio::spawn(async move { me.read_stream(id, stream, reader, stop).await });
            }
        }

        let me = Arc::clone(self);
        let id = agent_id.to_string();
        tokio::spawn(async move {
            let mut lifecycle = lifecycle;
            loop {
                let next = tokio::select! {
                    _ = stop.cancelled() => None,
                    ev = lifecycle.recv() => ev,
                };
                match next {
                    Some(Lifecycle::Exited { code, signal }) => {
                        me.handle_exit(&id, generation, code, signal)
                    }
                    Some(Lifecycle::Error(message)) => me.handle_error(&id, generation, message),
                    None => break,
                }
            }
        });
    }

    async fn read_stream(
        self: Arc<Self>,
        agent_id: String,
        stream: StreamKind,
        reader: OutputReader,
        stop: CancellationToken,
    ) {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            let read = tokio::select! {
                _ = stop.cancelled() => break,
                r = reader.read_until(b'\n', &mut buf) => r,
            };
            match read {
                Ok(0) => break,
                Ok(_) => {
                    let chunk = String::from_utf8_lossy(&buf);
                    self.capture_output(&agent_id, stream, &chunk);
                }
                Err(e) => {
                    debug!(agent_id = %agent_id, stream = stream.as_str(), error = %e, "output stream closed");
                    break;
                }
            }
        }
    }

    /// Buffers the non-blank lines of `chunk` and scans them for status markers.
    ///
    /// No-op for unknown agents. Called by the stream observers; also usable
    /// to feed output synthetically.
    pub fn capture_output(&self, agent_id: &str, stream: StreamKind, chunk: &str) {
        let accepted: Vec<String> = {
            let mut map = self.write();
            let Some(tracked) = map.get_mut(agent_id) else {
                return;
            };
            let buffer = tracked.buffer_mut(stream);
            chunk
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    buffer.push(line.to_string());
                    line.to_string()
                })
                .collect()
        };

        for line in accepted {
            trace!(agent_id, stream = stream.as_str(), %line, "output");
            let line: Arc<str> = Arc::from(line);
            self.notifier.publish(
                ProcessEvent::new(ProcessEventKind::Output, agent_id)
                    .with_stream(stream)
                    .with_line(line.clone()),
            );
            for marker in StatusMarker::scan(&line) {
                debug!(agent_id, marker = marker.as_str(), "status marker");
                self.notifier.publish(
                    ProcessEvent::new(ProcessEventKind::StatusMarker, agent_id)
                        .with_stream(stream)
                        .with_marker(marker)
                        .with_line(line.clone()),
                );
            }
        }
    }

    /// Copies of both output buffers, or `None` for unknown agents.
    pub fn get_output(&self, agent_id: &str) -> Option<OutputSnapshot> {
        self.read().get(agent_id).map(|t| OutputSnapshot {
            stdout: t.stdout.lines(),
            stderr: t.stderr.lines(),
        })
    }

    /// Stops the process: graceful signal, then force after `timeout`.
    ///
    /// Resolves once exit is actually observed. Already-exited processes
    /// resolve immediately without any signal.
    pub async fn terminate_process(
        self: &Arc<Self>,
        agent_id: &str,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        let (mut exit_rx, control, timer) = {
            let mut map = self.write();
            let tracked = map
                .get_mut(agent_id)
                .ok_or_else(|| SupervisorError::NotFound {
                    agent_id: agent_id.to_string(),
                })?;
            if tracked.record.status.is_terminal() || tracked.control.has_exited() {
                debug!(agent_id, "terminate: process already exited");
                return Ok(());
            }
            let exit_rx = tracked.exit_tx.subscribe();
            let timer = match tracked.kill_timer {
                Some(_) => None,
                None => {
                    let token = CancellationToken::new();
                    tracked.kill_timer = Some(token.clone());
                    Some(token)
                }
            };
            (exit_rx, tracked.control.clone(), timer)
        };

        if let Some(timer) = timer {
            info!(agent_id, ?timeout, "requesting graceful stop");
            self.notifier.publish(
                ProcessEvent::new(ProcessEventKind::TerminationRequested, agent_id)
                    .with_timeout(timeout),
            );
            if !control.signal(StopLevel::Graceful) {
                self.report_undelivered(agent_id, StopLevel::Graceful);
            }

            let me = Arc::clone(self);
            let id = agent_id.to_string();
            tokio::spawn(async move {
                tokio::select! {
                    _ = timer.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => me.escalate(&id, &timer),
                }
            });
        } else {
            debug!(agent_id, "terminate: stop already in progress");
        }

        // A closed channel means the entry was purged, which implies exit.
        let _ = exit_rx.wait_for(|exited| *exited).await;
        Ok(())
    }

    /// [`terminate_process`](Self::terminate_process) with `cfg.terminate_timeout`.
    pub async fn terminate(self: &Arc<Self>, agent_id: &str) -> Result<(), SupervisorError> {
        self.terminate_process(agent_id, self.cfg.terminate_timeout)
            .await
    }

    /// Sends the forceful stop unless exit was observed in the meantime.
    fn escalate(&self, agent_id: &str, timer: &CancellationToken) {
        let map = self.read();
        let Some(tracked) = map.get(agent_id) else {
            return;
        };
        if timer.is_cancelled()
            || tracked.record.status.is_terminal()
            || tracked.control.has_exited()
        {
            return;
        }
        warn!(agent_id, pid = tracked.record.pid, "graceful stop timed out; forcing");
        let delivered = tracked.control.signal(StopLevel::Force);
        drop(map);

        self.notifier
            .publish(ProcessEvent::new(ProcessEventKind::ForceKilled, agent_id));
        if !delivered {
            self.report_undelivered(agent_id, StopLevel::Force);
        }
    }

    fn report_undelivered(&self, agent_id: &str, level: StopLevel) {
        warn!(agent_id, ?level, "stop signal not delivered");
        self.notifier.publish(
            ProcessEvent::new(ProcessEventKind::Error, agent_id)
                .with_reason(format!("{level:?} stop signal not delivered")),
        );
    }

    /// Records an exit, releases waiters and schedules the purge.
    fn handle_exit(
        self: &Arc<Self>,
        agent_id: &str,
        generation: u64,
        code: Option<i32>,
        signal: Option<String>,
    ) {
        let status = {
            let mut map = self.write();
            let Some(tracked) = map.get_mut(agent_id).filter(|t| t.generation == generation)
            else {
                return;
            };
            if tracked.record.status.is_terminal() {
                return;
            }
            tracked.record.finish(code, signal.clone());
            tracked.settle();
            tracked.record.status
        };

        info!(agent_id, ?code, ?signal, status = status.as_str(), "process exited");
        self.notifier.publish(
            ProcessEvent::new(ProcessEventKind::Exited, agent_id).with_exit(
                status,
                code,
                signal.as_deref(),
            ),
        );
        self.schedule_purge(agent_id, generation);
    }

    /// Records a spawn-level failure.
    fn handle_error(self: &Arc<Self>, agent_id: &str, generation: u64, message: String) {
        let transitioned = {
            let mut map = self.write();
            let Some(tracked) = map.get_mut(agent_id).filter(|t| t.generation == generation)
            else {
                return;
            };
            let transitioned = !tracked.record.status.is_terminal();
            if transitioned {
                tracked.record.status = ProcessStatus::Failed;
                tracked.settle();
            }
            transitioned
        };

        warn!(agent_id, error = %message, "process error");
        self.notifier.publish(
            ProcessEvent::new(ProcessEventKind::Error, agent_id).with_reason(message),
        );
        if transitioned {
            self.schedule_purge(agent_id, generation);
        }
    }

    fn schedule_purge(self: &Arc<Self>, agent_id: &str, generation: u64) {
        let me = Arc::clone(self);
        let id = agent_id.to_string();
        let grace = self.cfg.purge_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = {
                let mut map = me.write();
                let current = map.get(&id).is_some_and(|t| t.generation == generation);
                if current { map.remove(&id) } else { None }
            };
            if let Some(tracked) = removed {
                tracked.observers.cancel();
                debug!(agent_id = %id, "process purged");
                me.notifier
                    .publish(ProcessEvent::new(ProcessEventKind::Purged, id.as_str()));
            }
        });
    }

    /// True iff tracked, `Running`, and the handle has not reported exit.
    pub fn is_running(&self, agent_id: &str) -> bool {
        self.read().get(agent_id).is_some_and(|t| {
            t.record.status == ProcessStatus::Running && !t.control.has_exited()
        })
    }

    /// Snapshots of every `Running` process, sorted by agent id.
    pub fn get_active_processes(&self) -> Vec<ProcessRecord> {
        let mut active: Vec<ProcessRecord> = self
            .read()
            .values()
            .filter(|t| t.record.status == ProcessStatus::Running)
            .map(|t| t.record.clone())
            .collect();
        active.sort_unstable_by(|a, b| a.agent_id.cmp(&b.agent_id));
        active
    }

    /// Snapshot of one process, or `None` for unknown agents.
    pub fn get_process_info(&self, agent_id: &str) -> Option<ProcessRecord> {
        self.read().get(agent_id).map(|t| t.record.clone())
    }

    /// Number of tracked entries, terminal ones awaiting purge included.
    pub fn tracked_count(&self) -> usize {
        self.read().len()
    }

    /// Terminates every running process concurrently; returns how many were addressed.
    pub async fn terminate_all(self: &Arc<Self>, timeout: Duration) -> usize {
        let ids: Vec<String> = self
            .get_active_processes()
            .into_iter()
            .map(|r| r.agent_id)
            .collect();
        let results = join_all(ids.iter().map(|id| self.terminate_process(id, timeout))).await;
        for (id, res) in ids.iter().zip(&results) {
            if let Err(e) = res {
                debug!(agent_id = %id, label = e.as_label(), "terminate_all: skipped");
            }
        }
        results.iter().filter(|r| r.is_ok()).count()
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("cfg", &self.cfg)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    use crate::process::LifecycleSender;

    /// Scripted process: records signals and optionally exits on them.
    struct FakeControl {
        exited: AtomicBool,
        honor_graceful: bool,
        signals: Mutex<Vec<StopLevel>>,
        lifecycle: Mutex<Option<LifecycleSender>>,
    }

    impl FakeControl {
        fn exit(&self, code: Option<i32>, signal: Option<&str>) {
            self.exited.store(true, Ordering::SeqCst);
            if let Some(tx) = self.lifecycle.lock().unwrap().as_ref() {
                tx.exited(code, signal.map(str::to_string));
            }
        }

        fn signals(&self) -> Vec<StopLevel> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl ProcessControl for FakeControl {
        fn signal(&self, level: StopLevel) -> bool {
            self.signals.lock().unwrap().push(level);
            match level {
                StopLevel::Graceful if self.honor_graceful => self.exit(None, Some("SIGTERM")),
                StopLevel::Force => self.exit(None, Some("SIGKILL")),
                StopLevel::Graceful => {}
            }
            true
        }

        fn has_exited(&self) -> bool {
            self.exited.load(Ordering::SeqCst)
        }
    }

    fn fake(pid: Option<u32>, honor_graceful: bool) -> (Arc<FakeControl>, ProcessHandle) {
        let control = Arc::new(FakeControl {
            exited: AtomicBool::new(false),
            honor_graceful,
            signals: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(None),
        });
        let (handle, tx) = ProcessHandle::new(pid, control.clone());
        *control.lifecycle.lock().unwrap() = Some(tx);
        (control, handle)
    }

    fn supervisor(purge_grace: Duration) -> Arc<ProcessSupervisor> {
        ProcessSupervisor::new(SupervisorConfig {
            purge_grace,
            ..SupervisorConfig::default()
        })
    }

    fn drain(rx: &mut broadcast::Receiver<ProcessEvent>) -> Vec<ProcessEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn test_register_tracks_running_process() {
        let sup = supervisor(Duration::from_secs(5));
        let mut rx = sup.subscribe();
        let (_ctl, handle) = fake(Some(4242), true);

        let rec = sup.register_process("manager", handle).unwrap();
        assert_eq!(rec.agent_id, "manager");
        assert_eq!(rec.pid, 4242);
        assert_eq!(rec.status, ProcessStatus::Running);
        assert!(sup.is_running("manager"));
        assert_eq!(sup.get_process_info("manager"), Some(rec.clone()));
        assert_eq!(sup.get_active_processes(), vec![rec]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ProcessEventKind::Spawned);
        assert_eq!(events[0].pid, Some(4242));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let sup = supervisor(Duration::from_secs(5));
        let (_a, first) = fake(Some(1), true);
        let (_b, second) = fake(Some(2), true);

        sup.register_process("impl", first).unwrap();
        let err = sup.register_process("impl", second).unwrap_err();
        assert_eq!(
            err,
            SupervisorError::AlreadyRegistered {
                agent_id: "impl".into()
            }
        );
        assert_eq!(sup.get_process_info("impl").map(|r| r.pid), Some(1));
        assert_eq!(sup.tracked_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_without_pid_is_rejected() {
        let sup = supervisor(Duration::from_secs(5));
        let (_ctl, handle) = fake(None, true);
        let err = sup.register_process("ghost", handle).unwrap_err();
        assert_eq!(err.as_label(), "supervisor_missing_pid");
        assert_eq!(sup.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_output_buffer_is_bounded_and_skips_blank_lines() {
        let sup = supervisor(Duration::from_secs(5));
        let (_ctl, handle) = fake(Some(7), true);
        sup.register_process("a", handle).unwrap();

        for i in 0..1001 {
            sup.capture_output("a", StreamKind::Stdout, &format!("line {i}\n"));
        }
        sup.capture_output("a", StreamKind::Stdout, "\n   \n\t\r\n");
        sup.capture_output("a", StreamKind::Stderr, "oops\r\n\nagain");

        let out = sup.get_output("a").unwrap();
        assert_eq!(out.stdout.len(), 1000);
        assert_eq!(out.stdout[0], "line 1");
        assert_eq!(out.stdout[999], "line 1000");
        assert_eq!(out.stderr, vec!["oops".to_string(), "again".to_string()]);

        sup.capture_output("unknown", StreamKind::Stdout, "ignored");
        assert!(sup.get_output("unknown").is_none());
    }

    #[tokio::test]
    async fn test_status_marker_detection() {
        let sup = supervisor(Duration::from_secs(5));
        let (_ctl, handle) = fake(Some(7), true);
        sup.register_process("a", handle).unwrap();
        let mut rx = sup.subscribe();

        sup.capture_output("a", StreamKind::Stdout, "[APM_STATUS:READY] agent booted\n\n");

        let markers: Vec<ProcessEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == ProcessEventKind::StatusMarker)
            .collect();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].marker, Some(StatusMarker::Ready));
        assert_eq!(
            markers[0].line.as_deref(),
            Some("[APM_STATUS:READY] agent booted")
        );

        sup.capture_output("a", StreamKind::Stderr, "   ");
        assert!(drain(&mut rx).is_empty(), "blank lines are neither buffered nor scanned");
    }

    #[tokio::test]
    async fn test_get_output_returns_copies() {
        let sup = supervisor(Duration::from_secs(5));
        let (_ctl, handle) = fake(Some(7), true);
        sup.register_process("a", handle).unwrap();
        sup.capture_output("a", StreamKind::Stdout, "one");

        let mut out = sup.get_output("a").unwrap();
        out.stdout.clear();
        assert_eq!(sup.get_output("a").unwrap().stdout, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_observers_capture_output() {
        let sup = supervisor(Duration::from_secs(5));
        let (_ctl, handle) = fake(Some(9), true);
        let handle = handle
            .with_stdout(&b"hello\n[APM_STATUS:COMPLETE] done\n"[..])
            .with_stderr(&b"warning: x\n"[..]);
        sup.register_process("a", handle).unwrap();

        assert!(
            wait_until(|| {
                sup.get_output("a")
                    .is_some_and(|o| o.stdout.len() == 2 && o.stderr.len() == 1)
            })
            .await
        );
        let out = sup.get_output("a").unwrap();
        assert_eq!(out.stdout, vec!["hello", "[APM_STATUS:COMPLETE] done"]);
        assert_eq!(out.stderr, vec!["warning: x"]);
    }

    #[tokio::test]
    async fn test_exit_classification_and_purge() {
        let sup = supervisor(Duration::from_millis(50));
        let mut rx = sup.subscribe();
        let (ok, h1) = fake(Some(1), true);
        let (bad, h2) = fake(Some(2), true);
        sup.register_process("ok", h1).unwrap();
        sup.register_process("bad", h2).unwrap();

        ok.exit(Some(0), None);
        bad.exit(Some(2), None);

        assert!(
            wait_until(|| {
                sup.get_process_info("ok")
                    .is_some_and(|r| r.status == ProcessStatus::Exited)
                    && sup
                        .get_process_info("bad")
                        .is_some_and(|r| r.status == ProcessStatus::Failed)
            })
            .await
        );
        assert_eq!(sup.get_process_info("bad").and_then(|r| r.exit_code), Some(2));
        assert!(!sup.is_running("ok"));
        assert!(sup.get_active_processes().is_empty());

        assert!(wait_until(|| sup.tracked_count() == 0).await);
        let kinds: Vec<ProcessEventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == ProcessEventKind::Exited).count(),
            2
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == ProcessEventKind::Purged).count(),
            2
        );

        let (_again, h3) = fake(Some(3), true);
        assert!(sup.register_process("ok", h3).is_ok(), "id reusable after purge");
    }

    #[tokio::test]
    async fn test_terminate_graceful_exit_cancels_kill_timer() {
        let sup = supervisor(Duration::from_secs(5));
        let (ctl, handle) = fake(Some(10), true);
        sup.register_process("a", handle).unwrap();

        sup.terminate_process("a", Duration::from_millis(50))
            .await
            .unwrap();
        let rec = sup.get_process_info("a").unwrap();
        assert_eq!(rec.status, ProcessStatus::Failed);
        assert_eq!(rec.exit_signal.as_deref(), Some("SIGTERM"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(ctl.signals(), vec![StopLevel::Graceful]);
    }

    #[tokio::test]
    async fn test_terminate_escalates_after_timeout() {
        let sup = supervisor(Duration::from_secs(5));
        let mut rx = sup.subscribe();
        let (ctl, handle) = fake(Some(11), false);
        sup.register_process("stubborn", handle).unwrap();

        let started = Instant::now();
        sup.terminate_process("stubborn", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));

        assert_eq!(ctl.signals(), vec![StopLevel::Graceful, StopLevel::Force]);
        let rec = sup.get_process_info("stubborn").unwrap();
        assert_eq!(rec.exit_signal.as_deref(), Some("SIGKILL"));

        let kinds: Vec<ProcessEventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ProcessEventKind::TerminationRequested));
        assert!(kinds.contains(&ProcessEventKind::ForceKilled));
        assert!(kinds.contains(&ProcessEventKind::Exited));
    }

    #[tokio::test]
    async fn test_terminate_already_exited_sends_nothing() {
        let sup = supervisor(Duration::from_secs(5));
        let (ctl, handle) = fake(Some(12), true);
        sup.register_process("a", handle).unwrap();
        ctl.exit(Some(0), None);
        assert!(
            wait_until(|| sup
                .get_process_info("a")
                .is_some_and(|r| r.status.is_terminal()))
            .await
        );

        sup.terminate_process("a", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(ctl.signals().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_uses_configured_timeout() {
        let sup = ProcessSupervisor::new(SupervisorConfig {
            terminate_timeout: Duration::from_millis(20),
            ..SupervisorConfig::default()
        });
        let (ctl, handle) = fake(Some(15), false);
        sup.register_process("a", handle).unwrap();

        sup.terminate("a").await.unwrap();
        assert_eq!(ctl.signals(), vec![StopLevel::Graceful, StopLevel::Force]);
    }

    #[tokio::test]
    async fn test_terminate_unknown_agent() {
        let sup = supervisor(Duration::from_secs(5));
        let err = sup
            .terminate_process("nobody", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "supervisor_not_found");
    }

    #[tokio::test]
    async fn test_concurrent_terminate_signals_once() {
        let sup = supervisor(Duration::from_secs(5));
        let (ctl, handle) = fake(Some(13), false);
        sup.register_process("a", handle).unwrap();

        let (r1, r2) = tokio::join!(
            sup.terminate_process("a", Duration::from_millis(30)),
            sup.terminate_process("a", Duration::from_millis(30)),
        );
        assert!(r1.is_ok() && r2.is_ok());
        assert_eq!(ctl.signals(), vec![StopLevel::Graceful, StopLevel::Force]);
    }

    #[tokio::test]
    async fn test_spawn_error_marks_failed() {
        let sup = supervisor(Duration::from_secs(5));
        let mut rx = sup.subscribe();
        let (ctl, handle) = fake(Some(14), true);
        sup.register_process("a", handle).unwrap();

        if let Some(tx) = ctl.lifecycle.lock().unwrap().as_ref() {
            tx.error("executable not found");
        }
        assert!(
            wait_until(|| sup
                .get_process_info("a")
                .is_some_and(|r| r.status == ProcessStatus::Failed))
            .await
        );
        let errors: Vec<ProcessEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == ProcessEventKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reason.as_deref(), Some("executable not found"));

        sup.terminate_process("a", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(ctl.signals().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_all() {
        let sup = supervisor(Duration::from_secs(5));
        let (c1, h1) = fake(Some(21), true);
        let (c2, h2) = fake(Some(22), false);
        sup.register_process("one", h1).unwrap();
        sup.register_process("two", h2).unwrap();

        assert_eq!(sup.terminate_all(Duration::from_millis(30)).await, 2);
        assert!(sup.get_active_processes().is_empty());
        assert_eq!(c1.signals(), vec![StopLevel::Graceful]);
        assert_eq!(c2.signals(), vec![StopLevel::Graceful, StopLevel::Force]);
    }
}
