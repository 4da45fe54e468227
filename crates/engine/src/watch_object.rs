// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch Object (WO): the per-descriptor state machine that turns watch
//! notifications into supervised child runs, translated from `core.py`'s
//! `TwitcherObject`.
//!
//! Unlike the source, the watch stays continuously armed (this task
//! re-registers with the multiplexer immediately after every
//! notification, running or not) rather than only re-arming from
//! `_post_exec`. This removes the gap during which the original could
//! miss a change while a script was running — QUEUE/DISCARD still only
//! ever act on the single latest notification, now tracked explicitly as
//! `pending` rather than implicitly by watch registration state.
//!
//! A cancelled shutdown token stops this task from accepting further
//! notifications but does not touch a child already running: the task
//! keeps polling its `JoinSet` until empty before returning.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use twitcher_core::{RunMode, WatchDescriptor};
use twitcher_proc::{PollResult, Subprocess};
use twitcher_zk::{WatchKind, WatchMultiplexer, WatchNotification, WatchValue, ZkAdapter, ZkError};

pub struct WatchObject<A: ZkAdapter + 'static> {
    descriptor: WatchDescriptor,
    wm: Arc<WatchMultiplexer<A>>,
}

impl<A: ZkAdapter + 'static> WatchObject<A> {
    pub fn new(descriptor: WatchDescriptor, wm: Arc<WatchMultiplexer<A>>) -> Self {
        Self { descriptor, wm }
    }

    /// Spawns the state machine as its own task. The returned handle can
    /// be aborted to tear this watch down outright (e.g. the owning
    /// config file was edited to no longer declare it), or left to drain
    /// on its own once `shutdown` is cancelled: no new notifications are
    /// accepted, but any already-running child is let finish and be
    /// reaped before the task returns.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        let kind = WatchKind::from(self.descriptor.watch_type);
        let running_pids: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let mut children: JoinSet<()> = JoinSet::new();
        let mut pending: Option<Result<WatchValue, ZkError>> = None;
        let mut first_notification = true;
        let mut shutting_down = false;

        let (_id, mut rx) = self.wm.register(kind, self.descriptor.path.clone());

        loop {
            if shutting_down && children.is_empty() {
                break;
            }
            tokio::select! {
                _ = shutdown.cancelled(), if !shutting_down => {
                    info!(path = %self.descriptor.path, "shutting down; draining any running child");
                    shutting_down = true;
                }
                notification = rx.recv(), if !shutting_down => {
                    let Some(notification) = notification else {
                        info!(path = %self.descriptor.path, "watch multiplexer shut down; stopping");
                        break;
                    };
                    let (_id, new_rx) = self.wm.register(kind, self.descriptor.path.clone());
                    rx = new_rx;

                    if first_notification {
                        first_notification = false;
                        if !self.descriptor.run_on_load {
                            continue;
                        }
                    }

                    self.on_notification(notification, &running_pids, &mut children, &mut pending).await;
                }
                Some(outcome) = children.join_next(), if !children.is_empty() => {
                    if let Err(err) = outcome {
                        error!(path = %self.descriptor.path, %err, "child task panicked");
                    }
                    if let Some(replay) = pending.take() {
                        if shutting_down {
                            info!(path = %self.descriptor.path, "dropping queued notification; shutting down");
                        } else {
                            self.exec(replay, &running_pids, &mut children).await;
                        }
                    }
                }
            }
        }
    }

    async fn on_notification(
        &self,
        notification: WatchNotification,
        running_pids: &Arc<Mutex<Vec<i32>>>,
        children: &mut JoinSet<()>,
        pending: &mut Option<Result<WatchValue, ZkError>>,
    ) {
        let is_running = !running_pids.lock().is_empty();
        if is_running && self.descriptor.run_mode != RunMode::Parallel {
            match self.descriptor.run_mode {
                RunMode::Queue => {
                    info!(path = %self.descriptor.path, "queueing notification behind the running process");
                    if let Some(sig) = self.descriptor.notify_signal {
                        self.signal_running(running_pids, sig);
                    }
                    *pending = Some(notification.result);
                }
                RunMode::Discard => {
                    info!(path = %self.descriptor.path, "discarding notification; a process is already running");
                }
                RunMode::Parallel => unreachable!(),
            }
            return;
        }
        self.exec(notification.result, running_pids, children).await;
    }

    fn signal_running(&self, running_pids: &Arc<Mutex<Vec<i32>>>, sig: twitcher_core::NotifySignal) {
        let Ok(signal) = Signal::try_from(sig.get() as i32) else { return };
        for pid in running_pids.lock().iter() {
            if let Err(err) = kill(Pid::from_raw(*pid), signal) {
                warn!(path = %self.descriptor.path, pid, %err, "failed to deliver notify_signal");
            }
        }
    }

    async fn exec(&self, result: Result<WatchValue, ZkError>, running_pids: &Arc<Mutex<Vec<i32>>>, children: &mut JoinSet<()>) {
        let data = match result {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %self.descriptor.path, %err, "not running action; watch fetch failed");
                return;
            }
        };
        let stdin_data = match (&data, self.descriptor.pipe_stdin) {
            (WatchValue::Data(bytes), true) => bytes.clone(),
            _ => Vec::new(),
        };

        info!(description = %self.descriptor.description, "executing process");
        let sr = match Subprocess::spawn(
            self.descriptor.description.clone(),
            &self.descriptor.action,
            self.descriptor.uid.as_ref(),
            self.descriptor.gid.as_ref(),
            stdin_data,
        ) {
            Ok(sr) => sr,
            Err(err) => {
                error!(description = %self.descriptor.description, %err, "failed to spawn process");
                return;
            }
        };

        let pid = sr.pid() as i32;
        running_pids.lock().push(pid);
        let description = self.descriptor.description.clone();
        let timeout = self.descriptor.timeout;
        let running_pids = running_pids.clone();

        children.spawn(async move {
            let outcome = run_to_completion(sr, timeout).await;
            running_pids.lock().retain(|&p| p != pid);
            log_outcome(&description, outcome);
        });
    }
}

async fn run_to_completion(mut sr: Subprocess, timeout: Option<Duration>) -> std::io::Result<PollResult> {
    let mut deadline = timeout.map(|d| tokio::time::Instant::now() + d);
    loop {
        tokio::select! {
            result = sr.wait() => return result,
            _ = sr.write_stdin(), if sr.has_pending_stdin() => {}
            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                let _ = sr.send_signal(Signal::SIGKILL);
                deadline = None;
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    } else {
        std::future::pending::<()>().await;
    }
}

fn log_outcome(description: &str, outcome: std::io::Result<PollResult>) {
    match outcome {
        Ok(PollResult::Exited(code)) if code == 0 => info!(description, code, "process exited"),
        Ok(PollResult::Exited(code)) => warn!(description, code, "process exited with nonzero status"),
        Ok(PollResult::Signaled(sig)) => warn!(description, sig, "process was killed by a signal"),
        Ok(PollResult::StillRunning) => unreachable!("wait() never returns StillRunning"),
        Err(err) => error!(description, %err, "error waiting for process"),
    }
}

#[cfg(test)]
#[path = "watch_object_tests.rs"]
mod tests;
