// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess Runner (SR): spawns one action as a child process with a
//! controlled stdin, an optional identity switch, and a clean descriptor
//! table, translated from `core.py`'s `MinimalSubprocess`/`fork_exec`.

use crate::identity;
use nix::sys::resource::{getrlimit, Resource};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use twitcher_core::{Action, Identity};

/// Used when `RLIMIT_NOFILE`'s soft limit is reported as infinite; mirrors
/// the source's `MAXFD` fallback constant.
const MAXFD_FALLBACK: u64 = 65536;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Identity(#[from] twitcher_core::IdentityError),

    #[error("failed to spawn child: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to read resource limits: {0}")]
    Rlimit(#[source] nix::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
}

/// Outcome of a non-blocking [`Subprocess::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    StillRunning,
    Exited(i32),
    /// The child was killed by a signal (e.g. our own `timeout`/`notify_signal`).
    Signaled(i32),
}

/// Either a `Command`-spawned child (the common `Exec`/`Shell` path) or a
/// raw-forked one (the `Fn` path, which has no `exec` target to hand to
/// `Command`).
enum ChildHandle {
    Command(Child),
    Forked { pid: Pid, reaped: bool },
}

/// One spawned action. Mirrors `MinimalSubprocess`: owns the pid, the
/// stdin-write half of the pipe (closed once drained), and the remaining
/// buffer to write.
pub struct Subprocess {
    description: String,
    pid: u32,
    child: ChildHandle,
    stdin: Option<StdinHandle>,
    buffer: Vec<u8>,
}

enum StdinHandle {
    Tokio(ChildStdin),
    Raw(OwnedFd),
}

fn build_command(action: &Action) -> Command {
    let mut cmd = match action {
        Action::Shell(command) => {
            let mut c = Command::new("/bin/sh");
            c.arg("-c").arg(command);
            c
        }
        Action::Exec(argv) => {
            let mut c = Command::new(&argv[0]);
            c.args(&argv[1..]);
            c
        }
        Action::Fn(_) => unreachable!("Action::Fn is spawned via spawn_fn, not build_command"),
    };
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd
}

/// Closes every file descriptor at or above 3, up to the soft
/// `RLIMIT_NOFILE` ceiling. Called from within `pre_exec` or post-fork, so
/// only async-signal-safe operations are performed here.
fn close_extra_fds(soft_limit: u64) {
    for fd in 3..soft_limit as i32 {
        // Best-effort: an EBADF here just means the fd was never open.
        let _ = nix::unistd::close(fd);
    }
}

fn soft_nofile_limit() -> Result<u64, SpawnError> {
    let (soft, _hard) = getrlimit(Resource::RLIMIT_NOFILE).map_err(SpawnError::Rlimit)?;
    Ok(if soft == nix::sys::resource::RLIM_INFINITY { MAXFD_FALLBACK } else { soft })
}

impl Subprocess {
    /// Spawns `action` with `stdin_data` piped to the child's stdin (closed
    /// immediately if empty), optionally switching identity. Group is set
    /// before user, since dropping the user first would leave the process
    /// without permission to change its group.
    pub fn spawn(
        description: impl Into<String>,
        action: &Action,
        uid: Option<&Identity>,
        gid: Option<&Identity>,
        stdin_data: Vec<u8>,
    ) -> Result<Self, SpawnError> {
        let description = description.into();
        let resolved_uid = uid.map(identity::resolve_uid).transpose()?;
        let resolved_gid = gid.map(identity::resolve_gid).transpose()?;
        let soft_limit = soft_nofile_limit()?;

        if let Action::Fn(func) = action {
            return Self::spawn_fn(description, func.clone(), resolved_uid, resolved_gid, soft_limit, stdin_data);
        }

        let mut cmd = build_command(action);
        // SAFETY: this closure runs in the forked child between fork() and
        // exec(), before any other thread exists in that process image. It
        // only calls async-signal-safe syscalls (close/setgid/setuid).
        unsafe {
            cmd.pre_exec(move || {
                close_extra_fds(soft_limit);
                if let Some(gid) = resolved_gid {
                    nix::unistd::setgid(gid).map_err(io::Error::from)?;
                }
                if let Some(uid) = resolved_uid {
                    nix::unistd::setuid(uid).map_err(io::Error::from)?;
                }
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(SpawnError::Spawn)?;
        let pid = child.id().unwrap_or(0);
        let stdin = child.stdin.take().map(StdinHandle::Tokio);

        let mut sr = Subprocess {
            description,
            pid,
            child: ChildHandle::Command(child),
            stdin,
            buffer: stdin_data,
        };
        if sr.buffer.is_empty() {
            sr.close_stdin();
        }
        Ok(sr)
    }

    /// Runs a native `Fn` action via a raw fork, since there is no `exec`
    /// target to hand to `Command`. The child writes nothing but its exit
    /// code; stdin is a plain pipe this struct owns and drains the same way
    /// as the `Command`-spawned path.
    fn spawn_fn(
        description: String,
        func: std::sync::Arc<dyn Fn() -> Result<i32, String> + Send + Sync>,
        resolved_uid: Option<nix::unistd::Uid>,
        resolved_gid: Option<nix::unistd::Gid>,
        soft_limit: u64,
        stdin_data: Vec<u8>,
    ) -> Result<Self, SpawnError> {
        use nix::unistd::{close, dup2, fork, pipe, ForkResult};

        let (read_fd, write_fd): (OwnedFd, OwnedFd) = pipe().map_err(SpawnError::Fork)?;

        // SAFETY: fork() followed immediately by exit() in the child,
        // performing only async-signal-safe operations before running the
        // caller-supplied closure. No other threads are created between the
        // fork and the exit.
        match unsafe { fork() }.map_err(SpawnError::Fork)? {
            ForkResult::Child => {
                let _ = dup2(read_fd.as_raw_fd(), 0);
                if let Ok(devnull) = std::fs::OpenOptions::new().write(true).open("/dev/null") {
                    let _ = dup2(devnull.as_raw_fd(), 1);
                    let _ = dup2(devnull.as_raw_fd(), 2);
                }
                drop(read_fd);
                drop(write_fd);
                close_extra_fds(soft_limit);
                if let Some(gid) = resolved_gid {
                    let _ = nix::unistd::setgid(gid);
                }
                if let Some(uid) = resolved_uid {
                    let _ = nix::unistd::setuid(uid);
                }
                let code = func().unwrap_or(1);
                std::process::exit(code);
            }
            ForkResult::Parent { child } => {
                drop(read_fd);
                let stdin = if stdin_data.is_empty() { None } else { Some(StdinHandle::Raw(write_fd)) };
                let mut sr = Subprocess {
                    description,
                    pid: child.as_raw() as u32,
                    child: ChildHandle::Forked { pid: child, reaped: false },
                    stdin,
                    buffer: stdin_data,
                };
                if sr.buffer.is_empty() {
                    sr.close_stdin();
                }
                Ok(sr)
            }
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// True iff there is still unflushed buffer to write (invariant: stdin
    /// is open iff this is true).
    pub fn has_pending_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    fn close_stdin(&mut self) {
        self.stdin = None;
        self.buffer.clear();
    }

    /// Best-effort write of the remaining buffer; closes stdin once drained.
    pub async fn write_stdin(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            self.close_stdin();
            return Ok(());
        }
        let written = match self.stdin.as_mut() {
            None => return Ok(()),
            Some(StdinHandle::Tokio(stdin)) => stdin.write(&self.buffer).await?,
            Some(StdinHandle::Raw(fd)) => nix::unistd::write(fd, &self.buffer).map_err(io::Error::from)?,
        };
        self.buffer.drain(..written);
        if self.buffer.is_empty() {
            self.close_stdin();
        }
        Ok(())
    }

    /// Non-blocking reap, mirroring `MinimalSubprocess.poll`. Returns
    /// `StillRunning` until the child exits.
    pub fn poll(&mut self) -> io::Result<PollResult> {
        match &mut self.child {
            ChildHandle::Command(child) => match child.try_wait()? {
                None => Ok(PollResult::StillRunning),
                Some(status) => Ok(classify_exit(status)),
            },
            ChildHandle::Forked { pid, reaped } => {
                if *reaped {
                    return Ok(PollResult::Exited(0));
                }
                match waitpid(*pid, Some(WaitPidFlag::WNOHANG)).map_err(io_from_nix)? {
                    WaitStatus::StillAlive => Ok(PollResult::StillRunning),
                    status => {
                        *reaped = true;
                        Ok(classify_wait_status(status))
                    }
                }
            }
        }
    }

    /// Async wait for completion, used by the event loop to multiplex
    /// child-exit futures instead of a SIGCHLD handler.
    pub async fn wait(&mut self) -> io::Result<PollResult> {
        match &mut self.child {
            ChildHandle::Command(child) => {
                let status = child.wait().await?;
                Ok(classify_exit(status))
            }
            ChildHandle::Forked { pid, reaped } => {
                // No async wait4 available for a raw fork; poll on an
                // interval rather than block the executor.
                loop {
                    if *reaped {
                        return Ok(PollResult::Exited(0));
                    }
                    match waitpid(*pid, Some(WaitPidFlag::WNOHANG)).map_err(io_from_nix)? {
                        WaitStatus::StillAlive => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
                        status => {
                            *reaped = true;
                            return Ok(classify_wait_status(status));
                        }
                    }
                }
            }
        }
    }

    /// Delivers a POSIX signal to the still-running child (advisory
    /// `notify_signal`, or a hard `SIGKILL` on `timeout` expiry).
    pub fn send_signal(&self, sig: Signal) -> nix::Result<()> {
        kill(Pid::from_raw(self.pid as i32), sig)
    }
}

fn io_from_nix(err: nix::Error) -> io::Error {
    io::Error::from(err)
}

fn classify_exit(status: ExitStatus) -> PollResult {
    if let Some(code) = status.code() {
        PollResult::Exited(code)
    } else if let Some(sig) = status.signal() {
        PollResult::Signaled(sig)
    } else {
        PollResult::Exited(1)
    }
}

fn classify_wait_status(status: WaitStatus) -> PollResult {
    match status {
        WaitStatus::Exited(_, code) => PollResult::Exited(code),
        WaitStatus::Signaled(_, sig, _) => PollResult::Signaled(sig as i32),
        _ => PollResult::Exited(1),
    }
}

impl Drop for Subprocess {
    fn drop(&mut self) {
        // Never block; just make sure the write end is released if it's
        // still open (mirrors `MinimalSubprocess.__del__`).
        self.stdin = None;
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
