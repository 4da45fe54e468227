// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use twitcher_core::Action;

#[tokio::test]
async fn shell_action_runs_and_exits_zero() {
    let mut sr = Subprocess::spawn("test", &Action::shell("exit 0"), None, None, Vec::new()).unwrap();
    let result = sr.wait().await.unwrap();
    assert_eq!(result, PollResult::Exited(0));
}

#[tokio::test]
async fn shell_action_propagates_exit_code() {
    let mut sr = Subprocess::spawn("test", &Action::shell("exit 7"), None, None, Vec::new()).unwrap();
    let result = sr.wait().await.unwrap();
    assert_eq!(result, PollResult::Exited(7));
}

#[tokio::test]
async fn exec_action_runs_argv_directly() {
    let action = Action::exec(vec!["/bin/true".to_string()]);
    let mut sr = Subprocess::spawn("test", &action, None, None, Vec::new()).unwrap();
    let result = sr.wait().await.unwrap();
    assert_eq!(result, PollResult::Exited(0));
}

#[tokio::test]
async fn empty_stdin_buffer_closes_pipe_immediately() {
    let sr = Subprocess::spawn("test", &Action::shell("cat >/dev/null"), None, None, Vec::new()).unwrap();
    assert!(!sr.has_pending_stdin());
}

#[tokio::test]
async fn nonempty_stdin_buffer_is_drained_and_then_closed() {
    let mut sr =
        Subprocess::spawn("test", &Action::shell("cat >/dev/null"), None, None, b"hello".to_vec()).unwrap();
    assert!(sr.has_pending_stdin());
    while sr.has_pending_stdin() {
        sr.write_stdin().await.unwrap();
    }
    assert!(!sr.has_pending_stdin());
    let result = sr.wait().await.unwrap();
    assert_eq!(result, PollResult::Exited(0));
}

#[tokio::test]
async fn poll_reports_still_running_before_exit() {
    let mut sr = Subprocess::spawn("test", &Action::shell("sleep 5"), None, None, Vec::new()).unwrap();
    assert_eq!(sr.poll().unwrap(), PollResult::StillRunning);
    sr.send_signal(nix::sys::signal::Signal::SIGKILL).unwrap();
    let result = sr.wait().await.unwrap();
    assert_eq!(result, PollResult::Signaled(nix::sys::signal::Signal::SIGKILL as i32));
}

#[tokio::test]
async fn unknown_user_identity_is_rejected_before_spawn() {
    let uid = twitcher_core::Identity::Name("definitely-not-a-real-user-xyz".to_string());
    let err = Subprocess::spawn("test", &Action::shell("exit 0"), Some(&uid), None, Vec::new())
        .err()
        .expect("should fail to resolve identity");
    assert!(matches!(err, SpawnError::Identity(_)));
}
