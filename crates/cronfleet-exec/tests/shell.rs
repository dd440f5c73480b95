#![cfg(unix)]

use std::time::{Duration, Instant};

use cronfleet_exec::{ExecError, OutputBuffer, exec_shell, exec_shell_with_buffer};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn captures_stdout_and_stderr() {
    let cancel = CancellationToken::new();
    let out = exec_shell(&cancel, "echo out; echo err 1>&2").await;

    assert!(out.is_success(), "unexpected error: {:?}", out.error);
    assert!(out.output.contains("out\n"));
    assert!(out.output.contains("err\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_zero_exit_keeps_output() {
    let cancel = CancellationToken::new();
    let out = exec_shell(&cancel, "echo before\nexit 3").await;

    assert_eq!(out.error, Some(ExecError::NonZeroExit { code: 3 }));
    assert_eq!(out.error.as_ref().unwrap().to_string(), "exit status 3");
    assert_eq!(out.output, "before\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_run_returns_partial_output() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let out = exec_shell(&cancel, "echo A; sleep 5; echo B").await;

    assert_eq!(out.error, Some(ExecError::TimeoutKilled));
    assert_eq!(out.error.as_ref().unwrap().to_string(), "timeout killed");
    assert!(out.output.contains('A'));
    assert!(!out.output.contains('B'));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_reaches_background_children() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    // the backgrounded sleep shares the pipes; the run only returns once it is gone too
    let started = Instant::now();
    let out = exec_shell(&cancel, "sleep 30 &\necho started\nwait").await;

    assert_eq!(out.error, Some(ExecError::TimeoutKilled));
    assert!(out.output.contains("started"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_script_exit_kills_leftover_children() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    // the script returns at once; the orphaned sleep keeps both pipes open
    let started = Instant::now();
    let out = exec_shell(&cancel, "echo A; sleep 8 &").await;

    assert_eq!(out.error, Some(ExecError::TimeoutKilled));
    assert_eq!(out.output, "A\n");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn html_entities_are_decoded_before_running() {
    let cancel = CancellationToken::new();
    let out = exec_shell(&cancel, "echo &quot;a&amp;b&quot; | tr a x").await;

    assert!(out.is_success());
    assert_eq!(out.output, "x&b\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crlf_scripts_run_under_bash() {
    let cancel = CancellationToken::new();
    let out = exec_shell(&cancel, "X=1\r\necho \"v=$X\"\r\n").await;

    assert!(out.is_success());
    assert_eq!(out.output, "v=1\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn buffer_is_readable_while_running() {
    let cancel = CancellationToken::new();
    let buffer = OutputBuffer::new();

    let run = {
        let cancel = cancel.clone();
        let buffer = buffer.clone();
        tokio::spawn(async move {
            exec_shell_with_buffer(&cancel, "echo first; sleep 2; echo second", &buffer).await
        })
    };

    tokio::time::sleep(Duration::from_millis(800)).await;
    let partial = buffer.snapshot();
    assert!(partial.contains("first"));
    assert!(!partial.contains("second"));

    let out = run.await.unwrap();
    assert!(out.is_success());
    assert_eq!(out.output, "first\nsecond\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_in_home_directory() {
    let Some(home) = std::env::var_os("HOME") else {
        return;
    };
    if !std::path::Path::new(&home).is_dir() {
        return;
    }

    let cancel = CancellationToken::new();
    let out = exec_shell(&cancel, "pwd -P").await;

    let expected = std::fs::canonicalize(&home).unwrap();
    assert_eq!(out.output.trim(), expected.to_string_lossy());
}
