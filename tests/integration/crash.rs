// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration tests for the fatal error path of the `crash` subcommand.

use super::tests::{sdrlog, stdout};
use sdrlog::logging::{Eviction, LineStore, SharedRegion, PANIC_EXIT_STATUS};
use sdrlog::{LogConfig, Logger};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Output};
use std::sync::Arc;

/// Set in the re-executed test binary to select the fatal scenario to run
const SCENARIO_ENV: &str = "SDRLOG_FATAL_SCENARIO";

/// Re-run this test binary on test `name` alone with `scenario` selected.
/// The scenario terminates the process, so it cannot run in the harness itself.
fn rerun_as_child(name: &str, scenario: &str) -> Output {
    Command::new(std::env::current_exe().unwrap())
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(SCENARIO_ENV, scenario)
        .output()
        .unwrap()
}

fn quiet_config() -> LogConfig {
    LogConfig {
        exit_pause_ms: 0,
        ..LogConfig::default()
    }
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_panic_exits_with_panic_status() {
    let output = sdrlog(&["crash", "--exit-pause-ms", "0"]);
    assert_eq!(output.status.code(), Some(PANIC_EXIT_STATUS));

    let out = stdout(&output);
    assert!(out.contains("crash requested (dump=false, sys=false)"));
    let report = out
        .lines()
        .find(|l| l.starts_with("PANIC: "))
        .expect("no PANIC line");
    assert!(report.starts_with("PANIC: \"requested crash\" ("));
    // location is the call site in the binary, not the reporter
    assert!(report.contains("main.rs, line "), "{}", report);
    assert!(out.contains("panic: backtrace 0 0x"));
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_sys_panic_reports_os_error() {
    let output = sdrlog(&["crash", "--sys", "--exit-pause-ms", "0"]);
    assert_eq!(output.status.code(), Some(PANIC_EXIT_STATUS));

    let out = stdout(&output);
    let report = out
        .lines()
        .find(|l| l.starts_with("SYS_PANIC: "))
        .expect("no SYS_PANIC line");
    assert!(report.starts_with("SYS_PANIC: \"close\" ("));
    let ebadf = std::io::Error::from_raw_os_error(libc::EBADF).to_string();
    assert!(report.ends_with(&ebadf), "{}", report);
    assert!(out.contains("sys_panic: backtrace 0 0x"));
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_dump_terminates_abnormally() {
    let output = sdrlog(&["crash", "--dump"]);
    assert_eq!(output.status.code(), None);
    assert_eq!(output.status.signal(), Some(libc::SIGABRT));

    let out = stdout(&output);
    assert!(out.contains("DUMP: \"requested core dump\" ("));
    assert!(out.contains("panic: backtrace 0 "));
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_uninitialized_store_is_fatal() {
    if std::env::var_os(SCENARIO_ENV).is_some() {
        // carved but never initialized by an owner
        let region = SharedRegion::anonymous(LineStore::region_size(8, 64).unwrap()).unwrap();
        let store = LineStore::carve(region, 8, 64, Eviction::HalfRotation).unwrap();
        let logger = Logger::builder(quiet_config())
            .store(Arc::new(store))
            .build()
            .unwrap();
        logger.print(format_args!("first line\n"));
        unreachable!("append to an uninitialized store returned");
    }

    let output = rerun_as_child("crash::test_uninitialized_store_is_fatal", "store");
    assert_eq!(output.status.code(), Some(PANIC_EXIT_STATUS));

    let out = stdout(&output);
    let report = out
        .lines()
        .find(|l| l.starts_with("PANIC: "))
        .expect("no PANIC line");
    assert!(
        report.starts_with("PANIC: \"log store: line store appended to before the owner initialized it\""),
        "{}",
        report
    );
    // the console line is written before the store append fails
    assert!(out.contains("first line"));
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_scratch_allocation_failure_is_fatal() {
    if std::env::var_os(SCENARIO_ENV).is_some() {
        let config = LogConfig {
            scratch_len: usize::MAX,
            ..quiet_config()
        };
        let logger = Logger::builder(config).build().unwrap();
        logger.print(format_args!("never formatted\n"));
        unreachable!("scratch reservation of usize::MAX bytes succeeded");
    }

    let output = rerun_as_child("crash::test_scratch_allocation_failure_is_fatal", "scratch");
    assert_eq!(output.status.code(), Some(PANIC_EXIT_STATUS));

    let out = stdout(&output);
    assert!(out.contains("PANIC: \"log scratch allocation\" ("), "{}", out);
    assert!(!out.contains("never formatted"));
}
