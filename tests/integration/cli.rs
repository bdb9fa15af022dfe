// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration tests for the `demo` and `view` subcommands.

use super::tests::{sdrlog, sdrlog_with_config, stdout, unique_shm_name};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Owner and forked workers all land in one store.
#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_demo_collects_worker_lines() {
    let output = sdrlog(&["demo", "--workers", "2", "--lines", "5"]);
    assert!(output.status.success(), "demo failed: {:?}", output);

    let out = stdout(&output);
    assert!(out.contains("owner line 4"));
    assert!(out.contains("worker 0 (pid "));
    assert!(out.contains("worker 1 (pid "));
    // startup line + 5 owner lines + 2 x 5 worker lines
    assert!(out.contains("store holds 16 lines, 0 not shown"), "{}", out);
}

/// A small store overflows and counts what it dropped.
#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_demo_overflow_counts_not_shown() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "{{ store_lines: 8, eviction: 'fifo' }}").unwrap();

    let output = sdrlog_with_config(&["demo", "--workers", "2", "--lines", "5"], config.path());
    assert!(output.status.success(), "demo failed: {:?}", output);
    assert!(stdout(&output).contains("store holds 8 lines, 8 not shown"));
}

#[test]
fn test_demo_rejects_invalid_config() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "{{ line_len: 1 }}").unwrap();

    let output = sdrlog_with_config(&["demo"], config.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line_len"));
}

/// An admin viewer attaches to a running owner's named store.
#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_view_named_store() {
    let name = unique_shm_name("view");
    let mut owner = Command::new(env!("CARGO_BIN_EXE_sdrlog"))
        .args(["demo", "--workers", "1", "--lines", "3", "--hold-secs", "5"])
        .args(["--name", &name])
        .stdout(Stdio::null())
        .spawn()
        .unwrap();

    // the store exists once the owner is up; the lines follow shortly after
    let deadline = Instant::now() + Duration::from_secs(4);
    let mut viewed = String::new();
    while Instant::now() < deadline {
        let output = sdrlog(&["view", "--name", &name]);
        if output.status.success() {
            viewed = stdout(&output);
            if viewed.contains("store holds") {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let _ = owner.kill();
    let _ = owner.wait();
    // SIGKILL skipped the owner's unlink
    let _ = nix::sys::mman::shm_unlink(name.as_str());

    assert!(viewed.contains("owner line 2"), "{}", viewed);
    assert!(viewed.contains("worker 0 (pid "));
    assert!(viewed.contains("-- "));
    assert!(viewed.contains(" not shown"));
}

#[test]
fn test_view_missing_store_fails() {
    let output = sdrlog(&["view", "--name", &unique_shm_name("absent")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("attaching to"));
}
