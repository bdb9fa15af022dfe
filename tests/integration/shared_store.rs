// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Concurrent appends to one store from several forked processes.
//!
//! Children only call `LineStore::append` on prebuilt text and leave with
//! `_exit`, so nothing in them allocates or runs destructors after fork.

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use sdrlog::logging::{Eviction, LineStore};

fn run_writers(store: &LineStore, writers: usize, per_writer: usize) {
    let batches: Vec<Vec<String>> = (0..writers)
        .map(|w| (0..per_writer).map(|i| format!("w{} {}\n", w, i)).collect())
        .collect();

    let mut children = Vec::new();
    for batch in &batches {
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let mut status = 0;
                for line in batch {
                    if store.append(line).is_err() {
                        status = 1;
                    }
                }
                unsafe { libc::_exit(status) };
            }
            ForkResult::Parent { child } => children.push(child),
        }
    }

    for child in children {
        assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
    }
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_no_lost_updates_across_processes() {
    let store = LineStore::create_anonymous(4096, 32, Eviction::HalfRotation).unwrap();
    run_writers(&store, 4, 500);

    let snap = store.read_all().unwrap();
    assert_eq!(store.write_index(), 2000);
    assert_eq!(snap.not_shown, 0);
    assert_eq!(snap.lines.len(), 2000);

    // each writer's lines are all present and in its own order
    for w in 0..4 {
        let prefix = format!("w{} ", w);
        let seen: Vec<usize> = snap
            .lines
            .iter()
            .filter_map(|l| l.strip_prefix(&prefix))
            .map(|n| n.trim_end().parse().unwrap())
            .collect();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }
}

#[test]
#[cfg_attr(tarpaulin, ignore)]
fn test_overflow_counted_across_processes() {
    let store = LineStore::create_anonymous(64, 32, Eviction::HalfRotation).unwrap();
    run_writers(&store, 4, 100);

    let snap = store.read_all().unwrap();
    assert_eq!(snap.lines.len(), 64);
    assert_eq!(snap.not_shown, 400 - 64);
    assert!(snap
        .lines
        .iter()
        .all(|l| l.starts_with('w') && l.ends_with('\n')));
}
