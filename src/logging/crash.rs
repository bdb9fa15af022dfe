// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Fatal error reporting.
//!
//! A panic report is one message line, mirrored to syslog when the process
//! runs daemonized or logs in the foreground, followed by a bounded symbolic
//! backtrace, one line per frame. The process then either aborts (so a core
//! file is written) or shuts down in order and exits with
//! [`PANIC_EXIT_STATUS`].

use std::io;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use super::console::Console;
use super::events::EventSink;
use super::syslog::SyslogSink;
use super::Severity;
use crate::config::{DEFAULT_BACKTRACE_DEPTH, DEFAULT_EXIT_PAUSE_MS};

/// Exit status of an orderly shutdown after a panic
pub const PANIC_EXIT_STATUS: i32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicKind {
    /// Application panic with orderly shutdown
    Panic,
    /// Application panic ending in `abort()` for a core file
    Dump,
    /// Failed system call; the OS error text is appended
    SysPanic,
}

impl PanicKind {
    pub fn tag(self) -> &'static str {
        match self {
            PanicKind::Panic => "PANIC",
            PanicKind::Dump => "DUMP",
            PanicKind::SysPanic => "SYS_PANIC",
        }
    }

    /// Prefix on the backtrace lines
    pub fn backtrace_id(self) -> &'static str {
        match self {
            PanicKind::Panic | PanicKind::Dump => "panic",
            PanicKind::SysPanic => "sys_panic",
        }
    }
}

/// `TAG: "text" (file, line N)`, plus the OS error for a system-call panic
pub fn panic_message(
    kind: PanicKind,
    text: &str,
    location: &Location<'_>,
    os_error: Option<&io::Error>,
) -> String {
    let mut msg = format!(
        "{}: \"{}\" ({}, line {})",
        kind.tag(),
        text,
        location.file(),
        location.line()
    );
    if let Some(err) = os_error {
        msg.push(' ');
        msg.push_str(&err.to_string());
    }
    msg
}

/// Up to `depth` frames of the current stack, innermost first
pub fn capture_backtrace(depth: usize) -> Vec<(usize, String)> {
    let mut frames = Vec::with_capacity(depth);

    backtrace::trace(|frame| {
        let ip = frame.ip() as usize;
        let mut name = None;
        backtrace::resolve_frame(frame, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
        });
        frames.push((ip, name.unwrap_or_else(|| "??".to_string())));
        frames.len() < depth
    });

    frames
}

/// Emits panic reports and terminates the process
#[derive(Clone)]
pub struct CrashReporter {
    console: Console,
    syslog: Arc<dyn SyslogSink>,
    events: Option<Arc<dyn EventSink>>,
    mirror_to_syslog: bool,
    backtrace_depth: usize,
    exit_pause: Duration,
}

impl CrashReporter {
    pub fn new(console: Console, syslog: Arc<dyn SyslogSink>) -> Self {
        Self {
            console,
            syslog,
            events: None,
            mirror_to_syslog: false,
            backtrace_depth: DEFAULT_BACKTRACE_DEPTH,
            exit_pause: Duration::from_millis(DEFAULT_EXIT_PAUSE_MS),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Mirror reports to syslog (daemon or foreground-log mode)
    pub fn mirror_to_syslog(mut self, mirror: bool) -> Self {
        self.mirror_to_syslog = mirror;
        self
    }

    pub fn backtrace_depth(mut self, depth: usize) -> Self {
        self.backtrace_depth = depth.max(1);
        self
    }

    /// Pause before exit so the syslog daemon records the report
    pub fn exit_pause(mut self, pause: Duration) -> Self {
        self.exit_pause = pause;
        self
    }

    fn emit(&self, line: &str) {
        if self.mirror_to_syslog {
            self.syslog.log(Severity::Error, line);
        }
        self.console.write_line(&format!("{}\n", line));
    }

    /// Write the message line and the backtrace without terminating.
    /// Returns the message line.
    pub fn report(
        &self,
        kind: PanicKind,
        text: &str,
        location: &Location<'_>,
        os_error: Option<&io::Error>,
    ) -> String {
        let msg = panic_message(kind, text, location, os_error);
        self.emit(&msg);
        self.backtrace(kind.backtrace_id());
        msg
    }

    /// One `"{id}: backtrace {i} {ip} {symbol}"` line per frame
    pub fn backtrace(&self, id: &str) {
        for (i, (ip, name)) in capture_backtrace(self.backtrace_depth)
            .into_iter()
            .enumerate()
        {
            self.emit(&format!("{}: backtrace {} {:#x} {}", id, i, ip, name));
        }
    }

    /// Application panic. With `dump` the process aborts to leave a core file.
    #[track_caller]
    pub fn panic(&self, text: &str, dump: bool) -> ! {
        self.panic_at(text, dump, Location::caller())
    }

    pub fn panic_at(&self, text: &str, dump: bool, location: &Location<'_>) -> ! {
        if let Some(events) = &self.events {
            events.event("panic", "dump");
        }
        let kind = if dump { PanicKind::Dump } else { PanicKind::Panic };
        self.report(kind, text, location, None);

        if dump {
            self.console.flush();
            std::process::abort();
        }
        self.exit(PANIC_EXIT_STATUS)
    }

    /// Panic after a failed system call; reports the last OS error
    #[track_caller]
    pub fn sys_panic(&self, text: &str) -> ! {
        // before anything else can overwrite errno
        let err = io::Error::last_os_error();
        self.sys_panic_at(text, &err, Location::caller())
    }

    pub fn sys_panic_at(&self, text: &str, err: &io::Error, location: &Location<'_>) -> ! {
        self.report(PanicKind::SysPanic, text, location, Some(err));
        self.exit(PANIC_EXIT_STATUS)
    }

    /// Orderly termination: flush console, pause, close syslog, exit
    pub fn exit(&self, status: i32) -> ! {
        self.console.flush();
        std::thread::sleep(self.exit_pause);
        self.syslog.close();
        std::process::exit(status)
    }
}

impl std::fmt::Debug for CrashReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashReporter")
            .field("mirror_to_syslog", &self.mirror_to_syslog)
            .field("backtrace_depth", &self.backtrace_depth)
            .field("exit_pause", &self.exit_pause)
            .finish()
    }
}

/// Pass `rc` through, or take the sys-panic path when it is negative
#[track_caller]
pub fn check_syscall<T>(reporter: &CrashReporter, what: &str, rc: T) -> T
where
    T: Into<i64> + Copy,
{
    if rc.into() < 0 {
        reporter.sys_panic(what);
    }
    rc
}

/// Pass `rc` through, or take the sys-panic path when it is zero
#[track_caller]
pub fn check_nonzero<T>(reporter: &CrashReporter, what: &str, rc: T) -> T
where
    T: Into<i64> + Copy,
{
    if rc.into() == 0 {
        reporter.sys_panic(what);
    }
    rc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::console::CaptureBuffer;
    use crate::logging::syslog::MemorySyslog;

    fn reporter(mirror: bool) -> (CrashReporter, CaptureBuffer, MemorySyslog) {
        let capture = CaptureBuffer::new();
        let syslog = MemorySyslog::new();
        let reporter = CrashReporter::new(
            Console::new(Box::new(capture.clone())),
            Arc::new(syslog.clone()),
        )
        .mirror_to_syslog(mirror)
        .backtrace_depth(5);
        (reporter, capture, syslog)
    }

    #[test]
    fn test_panic_message_format() {
        let loc = Location::caller();
        let msg = panic_message(PanicKind::Panic, "bad state", loc, None);
        assert_eq!(
            msg,
            format!("PANIC: \"bad state\" ({}, line {})", loc.file(), loc.line())
        );
        assert!(panic_message(PanicKind::Dump, "x", loc, None).starts_with("DUMP: \"x\""));
    }

    #[test]
    fn test_sys_panic_message_appends_os_error() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        let msg = panic_message(PanicKind::SysPanic, "open", Location::caller(), Some(&err));
        assert!(msg.starts_with("SYS_PANIC: \"open\" ("));
        assert!(msg.ends_with(&err.to_string()));
    }

    #[test]
    fn test_report_console_only_in_foreground() {
        let (reporter, capture, syslog) = reporter(false);
        reporter.report(PanicKind::Panic, "lost sync", Location::caller(), None);

        let lines = capture.lines();
        assert!(lines[0].starts_with("PANIC: \"lost sync\" ("));
        assert!(lines[0].contains("crash.rs"));
        assert!(lines.iter().any(|l| l.starts_with("panic: backtrace 0 0x")));
        assert!(lines.len() <= 1 + 5);
        assert!(syslog.entries().is_empty());
    }

    #[test]
    fn test_report_mirrors_to_syslog_at_error() {
        let (reporter, capture, syslog) = reporter(true);
        let err = io::Error::from_raw_os_error(libc::EBADF);
        reporter.report(PanicKind::SysPanic, "read", Location::caller(), Some(&err));

        let entries = syslog.entries();
        assert!(entries.iter().all(|(sev, _)| *sev == Severity::Error));
        assert!(entries[0].1.starts_with("SYS_PANIC: \"read\""));
        assert!(entries
            .iter()
            .skip(1)
            .all(|(_, m)| m.starts_with("sys_panic: backtrace ")));
        assert_eq!(entries.len(), capture.lines().len());
    }

    #[test]
    fn test_capture_backtrace_bounded() {
        let frames = capture_backtrace(3);
        assert!(!frames.is_empty());
        assert!(frames.len() <= 3);
    }

    #[test]
    fn test_check_syscall_passes_success() {
        let (reporter, capture, _) = reporter(false);
        assert_eq!(check_syscall(&reporter, "close", 0i32), 0);
        assert_eq!(check_syscall(&reporter, "read", 42i64), 42);
        assert_eq!(check_nonzero(&reporter, "mmap", 1u32), 1);
        assert!(capture.contents().is_empty());
    }
}
