// SPDX-License-Identifier: Apache-2.0 OR MIT
// System logger sinks

use std::ffi::{CString, NulError};
use std::sync::{Arc, Mutex};

use super::{Severity, SyslogFacility};

/// Destination for mirrored lines and panic reports
pub trait SyslogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);

    /// Release the connection to the system logger
    fn close(&self) {}
}

/// `syslog(3)` via libc
pub struct SystemLog {
    // openlog keeps the pointer, so the ident lives as long as the sink
    _ident: CString,
}

impl SystemLog {
    pub fn open(ident: &str, facility: SyslogFacility) -> Result<Self, NulError> {
        let ident = CString::new(ident)?;
        unsafe {
            libc::openlog(ident.as_ptr(), libc::LOG_PID, facility.as_libc());
        }
        Ok(Self { _ident: ident })
    }
}

impl SyslogSink for SystemLog {
    fn log(&self, severity: Severity, message: &str) {
        let Ok(msg) = CString::new(message.replace('\0', "?")) else {
            return;
        };
        unsafe {
            libc::syslog(
                severity.as_priority(),
                b"%s\0".as_ptr() as *const libc::c_char,
                msg.as_ptr(),
            );
        }
    }

    fn close(&self) {
        unsafe {
            libc::closelog();
        }
    }
}

/// Discards everything (tools and tests that have no system logger)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSyslog;

impl SyslogSink for NullSyslog {
    fn log(&self, _severity: Severity, _message: &str) {}
}

/// Keeps every entry in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySyslog {
    entries: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MemorySyslog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }
}

impl SyslogSink for MemorySyslog {
    fn log(&self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((severity, message.to_string()));
    }
}
