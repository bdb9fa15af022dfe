// SPDX-License-Identifier: Apache-2.0 OR MIT
// Console output shared by the logger and the crash reporter

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

struct ConsoleInner {
    out: Box<dyn Write + Send>,
    /// Last raw write left the cursor mid-line
    owed_newline: bool,
}

/// Operator console stream
///
/// Clones share the same stream, so raw output, routed lines and panic
/// reports stay in order. Write errors are ignored: a closed console must not
/// take the server down.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<ConsoleInner>>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConsoleInner {
                out,
                owed_newline: false,
            })),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleInner> {
        // a panic while printing must not silence the crash report
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Passthrough write. Unterminated text leaves a newline owed to the next line.
    pub fn write_raw(&self, text: &str) {
        let mut inner = self.lock();
        let _ = inner.out.write_all(text.as_bytes());
        if !text.is_empty() {
            inner.owed_newline = !text.ends_with('\n');
        }
    }

    /// Write a finished line, first settling any newline owed by raw output
    pub fn write_line(&self, line: &str) {
        let mut inner = self.lock();
        if inner.owed_newline {
            let _ = inner.out.write_all(b"\n");
            inner.owed_newline = false;
        }
        let _ = inner.out.write_all(line.as_bytes());
    }

    pub fn owes_newline(&self) -> bool {
        self.lock().owed_newline
    }

    pub fn flush(&self) {
        let _ = self.lock().out.flush();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("owed_newline", &self.owes_newline())
            .finish()
    }
}

/// In-memory console target, cloneable so tests can read what was written
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
