// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger: per-process fan-out of finished lines to every sink

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::broadcast::StatusBroadcaster;
use super::console::Console;
use super::crash::CrashReporter;
use super::entry::{scrub_ascii, LogLine};
use super::events::EventSink;
use super::formatter::{Continuation, Emit};
use super::ringbuffer::LineStore;
use super::syslog::{NullSyslog, SyslogSink, SystemLog};
use super::timestamp::{uptime_stamp, wall_clock_stamp, SystemClock, TimeSource};
use super::{PrintfFlags, Severity};
use crate::channel::{busy_glyphs, channel_glyph, ChannelStatus, ChannelVector};
use crate::config::{ConfigError, LogConfig};
use crate::connection::{ConnectionRef, ConnectionRegistry, NoConnections};

/// Process run modes that decide where a line goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogModes {
    pub daemon: bool,
    pub log_foreground: bool,
    pub log_all: bool,
    pub retain_ordinary: bool,
}

impl LogModes {
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            daemon: config.daemon,
            log_foreground: config.log_foreground,
            log_all: config.log_all,
            retain_ordinary: config.retain_ordinary,
        }
    }

    /// Whether a routed line with `flags` is mirrored to syslog
    pub fn actually_log(&self, flags: PrintfFlags) -> bool {
        (flags.contains(PrintfFlags::LOG) && (self.daemon || self.log_foreground)) || self.log_all
    }

    /// Whether a routed line is kept in the shared store
    pub fn retains(&self, actually_log: bool) -> bool {
        self.retain_ordinary || !self.daemon || actually_log || self.log_all
    }
}

impl Default for LogModes {
    fn default() -> Self {
        Self::from_config(&LogConfig::default())
    }
}

/// Logging context for one process
///
/// Formats, prefixes and routes each line to console, syslog, the shared
/// store and status observers. Clones share every sink and the single
/// continuation buffer of the process.
#[derive(Clone)]
pub struct Logger {
    modes: LogModes,
    console: Console,
    syslog: Arc<dyn SyslogSink>,
    store: Option<Arc<LineStore>>,
    channels: Arc<dyn ChannelStatus>,
    broadcaster: StatusBroadcaster,
    events: Option<Arc<dyn EventSink>>,
    clock: Arc<dyn TimeSource>,
    continuation: Arc<Mutex<Continuation>>,
    crash: CrashReporter,
}

impl Logger {
    pub fn builder(config: LogConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    /// Format `args` and route the line once it is finished.
    ///
    /// RAW text goes straight to the console. Other text accumulates until a
    /// newline arrives (or MESSAGE is set, or scratch runs out); the flags
    /// and connection of the completing call decide the routing.
    pub fn emit(&self, flags: PrintfFlags, conn: Option<&ConnectionRef>, args: fmt::Arguments<'_>) {
        if flags.contains(PrintfFlags::RAW) {
            let mut text = String::new();
            let _ = text.write_fmt(args);
            self.console.write_raw(&text);
            return;
        }

        let emitted = self
            .continuation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .emit(flags, args);

        match emitted {
            Ok(Emit::Finished(line)) => self.route(flags, conn, &line),
            Ok(Emit::Pending) => {}
            Err(_) => self.crash.panic("log scratch allocation", false),
        }
    }

    /// Route a finished line
    pub fn route(&self, flags: PrintfFlags, conn: Option<&ConnectionRef>, line: &str) {
        let mut body = std::borrow::Cow::Borrowed(line);

        // an empty line is noise in the journal
        let blank_in_daemon = self.modes.daemon && line == "\n";
        if flags.is_routed() && !blank_in_daemon {
            body = scrub_ascii(line);
            let text = if body.ends_with('\n') {
                body.to_string()
            } else {
                format!("{}\n", body)
            };
            let entry = LogLine::new(
                wall_clock_stamp(self.clock.wall_clock()),
                self.prefix(flags, conn),
                text,
            );

            let actually_log = self.modes.actually_log(flags);
            if actually_log {
                self.syslog.log(Severity::Info, &entry.syslog_text());
            }

            let rendered = entry.render();
            self.console.write_line(&rendered);

            if let Some(events) = &self.events {
                events.event("printf", &entry.body);
            }

            if self.modes.retains(actually_log) {
                if let Some(store) = &self.store {
                    if let Err(e) = store.append(&rendered) {
                        self.crash.panic(&format!("log store: {}", e), false);
                    }
                }
            }
        }

        if flags.contains(PrintfFlags::MESSAGE) {
            self.broadcaster.broadcast(flags, &body);
        }
    }

    /// Uptime, channel glyphs and connection column
    pub fn prefix(&self, flags: PrintfFlags, conn: Option<&ConnectionRef>) -> String {
        let channels = self.channels.channel_count();
        let daemon = self.modes.daemon;
        let marker = if flags.contains(PrintfFlags::LOG) { 'L' } else { ' ' };

        let mut prefix = uptime_stamp(self.clock.uptime());
        prefix.push_str(&busy_glyphs(self.channels.as_ref()));
        prefix.push(' ');

        let highlight = conn.and_then(ConnectionRef::highlight_channel);
        match conn {
            Some(c) if highlight.is_none() => {
                let (tag, width) = if daemon {
                    (format!("[{:02}]", c.index), channels)
                } else {
                    (format!("[{:02}] {}", c.index, marker), channels + 2)
                };
                let _ = write!(prefix, "{:>width$}", tag, width = width);
            }
            _ => {
                for chan in 0..channels {
                    prefix.push(if highlight == Some(chan) {
                        channel_glyph(chan)
                    } else {
                        ' '
                    });
                }
                if !daemon {
                    prefix.push(' ');
                    prefix.push(marker);
                }
            }
        }

        prefix
    }

    pub fn print(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::REGULAR, None, args);
    }

    /// Mirrored to syslog when daemonized or logging in the foreground
    pub fn log(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::LOG, None, args);
    }

    pub fn conn_print(&self, conn: &ConnectionRef, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::REGULAR, Some(conn), args);
    }

    pub fn conn_log(&self, conn: &ConnectionRef, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::LOG, Some(conn), args);
    }

    /// On behalf of whichever connection holds receiver channel `chan`
    pub fn chan_print(&self, chan: usize, args: fmt::Arguments<'_>) {
        let conn = self.broadcaster.registry().for_channel(chan);
        self.emit(PrintfFlags::REGULAR, conn.as_ref(), args);
    }

    pub fn chan_log(&self, chan: usize, args: fmt::Arguments<'_>) {
        let conn = self.broadcaster.registry().for_channel(chan);
        self.emit(PrintfFlags::LOG, conn.as_ref(), args);
    }

    /// Status text for admin pages only
    pub fn message(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::MESSAGE, None, args);
    }

    /// Status text replacing what the admin pages show
    pub fn message_ff(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::MESSAGE | PrintfFlags::FORM_FEED, None, args);
    }

    pub fn message_log(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::MESSAGE | PrintfFlags::LOG, None, args);
    }

    pub fn message_log_ff(&self, args: fmt::Arguments<'_>) {
        self.emit(
            PrintfFlags::MESSAGE | PrintfFlags::LOG | PrintfFlags::FORM_FEED,
            None,
            args,
        );
    }

    pub fn raw(&self, args: fmt::Arguments<'_>) {
        self.emit(PrintfFlags::RAW, None, args);
    }

    #[track_caller]
    pub fn panic(&self, text: &str, dump: bool) -> ! {
        self.crash.panic(text, dump)
    }

    #[track_caller]
    pub fn sys_panic(&self, text: &str) -> ! {
        self.crash.sys_panic(text)
    }

    pub fn crash_reporter(&self) -> &CrashReporter {
        &self.crash
    }

    pub fn modes(&self) -> LogModes {
        self.modes
    }

    pub fn store(&self) -> Option<&Arc<LineStore>> {
        self.store.as_ref()
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Text held back waiting for a newline
    pub fn pending(&self) -> String {
        self.continuation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending_text()
            .to_string()
    }

    pub fn flush(&self) {
        self.console.flush();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("modes", &self.modes)
            .field("store", &self.store)
            .field("channels", &self.channels.channel_count())
            .finish()
    }
}

/// Assembles a [`Logger`]; unset collaborators get process defaults
pub struct LoggerBuilder {
    config: LogConfig,
    console: Option<Console>,
    syslog: Option<Arc<dyn SyslogSink>>,
    store: Option<Arc<LineStore>>,
    channels: Option<Arc<dyn ChannelStatus>>,
    registry: Option<Arc<dyn ConnectionRegistry>>,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn TimeSource>>,
}

impl LoggerBuilder {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            console: None,
            syslog: None,
            store: None,
            channels: None,
            registry: None,
            events: None,
            clock: None,
        }
    }

    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    pub fn syslog(mut self, syslog: Arc<dyn SyslogSink>) -> Self {
        self.syslog = Some(syslog);
        self
    }

    pub fn store(mut self, store: Arc<LineStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn channels(mut self, channels: Arc<dyn ChannelStatus>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ConnectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Count uptime from `started` (a forked worker passes the owner's start)
    pub fn started_at(self, started: Instant) -> Self {
        self.clock(Arc::new(SystemClock::started_at(started)))
    }

    pub fn build(self) -> Result<Logger, ConfigError> {
        self.config.validate()?;
        let modes = LogModes::from_config(&self.config);

        let syslog: Arc<dyn SyslogSink> = match self.syslog {
            Some(syslog) => syslog,
            None if modes.daemon || modes.log_foreground || modes.log_all => Arc::new(
                SystemLog::open(&self.config.syslog_ident, self.config.syslog_facility).map_err(
                    |e| ConfigError::InvalidValue {
                        field: "syslog_ident",
                        reason: e.to_string(),
                    },
                )?,
            ),
            None => Arc::new(NullSyslog),
        };
        let console = self.console.unwrap_or_else(Console::stdout);
        let registry = self.registry.unwrap_or_else(|| Arc::new(NoConnections));

        let mut crash = CrashReporter::new(console.clone(), Arc::clone(&syslog))
            .mirror_to_syslog(self.config.mirrors_to_syslog())
            .backtrace_depth(self.config.backtrace_depth)
            .exit_pause(Duration::from_millis(self.config.exit_pause_ms));
        if let Some(events) = &self.events {
            crash = crash.with_events(Arc::clone(events));
        }

        Ok(Logger {
            modes,
            console,
            syslog,
            store: self.store,
            channels: self
                .channels
                .unwrap_or_else(|| Arc::new(ChannelVector::new(0))),
            broadcaster: StatusBroadcaster::new(registry),
            events: self.events,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock::new())),
            continuation: Arc::new(Mutex::new(Continuation::new(self.config.scratch_len))),
            crash,
        })
    }
}
