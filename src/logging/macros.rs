// SPDX-License-Identifier: Apache-2.0 OR MIT
// Call-site macros for the logger's printf family

/// Ordinary line: console and store
///
/// # Examples
/// ```ignore
/// log_reg!(logger, "rx{} tuned to {} kHz\n", chan, freq);
/// ```
#[macro_export]
macro_rules! log_reg {
    ($logger:expr, $($arg:tt)*) => {
        $logger.print(format_args!($($arg)*))
    };
}

/// Line that is also mirrored to syslog when daemonized
///
/// # Examples
/// ```ignore
/// log_l!(logger, "GPS fix: {} sats\n", sats);
/// ```
#[macro_export]
macro_rules! log_l {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(format_args!($($arg)*))
    };
}

/// Status text for admin and manufacturing pages
#[macro_export]
macro_rules! log_msg {
    ($logger:expr, $($arg:tt)*) => {
        $logger.message(format_args!($($arg)*))
    };
}

/// Status text that replaces what the pages currently show
#[macro_export]
macro_rules! log_msg_ff {
    ($logger:expr, $($arg:tt)*) => {
        $logger.message_ff(format_args!($($arg)*))
    };
}

/// Straight to the console, no prefix, no store
#[macro_export]
macro_rules! log_raw {
    ($logger:expr, $($arg:tt)*) => {
        $logger.raw(format_args!($($arg)*))
    };
}

/// Line logged on behalf of a connection
///
/// # Examples
/// ```ignore
/// log_conn!(logger, &conn, "client {} arrived\n", addr);
/// log_conn!(logger, &conn, log, "kicked: {}\n", reason);
/// ```
#[macro_export]
macro_rules! log_conn {
    ($logger:expr, $conn:expr, log, $($arg:tt)*) => {
        $logger.conn_log($conn, format_args!($($arg)*))
    };
    ($logger:expr, $conn:expr, $($arg:tt)*) => {
        $logger.conn_print($conn, format_args!($($arg)*))
    };
}

/// Line logged on behalf of whoever holds a receiver channel
#[macro_export]
macro_rules! log_chan {
    ($logger:expr, $chan:expr, log, $($arg:tt)*) => {
        $logger.chan_log($chan, format_args!($($arg)*))
    };
    ($logger:expr, $chan:expr, $($arg:tt)*) => {
        $logger.chan_print($chan, format_args!($($arg)*))
    };
}

/// Fatal application error; reports the call site and exits
///
/// # Examples
/// ```ignore
/// panic_fatal!(logger, "bad FPGA id {:#x}", id);
/// panic_fatal!(logger, dump, "heap corrupted");
/// ```
#[macro_export]
macro_rules! panic_fatal {
    ($logger:expr, dump, $($arg:tt)*) => {
        $logger.panic(&format!($($arg)*), true)
    };
    ($logger:expr, $($arg:tt)*) => {
        $logger.panic(&format!($($arg)*), false)
    };
}
