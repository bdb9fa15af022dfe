// Logging subsystem: line formatting, fan-out and the shared line store
//
// Every process builds one Logger. Finished lines go to the console, to
// syslog when mirrored, to the LineStore shared by the owner and its workers,
// and to status observers when flagged as messages.

mod broadcast;
mod console;
mod crash;
mod entry;
mod events;
mod facility;
mod flags;
mod formatter;
mod futex;
pub mod integration;
mod logger;
#[macro_use]
mod macros;
mod ringbuffer;
mod severity;
mod shm;
mod syslog;
mod timestamp;

// Public exports
pub use broadcast::{
    broadcast_to, status_payload, StatusBroadcaster, REPLACE_MARKER, STATUS_FIELD,
    STATUS_MSG_TYPE,
};
pub use console::{CaptureBuffer, Console};
pub use crash::{
    capture_backtrace, check_nonzero, check_syscall, panic_message, CrashReporter, PanicKind,
    PANIC_EXIT_STATUS,
};
pub use entry::{decode_slot, encode_slot, scrub_ascii, LogLine, DEFAULT_LINE_LEN};
pub use events::{EventLog, EventSink};
pub use facility::SyslogFacility;
pub use flags::PrintfFlags;
pub use formatter::{Continuation, Emit, DEFAULT_SCRATCH_LEN};
pub use futex::{FutexGuard, FutexLock};
pub use integration::{OwnerLogging, WorkerLogging};
pub use logger::{LogModes, Logger, LoggerBuilder};
pub use ringbuffer::{Eviction, LineStore, StoreSnapshot};
pub use severity::Severity;
pub use shm::SharedRegion;
pub use syslog::{MemorySyslog, NullSyslog, SyslogSink, SystemLog};
pub use timestamp::{uptime_stamp, wall_clock_stamp, SystemClock, TimeSource};
