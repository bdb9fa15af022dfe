// SPDX-License-Identifier: Apache-2.0 OR MIT
use anyhow::{bail, Context, Result};
use clap::Parser;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use sdrlog::logging::{check_syscall, Console};
use sdrlog::{log_l, log_reg, panic_fatal};
use sdrlog::{ChannelVector, LineStore, LogConfig, Logger, OwnerLogging};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug, PartialEq)]
enum Command {
    /// Run an owner process that forks workers, all logging into one store
    Demo {
        /// Worker processes to fork
        #[arg(long, default_value_t = 2)]
        workers: usize,
        /// Lines logged by the owner and by each worker
        #[arg(long, default_value_t = 10)]
        lines: usize,
        /// Receiver channels shown in the line prefix
        #[arg(long, default_value_t = 4)]
        channels: usize,
        /// Put the store in named shared memory (e.g. /sdrlog) for `view`
        #[arg(long)]
        name: Option<String>,
        /// Keep the store alive this long after the workers finish
        #[arg(long, default_value_t = 0)]
        hold_secs: u64,
        /// JSON5 logging configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the lines held in a named store
    View {
        #[arg(long)]
        name: String,
    },
    /// Exercise the fatal error path
    Crash {
        /// Abort for a core file instead of exiting
        #[arg(long)]
        dump: bool,
        /// Report a failed system call
        #[arg(long)]
        sys: bool,
        /// Pause before exit, in milliseconds
        #[arg(long)]
        exit_pause_ms: Option<u64>,
    },
}

fn load_config(path: Option<&Path>) -> Result<LogConfig> {
    let config = match path {
        Some(path) => LogConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LogConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Demo {
            workers,
            lines,
            channels,
            name,
            hold_secs,
            config,
        } => demo(
            load_config(config.as_deref())?,
            workers,
            lines,
            channels,
            name.as_deref(),
            hold_secs,
        ),
        Command::View { name } => view(&name),
        Command::Crash {
            dump,
            sys,
            exit_pause_ms,
        } => crash(dump, sys, exit_pause_ms),
    }
}

fn demo(
    config: LogConfig,
    workers: usize,
    lines: usize,
    channels: usize,
    name: Option<&str>,
    hold_secs: u64,
) -> Result<()> {
    let owner = match name {
        Some(name) => OwnerLogging::named(name, config),
        None => OwnerLogging::anonymous(config),
    }
    .context("creating the line store")?;

    let busy = Arc::new(ChannelVector::new(channels));
    let logger = owner
        .logger()
        .console(Console::stdout())
        .channels(busy.clone())
        .build()?;

    log_l!(
        logger,
        "owner {} started: {} workers, store of {} lines\n",
        std::process::id(),
        workers,
        owner.store().capacity()
    );
    logger.flush();

    let mut children = Vec::with_capacity(workers);
    for worker in 0..workers {
        // SAFETY: single-threaded here; the child only logs and calls _exit
        match unsafe { fork() }.context("fork")? {
            ForkResult::Child => {
                let status = match run_worker(&owner, worker, lines, channels) {
                    Ok(()) => 0,
                    Err(_) => 1,
                };
                // skip destructors: the owner's copy of the store must survive
                unsafe { libc::_exit(status) };
            }
            ForkResult::Parent { child } => children.push(child),
        }
    }

    for i in 0..lines {
        busy.set_busy(i % channels.max(1), true);
        log_reg!(logger, "owner line {}\n", i);
        busy.set_busy(i % channels.max(1), false);
    }

    let failed = reap(&logger, &children);
    let snap = owner.store().read_all()?;
    log_l!(
        logger,
        "store holds {} lines, {} not shown\n",
        snap.lines.len(),
        snap.not_shown
    );

    if hold_secs > 0 {
        log_reg!(logger, "holding the store for {}s\n", hold_secs);
        std::thread::sleep(Duration::from_secs(hold_secs));
    }
    logger.flush();

    if failed > 0 {
        bail!("{} worker(s) failed", failed);
    }
    Ok(())
}

fn run_worker(owner: &OwnerLogging, worker: usize, lines: usize, channels: usize) -> Result<()> {
    let busy = Arc::new(ChannelVector::new(channels));
    if channels > 0 {
        busy.set_busy(worker % channels, true);
    }
    let logger = owner.logger().console(Console::stdout()).channels(busy).build()?;

    for i in 0..lines {
        log_reg!(logger, "worker {} (pid {}) line {}\n", worker, std::process::id(), i);
    }
    logger.flush();
    Ok(())
}

fn reap(logger: &Logger, children: &[Pid]) -> usize {
    let mut failed = 0;
    for &child in children {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => {}
            Ok(status) => {
                log_l!(logger, "worker {} ended: {:?}\n", child, status);
                failed += 1;
            }
            Err(e) => {
                log_l!(logger, "waitpid {}: {}\n", child, e);
                failed += 1;
            }
        }
    }
    failed
}

fn view(name: &str) -> Result<()> {
    let store = LineStore::attach(name).with_context(|| format!("attaching to {}", name))?;
    let snap = store.read_all()?;
    for line in &snap.lines {
        print!("{}", line);
    }
    println!("-- {} lines, {} not shown", snap.lines.len(), snap.not_shown);
    Ok(())
}

fn crash(dump: bool, sys: bool, exit_pause_ms: Option<u64>) -> Result<()> {
    let mut config = LogConfig::default();
    if let Some(ms) = exit_pause_ms {
        config.exit_pause_ms = ms;
    }
    let logger = Logger::builder(config).console(Console::stdout()).build()?;
    log_reg!(logger, "crash requested (dump={}, sys={})\n", dump, sys);

    if sys {
        // EBADF
        let rc = unsafe { libc::close(-1) };
        check_syscall(logger.crash_reporter(), "close", rc);
    }
    if dump {
        panic_fatal!(logger, dump, "requested core dump");
    }
    panic_fatal!(logger, "requested crash")
}
