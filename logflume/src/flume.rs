// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One flume: the read/parse/send pipeline with its two queues and three
//! stage threads, supervised by the calling thread.
//!
//! Stages cooperate through a shared quit flag checked at the top of every
//! loop. Queue gets obey 100 ms timeouts, so shutdown latency is bounded by
//! one queue timeout plus at most one in-flight socket write.

use crate::parser::Parser;
use crate::reader::{ReadError, Reader};
use crate::sender::Sender;
use anyhow::Context;
use logflume_core::cirq::Cirq;
use logflume_core::record::{Event, LogLine};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Slots per queue.
pub const CIRQ_SIZE: usize = 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const RETRY_SLEEP: Duration = Duration::from_millis(100);
const GET_TIMEOUT: Duration = Duration::from_millis(100);

/// The three configured components of one pipeline instance.
pub struct Flume {
    pub reader: Box<dyn Reader>,
    pub parser: Box<dyn Parser>,
    pub sender: Box<dyn Sender>,
}

fn reader_main(mut ctx: Box<dyn Reader>, lines: Arc<Cirq<LogLine>>, quit: Arc<AtomicBool>) {
    while !quit.load(Ordering::Relaxed) {
        match ctx.read() {
            Ok(line) => {
                if let Some(displaced) = lines.put(line) {
                    drop(displaced);
                }
            }
            Err(ReadError::TryAgain) => thread::sleep(RETRY_SLEEP),
            // the source already warned; resync on the next line
            Err(ReadError::LineTooLong) => {}
            Err(ReadError::Fatal(e)) => {
                error!("reader failed: {e:#}");
                break;
            }
        }
    }
    debug!("reader got signal to quit");
}

fn parser_main(
    ctx: Box<dyn Parser>,
    lines: Arc<Cirq<LogLine>>,
    events: Arc<Cirq<Event>>,
    quit: Arc<AtomicBool>,
) {
    while !quit.load(Ordering::Relaxed) {
        let Some(line) = lines.get(GET_TIMEOUT) else {
            continue;
        };
        if let Some(event) = ctx.parse(&line) {
            if let Some(displaced) = events.put(event) {
                drop(displaced);
            }
        }
        drop(line);
    }
    debug!("parser got signal to quit");
}

fn sender_main(mut ctx: Box<dyn Sender>, events: Arc<Cirq<Event>>, quit: Arc<AtomicBool>) {
    while !quit.load(Ordering::Relaxed) {
        let Some(event) = events.get(GET_TIMEOUT) else {
            continue;
        };
        if let Err(e) = ctx.send(&event) {
            debug!("event lost: {e}");
        }
        drop(event);
    }
    debug!("sender got signal to quit");
}

fn emit_stats(lines: &Cirq<LogLine>, events: &Cirq<Event>, clear: bool) {
    let l = lines.stat(clear);
    let e = events.stat(clear);
    info!(
        "line cirq: {} puts, {} gets, {} drops; event cirq: {} puts, {} gets, {} drops",
        l.puts, l.gets, l.drops, e.puts, e.gets, e.drops
    );
}

/// Runs one flume to completion: installs signal dispositions, starts the
/// stages, supervises, and joins everything on shutdown.
pub fn run(flume: Flume) -> anyhow::Result<()> {
    // a dying collector must surface as a write error, not a signal
    // SAFETY: SigIgn installs no handler code, only a disposition.
    unsafe {
        use nix::sys::signal::{signal, SigHandler, Signal};
        signal(Signal::SIGPIPE, SigHandler::SigIgn).context("ignoring SIGPIPE")?;
    }
    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term)).context("installing SIGINT")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term)).context("installing SIGTERM")?;
    let usr1 = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGUSR1, Arc::clone(&usr1)).context("installing SIGUSR1")?;
    let usr2 = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGUSR2, Arc::clone(&usr2)).context("installing SIGUSR2")?;

    let lines = Arc::new(Cirq::with_capacity(CIRQ_SIZE).context("creating line cirq")?);
    let events = Arc::new(Cirq::with_capacity(CIRQ_SIZE).context("creating event cirq")?);
    let quit = Arc::new(AtomicBool::new(false));

    let reader_thread = thread::Builder::new()
        .name("reader".to_owned())
        .spawn({
            let lines = Arc::clone(&lines);
            let quit = Arc::clone(&quit);
            let ctx = flume.reader;
            move || reader_main(ctx, lines, quit)
        })
        .context("starting reader thread")?;
    let parser_thread = thread::Builder::new()
        .name("parser".to_owned())
        .spawn({
            let lines = Arc::clone(&lines);
            let events = Arc::clone(&events);
            let quit = Arc::clone(&quit);
            let ctx = flume.parser;
            move || parser_main(ctx, lines, events, quit)
        })
        .context("starting parser thread")?;
    let sender_thread = thread::Builder::new()
        .name("sender".to_owned())
        .spawn({
            let events = Arc::clone(&events);
            let quit = Arc::clone(&quit);
            let ctx = flume.sender;
            move || sender_main(ctx, events, quit)
        })
        .context("starting sender thread")?;

    loop {
        thread::sleep(POLL_INTERVAL);
        if usr1.swap(false, Ordering::Relaxed) {
            emit_stats(&lines, &events, false);
        }
        if usr2.swap(false, Ordering::Relaxed) {
            emit_stats(&lines, &events, true);
        }
        if term.swap(false, Ordering::Relaxed) {
            quit.store(true, Ordering::Relaxed);
        }
        if quit.load(Ordering::Relaxed) {
            emit_stats(&lines, &events, false);
            break;
        }
    }

    for (name, handle) in [
        ("reader", reader_thread),
        ("parser", parser_thread),
        ("sender", sender_thread),
    ] {
        if handle.join().is_err() {
            error!("{name} thread panicked");
        }
    }
    Ok(())
}
