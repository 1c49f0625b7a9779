//! Bounded poll for an expected response.
//!
//! `poll_until` is the polling loop itself; `bounded_read_until` runs it on
//! a worker thread and watches it from the caller. The worker reports every
//! completed unit, so the caller only gives up on a worker that has stopped
//! making progress, never on one that is merely slower than nominal. The
//! worker borrows the transport mutably, so a second poll on the same
//! session cannot start while one is outstanding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::traits::{ElmTransport, TransportError};
use crate::clock::Clock;

/// Longest a single poll unit may overrun `unit` before the worker is
/// considered stalled. Covers read latency of a real port.
pub const STALL_SLACK: Duration = Duration::from_millis(250);

/// Hard ceiling on a whole poll, as a multiple of its nominal length.
pub const CEILING_FACTOR: u32 = 4;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("no matching response after {units} poll units")]
    Timeout { units: u32 },

    #[error("poll cancelled after {units} poll units")]
    Cancelled { units: u32 },

    /// The worker stopped making progress, or overran the hard ceiling,
    /// after `polled` completed units.
    #[error("poll deadline exceeded after {polled} completed poll units")]
    DeadlineExceeded { polled: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Shared flag that stops an outstanding poll at its next unit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read once per `unit` until the cleaned response equals `expected`.
///
/// Returns the number of elapsed units on a match. Fails with
/// `PollError::Timeout` once `timeout_units` units have elapsed without
/// one; the read at the final unit still counts.
pub fn poll_until<T, C>(
    transport: &mut T,
    clock: &C,
    expected: &str,
    timeout_units: u32,
    unit: Duration,
    cancel: &CancelToken,
) -> Result<u32, PollError>
where
    T: ElmTransport + ?Sized,
    C: Clock + ?Sized,
{
    poll_loop(transport, clock, expected, timeout_units, unit, cancel, &mut |_| {})
}

fn poll_loop<T, C>(
    transport: &mut T,
    clock: &C,
    expected: &str,
    timeout_units: u32,
    unit: Duration,
    cancel: &CancelToken,
    on_unit: &mut dyn FnMut(u32),
) -> Result<u32, PollError>
where
    T: ElmTransport + ?Sized,
    C: Clock + ?Sized,
{
    let mut elapsed = 0u32;
    loop {
        let response = transport.read_string()?;
        if response == expected {
            debug!(elapsed_units = elapsed, "Expected response received");
            return Ok(elapsed);
        }
        if elapsed >= timeout_units {
            return Err(PollError::Timeout {
                units: timeout_units,
            });
        }
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { units: elapsed });
        }
        clock.sleep(unit);
        elapsed += 1;
        on_unit(elapsed);
    }
}

enum Progress {
    Unit(u32),
    Done(Result<u32, PollError>),
}

/// Run `poll_until` on a worker under a deadline.
///
/// The call fails with `DeadlineExceeded { polled }` if any single unit
/// takes longer than `unit + STALL_SLACK`, or if the whole poll runs past
/// `CEILING_FACTOR` times its nominal length. The worker is then
/// cancelled and joined before returning. A worker that keeps making
/// progress always runs its full `timeout_units`. The receive buffer is
/// left in whatever state the last read produced.
pub fn bounded_read_until<T, C>(
    transport: &mut T,
    clock: &C,
    expected: &str,
    timeout_units: u32,
    unit: Duration,
) -> Result<u32, PollError>
where
    T: ElmTransport,
    C: Clock,
{
    let cancel = CancelToken::new();
    let stall_limit = unit + STALL_SLACK;
    let ceiling = unit
        .saturating_mul(timeout_units)
        .saturating_mul(CEILING_FACTOR)
        + STALL_SLACK;
    let started = Instant::now();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let worker_cancel = cancel.clone();
        s.spawn(move || {
            let progress = tx.clone();
            let result = poll_loop(
                transport,
                clock,
                expected,
                timeout_units,
                unit,
                &worker_cancel,
                &mut |n| {
                    let _ = progress.send(Progress::Unit(n));
                },
            );
            // The receiver is gone only if the caller already gave up.
            let _ = tx.send(Progress::Done(result));
        });

        let mut polled = 0u32;
        loop {
            let remaining = ceiling.saturating_sub(started.elapsed());
            let wait = stall_limit.min(remaining);
            match rx.recv_timeout(wait) {
                Ok(Progress::Unit(n)) => polled = n,
                Ok(Progress::Done(result)) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(polled, ?stall_limit, ?ceiling, "Poll worker missed its deadline");
                    cancel.cancel();
                    return Err(PollError::DeadlineExceeded { polled });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PollError::Transport(TransportError::ReadFailed(
                        "poll worker exited without a result".into(),
                    )));
                }
            }
        }
    })
}
