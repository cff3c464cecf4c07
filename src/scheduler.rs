//! Fixed-cadence ticker and shutdown signal.
//!
//! ```text
//!  start          t0+i          t0+2i         t0+3i
//!    │ iteration ──┤  wait        │             │
//!    │             │ iteration ───┼─────────────┤ (overrun: t0+2i skipped)
//!    ▼             ▼              ▼             ▼
//! ```
//!
//! Ticks sit on a fixed grid anchored at start.  An iteration that ends
//! past its deadline is an [`Overrun`]; the ticks it covered are skipped,
//! never replayed.  The inter-tick wait races the [`Shutdown`] signal, so a
//! shutdown request wakes the loop immediately.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

// ═══════════════════════════════════════════════════════════════
//  Shutdown
// ═══════════════════════════════════════════════════════════════

/// Cross-thread shutdown request.  Share it through an `Arc`.
pub struct Shutdown {
    requested: AtomicBool,
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            signal: Signal::new(),
        }
    }

    /// Raise the signal.  Idempotent; callable from any thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.signal.signal(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        while !self.is_requested() {
            self.signal.wait().await;
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ticker
// ═══════════════════════════════════════════════════════════════

/// An iteration that finished after its tick deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrun {
    pub late_by: Duration,
    /// Grid ticks that passed while the iteration ran.
    pub skipped_ticks: u64,
}

/// Why [`Ticker::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Tick,
    Shutdown,
}

/// Next deadline on the grid after an iteration that ended at `now`.
///
/// Pure so the overrun arithmetic can be tested without sleeping.
pub fn reschedule(deadline: Instant, interval: Duration, now: Instant) -> (Instant, Option<Overrun>) {
    if now <= deadline || interval.is_zero() {
        return (deadline, None);
    }
    let late_by = now - deadline;
    let skipped = (late_by.as_nanos() / interval.as_nanos()) as u64 + 1;
    let step = u32::try_from(skipped)
        .ok()
        .and_then(|n| interval.checked_mul(n))
        .and_then(|d| deadline.checked_add(d));
    let next = step.unwrap_or(now + interval);
    (
        next,
        Some(Overrun {
            late_by,
            skipped_ticks: skipped,
        }),
    )
}

/// Fixed-cadence tick source for the control loop.
pub struct Ticker {
    interval: Duration,
    next_tick: Instant,
    overruns: u64,
}

impl Ticker {
    /// First deadline is one interval after `start`.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_tick: start + interval,
            overruns: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Call when an iteration finishes.  Detects an overrun and moves the
    /// deadline past any ticks it covered.
    pub fn complete_iteration(&mut self, now: Instant) -> Option<Overrun> {
        let (next, overrun) = reschedule(self.next_tick, self.interval, now);
        self.next_tick = next;
        if overrun.is_some() {
            self.overruns += 1;
        }
        overrun
    }

    /// Sleep until the next tick or until shutdown is requested.
    pub async fn wait(&mut self, shutdown: &Shutdown) -> Wake {
        if shutdown.is_requested() {
            return Wake::Shutdown;
        }
        let deadline = self.next_tick;
        let tick = async {
            async_io_mini::Timer::at(deadline).await;
            Wake::Tick
        };
        let stop = async {
            shutdown.wait().await;
            Wake::Shutdown
        };
        let wake = futures_lite::future::or(stop, tick).await;
        if wake == Wake::Tick {
            self.next_tick += self.interval;
        }
        wake
    }
}
