//! Inbound flood guard.
//!
//! A token bucket bounds how many inbound commands one agent processes;
//! excess messages are dropped before parsing.

use burster::Limiter;
use core::time::Duration;

/// Token-bucket limiter over inbound commands.
pub struct InboundGuard {
    bucket: burster::TokenBucket<fn() -> Duration>,
}

impl InboundGuard {
    /// `rate_per_sec` tokens refill each second, up to `burst`.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            bucket: burster::TokenBucket::new_with_time_provider(
                rate_per_sec as _,
                burst as _,
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Take one token.  `false` means the message must be dropped.
    pub fn admit(&mut self) -> bool {
        self.bucket.try_consume(1).is_ok()
    }
}

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
