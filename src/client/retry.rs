//! Retry policy for timed-out requests.

use std::time::Duration;

/// How often, and how patiently, a timed-out request is resent.
///
/// ```rust
/// use snmp_cache::client::Retry;
/// use std::time::Duration;
///
/// let once = Retry::none();
/// let steady = Retry::fixed(3, Duration::from_millis(200));
/// let backoff = Retry::exponential(4)
///     .initial_delay(Duration::from_millis(250))
///     .max_delay(Duration::from_secs(2))
///     .build();
/// # let _ = (once, steady, backoff);
/// ```
#[derive(Clone, Debug)]
pub struct Retry {
    /// Resends after the first attempt (0 sends once).
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Delay between attempts.
#[derive(Clone, Debug, Default)]
pub enum Backoff {
    /// Resend immediately.
    #[default]
    None,
    Fixed { delay: Duration },
    /// `initial * 2^attempt`, capped at `max`, scaled by `1 ± jitter`.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: f64,
    },
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn exponential(attempts: u32) -> RetryBuilder {
        RetryBuilder {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay to wait before resend number `attempt` (zero based).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(multiplier).min(*max);
                Duration::from_secs_f64(capped.as_secs_f64() * jitter_factor(*jitter))
            }
        }
    }
}

/// Builder for [`Backoff::Exponential`].
#[derive(Debug)]
pub struct RetryBuilder {
    max_attempts: u32,
    initial: Duration,
    max: Duration,
    jitter: f64,
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryBuilder {
    /// Default 1 s.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial = delay;
        self
    }

    /// Default 5 s.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max = delay;
        self
    }

    /// Clamped to `0.0..=1.0`. Default 0.25.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> Retry {
        Retry {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: self.initial,
                max: self.max,
                jitter: self.jitter,
            },
        }
    }
}

impl From<RetryBuilder> for Retry {
    fn from(builder: RetryBuilder) -> Self {
        builder.build()
    }
}

/// Factor in `[1 - jitter, 1 + jitter]`.
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let mut buf = [0u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        return 1.0;
    }
    // upper 53 bits as a uniform float in [0, 1)
    let random = (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64;
    1.0 + (random - 0.5) * 2.0 * jitter
}
