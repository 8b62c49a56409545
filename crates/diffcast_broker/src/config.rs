//! Producer configuration.

use diffcast_wire::{CompressionCodec, WireError};
use std::str::FromStr;
use std::time::Duration;

/// What "send succeeded" means for a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckLevel {
    /// The record was accepted into the producer's local send buffer.
    /// Durable delivery happens at the next flush.
    Buffered,
    /// The broker acknowledged the append before `send` returned.
    #[default]
    Acknowledged,
}

impl AckLevel {
    /// Returns the configuration name of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Acknowledged => "acknowledged",
        }
    }
}

impl FromStr for AckLevel {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buffered" => Ok(Self::Buffered),
            "acknowledged" => Ok(Self::Acknowledged),
            other => Err(WireError::Malformed {
                message: format!("unknown ack level {other:?}"),
            }),
        }
    }
}

/// Configuration for a broker producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Durability level a successful send guarantees.
    pub ack_level: AckLevel,
    /// Compression declared to the broker at handshake.
    pub compression: CompressionCodec,
    /// Retry policy for transient broker failures.
    pub retry: RetryPolicy,
    /// Maximum records held in the local send buffer.
    pub buffer_capacity: usize,
    /// Maximum records per produce request during flush.
    pub batch_size: usize,
    /// Time budget for draining the buffer at flush.
    pub flush_deadline: Duration,
}

impl ProducerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ack_level: AckLevel::Acknowledged,
            compression: CompressionCodec::default(),
            retry: RetryPolicy::default(),
            buffer_capacity: 10_000,
            batch_size: 512,
            flush_deadline: Duration::from_secs(5),
        }
    }

    /// Sets the ack level.
    #[must_use]
    pub fn with_ack_level(mut self, ack_level: AckLevel) -> Self {
        self.ack_level = ack_level;
        self
    }

    /// Sets the compression codec.
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionCodec) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the send buffer capacity.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Sets the flush batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the flush deadline.
    #[must_use]
    pub fn with_flush_deadline(mut self, deadline: Duration) -> Self {
        self.flush_deadline = deadline;
        self
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy for transient failures.
///
/// Exponential backoff with a cap and optional jitter. Retries run on the
/// calling thread; the delays here directly extend how long a host commit
/// is blocked, so defaults are short.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (1 = no retry).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to each delay.
    pub add_jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter, for deterministic tests.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay before the given attempt (0-indexed; the
    /// first attempt never waits).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            Duration::from_secs_f64(capped + capped * 0.25 * jitter_fraction())
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap pseudo-random fraction in [0, 1) derived from the clock.
fn jitter_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1024) / 1024.0
}
