//! Exponential backoff with jitter for WebSocket reconnects and broker
//! reconnect loops (§5 "WebSocket reconnection retries with a short
//! backoff (2s) up to a fixed retry ceiling").

use rand::Rng;
use std::time::Duration;

/// Tunable backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: Option<usize>,
    /// Randomization factor in `[0, 1]` to avoid thundering-herd reconnects.
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(10),
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    /// The exchange WebSocket's documented reconnect cadence (§5): a 2s
    /// initial delay, doubling up to a fixed ceiling of attempts.
    pub fn exchange_reconnect() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: Some(20),
            jitter_factor: 0.2,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            max_retries: None,
            ..Default::default()
        }
    }
}

/// Stateful backoff: call [`next_delay`](Self::next_delay) once per failed
/// attempt, [`reset`](Self::reset) on success.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_attempt: usize,
    current_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            current_delay: config.initial_delay,
            current_attempt: 0,
            config,
        }
    }

    /// Next delay, advancing the backoff state. `None` once `max_retries`
    /// is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_retries) = self.config.max_retries {
            if self.current_attempt >= max_retries {
                return None;
            }
        }

        let delay = self.delay_with_jitter();
        self.current_attempt += 1;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier),
            self.config.max_delay,
        );

        Some(delay)
    }

    fn delay_with_jitter(&self) -> Duration {
        if self.config.jitter_factor == 0.0 {
            return self.current_delay;
        }
        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * self.config.jitter_factor;
        let jitter_multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);
        Duration::from_secs_f64(self.current_delay.as_secs_f64() * jitter_multiplier)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.current_delay = self.config.initial_delay;
    }

    pub fn attempt_number(&self) -> usize {
        self.current_attempt
    }

    pub fn can_retry(&self) -> bool {
        match self.config.max_retries {
            Some(max) => self.current_attempt < max,
            None => true,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
