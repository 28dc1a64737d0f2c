//! Exchange and per-signal configuration.
//!
//! Validated once at setup; nothing here changes after `ExchangeBuilder::build`.

use crate::constants::{
    DEFAULT_NUM_BUFFERS,
    DEFAULT_RENORMALIZE_TIMEOUT_MS,
    DEFAULT_SAMPLE_CAPACITY,
    MAX_BUFFERS,
};
use crate::error::{ RelayError, Result };
use crate::exchange::LockTimeout;

fn check_num_buffers(num_buffers: usize) -> Result<()> {
    if num_buffers == 0 {
        return Err(RelayError::config("Number of buffers must be greater than 0"));
    }
    if num_buffers > MAX_BUFFERS {
        return Err(
            RelayError::config(format!("Number of buffers must be at most {}", MAX_BUFFERS))
        );
    }
    Ok(())
}

/// Defaults shared by every signal of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Buffers per signal (1..=64)
    pub num_buffers: usize,
    /// Bound on each lock taken while renormalizing freshness tags
    pub renormalize_timeout: LockTimeout,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            num_buffers: DEFAULT_NUM_BUFFERS,
            renormalize_timeout: LockTimeout::Millis(DEFAULT_RENORMALIZE_TIMEOUT_MS),
        }
    }
}

impl ExchangeConfig {
    pub fn new(num_buffers: usize) -> Result<Self> {
        check_num_buffers(num_buffers)?;
        Ok(Self {
            num_buffers,
            ..Default::default()
        })
    }

    pub fn with_renormalize_timeout(mut self, timeout: LockTimeout) -> Self {
        self.renormalize_timeout = timeout;
        self
    }
}

/// One signal: `sample_capacity` samples of `sample_size` bytes per buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalConfig {
    pub name: String,
    pub sample_size: usize,
    pub sample_capacity: usize,
    /// Overrides `ExchangeConfig::num_buffers` for this signal
    pub num_buffers: Option<usize>,
}

impl SignalConfig {
    pub fn new(name: impl Into<String>, sample_size: usize) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RelayError::config("Signal name must not be empty"));
        }
        if sample_size == 0 {
            return Err(RelayError::config(format!("Signal '{}' has zero sample size", name)));
        }
        Ok(Self {
            name,
            sample_size,
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            num_buffers: None,
        })
    }

    pub fn with_sample_capacity(mut self, samples: usize) -> Result<Self> {
        if samples == 0 {
            return Err(
                RelayError::config(format!("Signal '{}' must hold at least one sample", self.name))
            );
        }
        self.sample_capacity = samples;
        Ok(self)
    }

    pub fn with_buffers(mut self, num_buffers: usize) -> Result<Self> {
        check_num_buffers(num_buffers)?;
        self.num_buffers = Some(num_buffers);
        Ok(self)
    }

    /// Bytes in one buffer.
    pub fn byte_size(&self) -> Result<usize> {
        self.sample_size
            .checked_mul(self.sample_capacity)
            .ok_or_else(|| RelayError::config(format!("Signal '{}' is too large", self.name)))
    }

    pub fn resolved_buffers(&self, defaults: &ExchangeConfig) -> usize {
        self.num_buffers.unwrap_or(defaults.num_buffers)
    }
}
