//! # relay
//!
//! Latest-value exchange of real-time signals between one producer and any
//! number of consumers running at independent cycle rates.
//!
//! Each signal owns N buffers (1..=64). The producer writes into the oldest
//! buffer nobody is reading and publishes it with a fresh tag; consumers copy
//! out of the freshest buffer not being written. Neither side ever waits on
//! the other: when no buffer qualifies the call returns [`RelayError::Busy`]
//! and the caller treats the signal as stale for this cycle.
//!
//! Consumers share the `Exchange` through an `Arc`; the one writer holds
//! the exchange's [`Producer`].
//!
//! ```rust
//! use std::sync::Arc;
//! use relay::{ Exchange, ExchangeConfig };
//!
//! let mut builder = Exchange::builder(ExchangeConfig::new(3).unwrap());
//! let speed = builder.signal("speed", 4).unwrap();
//! let exchange = Arc::new(builder.build().unwrap());
//! let mut producer = exchange.producer().unwrap();
//!
//! // Producer cycle
//! producer.publish_value(speed, &42u32).unwrap();
//!
//! // Consumer cycle
//! assert_eq!(exchange.latest_value::<u32>(speed).unwrap(), 42);
//! ```
//!
//! Copy engines that move bytes themselves use the offset API directly:
//! `Exchange::acquire_for_read` / `Producer::acquire_for_write`, copy at
//! `Signal::storage` + offset, then `release_read` / `release_write`.

pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod insights;
pub mod metrics;

pub use config::{ ExchangeConfig, SignalConfig };
pub use error::{ RelayError, Result };
pub use exchange::{
    CopyRange,
    Exchange,
    ExchangeBuilder,
    LockTimeout,
    Producer,
    ReadGuard,
    SignalId,
    SignalSnapshot,
    StatePlan,
    WriteGuard,
    WriteRelease,
    WriteState,
};
pub use insights::init_tracy;
pub use metrics::{ Metrics, MetricsSnapshot };
