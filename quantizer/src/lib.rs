//! Networked periodic signal quantizer.
//!
//! Turns an irregular stream of remote state snapshots into a fixed-cadence
//! stream for a local tick loop. The producer side calls
//! [`Quantizer::push`], the consumer side calls [`Quantizer::update`] once per
//! tick and receives `Some(state)` or `None` through the emission handler.

pub mod arrival;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod ema;
pub mod error;
pub mod metrics;
pub mod periodic;
pub mod quantizer;
pub mod rolling_window;
pub mod sink;

pub use arrival::{ArrivalMonitor, ArrivalStats};
pub use buffer::{Admission, OverflowPolicy, PlayoutBuffer};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::QuantizerConfig;
pub use error::ConfigError;
pub use metrics::QuantizerMetrics;
pub use periodic::{CatchUp, PeriodicSignal};
pub use quantizer::{MissReason, PlayoutPhase, Quantizer, UpdateOutcome};
pub use sink::EmissionSink;
