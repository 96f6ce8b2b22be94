//! Quantizer controller.
//!
//! Owns the playout buffer and the output signal and decides, once per fire,
//! whether to hand the oldest buffered state to the consumer or to report
//! that nothing is available.
//!
//! ## Warm-up after an outage
//! When an update (or a fire) finds the buffer empty the quantizer remembers
//! it. Until the buffer holds `refill_threshold` states again (2 by default)
//! every fire is a miss, even if one state is already waiting. Draining that single state
//! straight away would most likely produce another empty fire one period
//! later; holding it back absorbs one period of arrival jitter before steady
//! emission resumes. The flag is cleared by the first successful emission.

use std::time::Duration;

use serde::Serialize;
use tracing::{Span, debug, trace, warn};

use common::logger::{StreamId, stream_span};

use crate::arrival::{ArrivalMonitor, ArrivalStats};
use crate::buffer::PlayoutBuffer;
use crate::clock::{Clock, MonotonicClock};
use crate::config::QuantizerConfig;
use crate::ema::ExponentialMovingAverage;
use crate::error::ConfigError;
use crate::metrics::{EmitCounters, QuantizerMetrics};
use crate::periodic::PeriodicSignal;
use crate::sink::EmissionSink;

/// Where the quantizer stands, derived from the first-push flag, buffer
/// occupancy and the warm-up flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoutPhase {
    /// Nothing pushed yet; `update()` is a no-op.
    Cold,
    Empty,
    /// Ran dry earlier and is waiting for enough states to resume.
    Refilling,
    Steady,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissReason {
    Empty,
    Refilling,
}

/// What a single `update()` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No state was ever pushed.
    Cold,
    /// The output signal has not fired yet.
    Waiting,
    /// A state was handed to the emission handler.
    Emitted,
    /// The signal fired but nothing was emitted; the handler got `None`.
    Missed(MissReason),
}

impl UpdateOutcome {
    /// Whether this call consumed an emit opportunity.
    pub fn fired(&self) -> bool {
        matches!(self, UpdateOutcome::Emitted | UpdateOutcome::Missed(_))
    }
}

pub struct Quantizer<T, C = MonotonicClock> {
    config: QuantizerConfig,
    clock: C,

    buffer: PlayoutBuffer<T>,
    arrivals: ArrivalMonitor,
    occupancy: ExponentialMovingAverage,
    output_signal: PeriodicSignal,
    sink: EmissionSink<T>,

    counters: EmitCounters,
    pushed_first_element: bool,
    was_empty_on_last_update: bool,

    stream_id: StreamId,
    span: Span,
}

impl<T> Quantizer<T, MonotonicClock> {
    pub fn new(config: QuantizerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, MonotonicClock)
    }
}

impl<T, C: Clock> Quantizer<T, C> {
    pub fn with_clock(config: QuantizerConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;

        let stream_id = StreamId::new();
        let span = stream_span("quantizer", &stream_id);

        Ok(Self {
            buffer: PlayoutBuffer::new(config.initial_capacity, config.overflow),
            arrivals: ArrivalMonitor::new(config.arrival_window()),
            occupancy: ExponentialMovingAverage::new(config.ema_alpha),
            output_signal: PeriodicSignal::from_rate_hz(config.output_rate_hz, config.catch_up)?,
            sink: EmissionSink::new(),
            counters: EmitCounters::default(),
            pushed_first_element: false,
            was_empty_on_last_update: false,
            stream_id,
            span,
            config,
            clock,
        })
    }

    /// Producer side: buffer a state received from the remote peer.
    ///
    /// Never blocks and never emits. The first push arms the output signal,
    /// so the first fire happens one period later.
    pub fn push(&mut self, item: T) {
        let span = self.span.clone();
        let _entered = span.enter();

        let now = self.clock.now();

        let admission = self.buffer.push(item);
        if admission.dropped_state() {
            self.counters.dropped_states += 1;
            warn!(
                policy = ?self.buffer.policy(),
                buffered = self.buffer.len(),
                dropped_total = self.counters.dropped_states,
                "playout buffer overflow, state dropped"
            );
        }

        if let Some(interval) = self.arrivals.mark(now) {
            trace!(
                interval_us = interval.as_micros() as u64,
                buffered = self.buffer.len(),
                "state received"
            );
        }

        if !self.pushed_first_element {
            self.output_signal.restart(now);
            self.pushed_first_element = true;
            debug!(
                period_us = self.output_signal.period().as_micros() as u64,
                "first state received, output signal armed"
            );
        }
    }

    /// Consumer side: call once per local tick.
    ///
    /// Emits through the handler at most once per call, and only when the
    /// output signal fired.
    pub fn update(&mut self) -> UpdateOutcome {
        if !self.pushed_first_element {
            return UpdateOutcome::Cold;
        }

        let span = self.span.clone();
        let _entered = span.enter();

        self.occupancy.add_sample(self.buffer.len() as f64);
        if self.buffer.is_empty() {
            self.was_empty_on_last_update = true;
        }

        if !self.output_signal.consume_fire(self.clock.now()) {
            return UpdateOutcome::Waiting;
        }

        self.process_fire()
    }

    /// Handle one emit opportunity right now.
    ///
    /// `update()` calls this when the output signal fires. An embedder whose
    /// own fixed-step loop already is the output clock can call it directly;
    /// it then bypasses the signal and the first-push gate.
    pub fn process_fire(&mut self) -> UpdateOutcome {
        self.counters.total_emit_opportunities += 1;

        if self.buffer.is_empty() {
            return self.miss(MissReason::Empty);
        }

        if self.was_empty_on_last_update && self.buffer.len() < self.config.refill_threshold {
            return self.miss(MissReason::Refilling);
        }

        let Some(item) = self.buffer.pop_front() else {
            return self.miss(MissReason::Empty);
        };

        if self.was_empty_on_last_update {
            debug!(buffered = self.buffer.len(), "refilled, resuming emission");
        }
        self.was_empty_on_last_update = false;
        self.counters.emitted_states += 1;

        trace!(buffered = self.buffer.len(), "emitting state");
        self.sink.emit(Some(item));

        UpdateOutcome::Emitted
    }

    fn miss(&mut self, reason: MissReason) -> UpdateOutcome {
        if reason == MissReason::Empty {
            self.was_empty_on_last_update = true;
        }
        self.counters.missed_emit_opportunities += 1;

        debug!(
            ?reason,
            buffered = self.buffer.len(),
            missed_total = self.counters.missed_emit_opportunities,
            "emit opportunity missed"
        );
        self.sink.emit(None);

        UpdateOutcome::Missed(reason)
    }

    /// Attach the consumer's emission handler, replacing any previous one.
    pub fn on_emit<F>(&mut self, handler: F)
    where
        F: FnMut(Option<T>) + Send + 'static,
    {
        self.sink.attach(handler);
    }

    pub fn clear_emit_handler(&mut self) -> bool {
        self.sink.detach()
    }

    pub fn phase(&self) -> PlayoutPhase {
        if !self.pushed_first_element {
            PlayoutPhase::Cold
        } else if self.buffer.is_empty() {
            PlayoutPhase::Empty
        } else if self.was_empty_on_last_update && self.buffer.len() < self.config.refill_threshold
        {
            PlayoutPhase::Refilling
        } else {
            PlayoutPhase::Steady
        }
    }

    /// Whether at least one state was pushed.
    pub fn is_warm(&self) -> bool {
        self.pushed_first_element
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Progress through the current output period in `[0, 1]`, for
    /// interpolating between emitted states. `0.0` before the first push.
    pub fn fraction_of_current_period(&self) -> f64 {
        self.output_signal
            .fraction_of_current_period(self.clock.now())
    }

    pub fn period(&self) -> Duration {
        self.output_signal.period()
    }

    pub fn missed_emit_percentage(&self) -> f64 {
        self.counters.missed_emit_percentage()
    }

    pub fn average_occupancy(&self) -> f64 {
        self.occupancy.get()
    }

    pub fn total_emit_opportunities(&self) -> u64 {
        self.counters.total_emit_opportunities
    }

    pub fn missed_emit_opportunities(&self) -> u64 {
        self.counters.missed_emit_opportunities
    }

    pub fn emitted_states(&self) -> u64 {
        self.counters.emitted_states
    }

    pub fn dropped_states(&self) -> u64 {
        self.counters.dropped_states
    }

    pub fn counters(&self) -> EmitCounters {
        self.counters
    }

    pub fn arrival_stats(&self) -> ArrivalStats {
        self.arrivals.stats()
    }

    /// Mean producer period measured from arrivals.
    pub fn estimated_producer_period(&self) -> Option<Duration> {
        self.arrivals.estimated_period()
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    pub fn metrics(&self) -> QuantizerMetrics {
        QuantizerMetrics {
            counters: self.counters,
            missed_emit_percentage: self.missed_emit_percentage(),
            average_occupancy: self.average_occupancy(),
            buffered: self.buffer.len(),
            phase: self.phase(),
            arrivals: self.arrival_stats(),
        }
    }
}
