//! Virtual-time simulation.
//!
//! A producer sends one state per producer period; each state reaches the
//! consumer after a normally distributed delay, so states can arrive bunched
//! up or out of order. The consumer calls `update()` at its own rate. Time is
//! a `ManualClock`, so a run is deterministic for a given seed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use quantizer::{ManualClock, Quantizer, QuantizerConfig};

use crate::cli::{delay_from_ms, finite_ms, rate_period};
use crate::report::{EmissionLog, RunReport};

#[derive(Clone, Debug)]
pub struct SimParams {
    pub quantizer: QuantizerConfig,
    pub producer_hz: f64,
    pub consumer_hz: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub duration: Duration,
    pub seed: u64,
}

/// Arrival time of every state sent during the run, in arrival order.
fn schedule_arrivals(params: &SimParams) -> anyhow::Result<Vec<(Duration, u64)>> {
    let send_period = rate_period("producer rate", params.producer_hz)?;
    let latency_ms = finite_ms("latency", params.latency_ms)?;
    let jitter_ms = finite_ms("jitter", params.jitter_ms)?;
    let delay = Normal::new(latency_ms, jitter_ms)
        .map_err(|e| anyhow::anyhow!("invalid latency/jitter: {e}"))?;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut arrivals = Vec::new();
    let mut seq = 0u64;
    let mut sent_at = Duration::ZERO;

    while sent_at < params.duration {
        let delay_ms: f64 = delay.sample(&mut rng);
        let arrival = sent_at
            .checked_add(delay_from_ms(delay_ms)?)
            .ok_or_else(|| anyhow::anyhow!("arrival time overflows after {delay_ms} ms"))?;
        arrivals.push((arrival, seq));

        seq += 1;
        sent_at += send_period;
    }

    // stable: equal arrival times keep send order
    arrivals.sort_by_key(|(at, _)| *at);
    Ok(arrivals)
}

pub fn run(params: &SimParams) -> anyhow::Result<RunReport> {
    let tick_period = rate_period("consumer rate", params.consumer_hz)?;
    let arrivals = schedule_arrivals(params)?;

    let clock = ManualClock::new();
    let mut quantizer = Quantizer::with_clock(params.quantizer.clone(), clock.clone())?;

    let log = Arc::new(Mutex::new(EmissionLog::default()));
    {
        let log = log.clone();
        quantizer.on_emit(move |state| log.lock().record(state));
    }

    info!(
        stream_id = %quantizer.stream_id(),
        states = arrivals.len(),
        seed = params.seed,
        "simulation started"
    );

    let mut pending = arrivals.iter().peekable();
    let mut updates = 0u64;
    let mut now = Duration::ZERO;

    while now < params.duration {
        while let Some((at, seq)) = pending.next_if(|(at, _)| *at <= now) {
            clock.set_elapsed(*at);
            quantizer.push(*seq);
        }

        clock.set_elapsed(now);
        let outcome = quantizer.update();
        updates += 1;

        if outcome.fired() {
            debug!(t_ms = now.as_millis() as u64, ?outcome, "fire");
        }

        now += tick_period;
    }

    let report = RunReport {
        mode: "simulate",
        stream_id: quantizer.stream_id(),
        produced: arrivals.len() as u64,
        updates,
        emissions: log.lock().clone(),
        metrics: quantizer.metrics(),
    };

    info!(
        missed_pct = report.metrics.missed_emit_percentage,
        avg_occupancy = report.metrics.average_occupancy,
        "simulation finished"
    );

    Ok(report)
}
