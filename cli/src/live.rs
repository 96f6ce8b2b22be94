//! Real-time run.
//!
//! A producer task emits states through a [`StateFeed`] into a channel, a
//! receiver task pushes them into the quantizer, and the consumer loop calls
//! `update()` on a tokio interval. The quantizer itself does no locking; the
//! tasks share it behind a mutex.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, info};

use common::logger::child_span;
use quantizer::{Quantizer, QuantizerConfig};

use crate::cli::{delay_from_ms, finite_ms, rate_period};
use crate::report::{EmissionLog, RunReport};

#[derive(Clone, Debug)]
pub struct LiveParams {
    pub quantizer: QuantizerConfig,
    pub producer_hz: f64,
    pub consumer_hz: f64,
    pub jitter_ms: f64,
    pub duration: Duration,
}

/// Source of remote states. `Ok(None)` ends the stream.
#[async_trait]
pub trait StateFeed: Send {
    async fn next_state(&mut self) -> anyhow::Result<Option<u64>>;
}

/// Sends sequence numbers at a nominal period with normally distributed
/// jitter on each send, until a deadline.
pub struct JitteredFeed {
    seq: u64,
    period_ms: f64,
    jitter: Normal<f64>,
    rng: StdRng,
    until: Instant,
}

impl JitteredFeed {
    pub fn new(period: Duration, jitter_ms: f64, until: Instant) -> anyhow::Result<Self> {
        finite_ms("jitter", jitter_ms)?;
        let period_ms = period.as_secs_f64() * 1e3;
        let jitter = Normal::new(0.0, jitter_ms)
            .map_err(|e| anyhow::anyhow!("invalid jitter {jitter_ms}: {e}"))?;

        Ok(Self {
            seq: 0,
            period_ms,
            jitter,
            rng: StdRng::from_entropy(),
            until,
        })
    }
}

#[async_trait]
impl StateFeed for JitteredFeed {
    async fn next_state(&mut self) -> anyhow::Result<Option<u64>> {
        let wait = delay_from_ms(self.period_ms + self.jitter.sample(&mut self.rng))?;
        tokio::time::sleep(wait.min(self.until.saturating_duration_since(Instant::now())))
            .await;

        if Instant::now() >= self.until {
            return Ok(None);
        }

        let seq = self.seq;
        self.seq += 1;
        Ok(Some(seq))
    }
}

pub async fn run(params: LiveParams) -> anyhow::Result<RunReport> {
    let send_period = rate_period("producer rate", params.producer_hz)?;
    let tick_period = rate_period("consumer rate", params.consumer_hz)?;
    let deadline = Instant::now() + params.duration;

    let feed = JitteredFeed::new(send_period, params.jitter_ms, deadline)?;
    let quantizer = Arc::new(Mutex::new(Quantizer::<u64>::new(params.quantizer)?));

    let log = Arc::new(Mutex::new(EmissionLog::default()));
    {
        let log = log.clone();
        quantizer
            .lock()
            .on_emit(move |state| log.lock().record(state));
    }

    let stream_id = quantizer.lock().stream_id();
    info!(
        %stream_id,
        duration_ms = params.duration.as_millis() as u64,
        "live run started"
    );

    let (state_tx, state_rx) = mpsc::channel::<u64>(256);

    let producer =
        tokio::spawn(produce(Box::new(feed), state_tx).instrument(child_span("producer")));
    let receiver = tokio::spawn(
        receive(state_rx, Arc::clone(&quantizer)).instrument(child_span("receiver")),
    );

    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut updates = 0u64;
    loop {
        ticker.tick().await;
        if Instant::now() >= deadline {
            break;
        }
        quantizer.lock().update();
        updates += 1;
    }

    let produced = producer.await??;
    receiver.await?;

    let (metrics, stream_id) = {
        let q = quantizer.lock();
        (q.metrics(), q.stream_id())
    };
    let emissions = log.lock().clone();

    info!(
        missed_pct = metrics.missed_emit_percentage,
        avg_occupancy = metrics.average_occupancy,
        "live run finished"
    );

    Ok(RunReport {
        mode: "live",
        stream_id,
        produced,
        updates,
        emissions,
        metrics,
    })
}

/// Forward every state from the feed; returns how many were sent.
async fn produce(mut feed: Box<dyn StateFeed>, tx: mpsc::Sender<u64>) -> anyhow::Result<u64> {
    let mut sent = 0;
    while let Some(state) = feed.next_state().await? {
        if tx.send(state).await.is_err() {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

async fn receive(mut rx: mpsc::Receiver<u64>, quantizer: Arc<Mutex<Quantizer<u64>>>) {
    while let Some(state) = rx.recv().await {
        quantizer.lock().push(state);
    }
}
