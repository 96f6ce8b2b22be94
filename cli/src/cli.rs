use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use quantizer::{CatchUp, OverflowPolicy, QuantizerConfig};

use crate::live::LiveParams;
use crate::sim::SimParams;

#[derive(Debug, Parser)]
#[command(name = "playout", version, about = "Drive a periodic signal quantizer with a jittery producer")]
pub struct Cli {
    /// Print the report (and logs) as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deterministic run on a virtual clock
    Simulate(SimulateArgs),
    /// Real-time run with a tokio producer task
    Live(LiveArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OverflowCli {
    Unbounded,
    DropOldest,
    DropNewest,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CatchUpCli {
    Skip,
    Burst,
}

#[derive(Debug, Clone, Args)]
pub struct StreamArgs {
    /// Output cadence of the quantizer
    #[arg(long, default_value = "60.0")]
    pub output_hz: f64,

    /// Rate at which the remote producer sends states
    #[arg(long, default_value = "60.0")]
    pub producer_hz: f64,

    /// Rate of `update()` calls; defaults to the output rate
    #[arg(long)]
    pub consumer_hz: Option<f64>,

    /// Standard deviation of the per-state delay, in milliseconds
    #[arg(long, default_value = "4.0")]
    pub jitter_ms: f64,

    #[arg(long, value_enum, default_value = "drop-oldest")]
    pub overflow: OverflowCli,

    /// Buffer limit for the bounded overflow policies
    #[arg(long, default_value = "120")]
    pub max_buffered: usize,

    #[arg(long, value_enum, default_value = "skip")]
    pub catch_up: CatchUpCli,

    /// States required before emission resumes after running dry
    #[arg(long, default_value = "2")]
    pub refill_threshold: usize,

    #[arg(long, default_value = "10.0")]
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Mean one-way network latency, in milliseconds
    #[arg(long, default_value = "40.0")]
    pub latency_ms: f64,

    #[arg(long, default_value = "7")]
    pub seed: u64,
}

#[derive(Debug, Clone, Args)]
pub struct LiveArgs {
    #[command(flatten)]
    pub stream: StreamArgs,
}

impl StreamArgs {
    pub fn quantizer_config(&self) -> QuantizerConfig {
        let overflow = match self.overflow {
            OverflowCli::Unbounded => OverflowPolicy::Unbounded,
            OverflowCli::DropOldest => OverflowPolicy::DropOldest {
                max_len: self.max_buffered,
            },
            OverflowCli::DropNewest => OverflowPolicy::DropNewest {
                max_len: self.max_buffered,
            },
        };
        let catch_up = match self.catch_up {
            CatchUpCli::Skip => CatchUp::Skip,
            CatchUpCli::Burst => CatchUp::Burst,
        };

        QuantizerConfig {
            output_rate_hz: self.output_hz,
            refill_threshold: self.refill_threshold,
            overflow,
            catch_up,
            ..Default::default()
        }
    }

    fn duration(&self) -> anyhow::Result<Duration> {
        Duration::try_from_secs_f64(self.duration_secs)
            .map_err(|e| anyhow::anyhow!("invalid --duration-secs {}: {e}", self.duration_secs))
    }
}

impl SimulateArgs {
    pub fn params(&self) -> anyhow::Result<SimParams> {
        finite_ms("--latency-ms", self.latency_ms)?;
        finite_ms("--jitter-ms", self.stream.jitter_ms)?;

        Ok(SimParams {
            quantizer: self.stream.quantizer_config(),
            producer_hz: self.stream.producer_hz,
            consumer_hz: self.stream.consumer_hz.unwrap_or(self.stream.output_hz),
            latency_ms: self.latency_ms,
            jitter_ms: self.stream.jitter_ms,
            duration: self.stream.duration()?,
            seed: self.seed,
        })
    }
}

impl LiveArgs {
    pub fn params(&self) -> anyhow::Result<LiveParams> {
        finite_ms("--jitter-ms", self.stream.jitter_ms)?;

        Ok(LiveParams {
            quantizer: self.stream.quantizer_config(),
            producer_hz: self.stream.producer_hz,
            consumer_hz: self.stream.consumer_hz.unwrap_or(self.stream.output_hz),
            jitter_ms: self.stream.jitter_ms,
            duration: self.stream.duration()?,
        })
    }
}

pub fn finite_ms(label: &str, ms: f64) -> anyhow::Result<f64> {
    anyhow::ensure!(ms.is_finite(), "{label} must be a finite number of milliseconds, got {ms}");
    Ok(ms)
}

/// Delay of `ms` milliseconds, negative values clamped to zero.
pub fn delay_from_ms(ms: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(ms.max(0.0) / 1e3)
        .map_err(|e| anyhow::anyhow!("delay of {ms} ms is out of range: {e}"))
}

/// Period of a positive, finite rate.
pub fn rate_period(label: &str, hz: f64) -> anyhow::Result<Duration> {
    anyhow::ensure!(
        hz.is_finite() && hz > 0.0,
        "{label} must be a positive rate, got {hz}"
    );
    let period = Duration::try_from_secs_f64(1.0 / hz)?;
    anyhow::ensure!(!period.is_zero(), "{label} {hz} Hz is too fast");
    Ok(period)
}
