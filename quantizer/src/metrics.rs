use serde::Serialize;

use crate::arrival::ArrivalStats;
use crate::quantizer::PlayoutPhase;

/// Emission counters owned by the quantizer. Monotonic for its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmitCounters {
    /// Every fire of the output signal (or forced fire).
    pub total_emit_opportunities: u64,
    /// Fires where nothing could be emitted.
    pub missed_emit_opportunities: u64,
    /// Fires that handed a state to the sink.
    pub emitted_states: u64,
    /// States discarded by the overflow policy.
    pub dropped_states: u64,
}

impl EmitCounters {
    /// Percentage of opportunities that were missed, `0.0` when there were none.
    pub fn missed_emit_percentage(&self) -> f64 {
        if self.total_emit_opportunities == 0 {
            return 0.0;
        }
        self.missed_emit_opportunities as f64 * 100.0 / self.total_emit_opportunities as f64
    }
}

/// Point-in-time view of a quantizer, for logs and reports.
#[derive(Clone, Debug, Serialize)]
pub struct QuantizerMetrics {
    #[serde(flatten)]
    pub counters: EmitCounters,
    pub missed_emit_percentage: f64,
    pub average_occupancy: f64,
    pub buffered: usize,
    pub phase: PlayoutPhase,
    pub arrivals: ArrivalStats,
}
