use serde::Serialize;

use common::logger::StreamId;
use quantizer::QuantizerMetrics;

/// What the consumer saw, built from the emission handler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmissionLog {
    /// States delivered.
    pub delivered: u64,
    /// Fires that delivered nothing.
    pub empty: u64,
    /// Delivered states older than the one before them.
    pub reordered: u64,
    /// Sequence numbers never delivered below the highest delivered one.
    pub skipped: u64,
    /// Longest run of consecutive empty fires.
    pub longest_gap: u64,

    #[serde(skip)]
    highest_seq: Option<u64>,
    #[serde(skip)]
    current_gap: u64,
}

impl EmissionLog {
    pub fn record(&mut self, emitted: Option<u64>) {
        let Some(seq) = emitted else {
            self.empty += 1;
            self.current_gap += 1;
            self.longest_gap = self.longest_gap.max(self.current_gap);
            return;
        };

        self.delivered += 1;
        self.current_gap = 0;

        match self.highest_seq {
            Some(highest) if seq < highest => {
                // counted as skipped when `highest` jumped over it
                self.reordered += 1;
                self.skipped = self.skipped.saturating_sub(1);
            }
            Some(highest) => {
                self.skipped += seq.saturating_sub(highest + 1);
                self.highest_seq = Some(seq);
            }
            None => self.highest_seq = Some(seq),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub mode: &'static str,
    pub stream_id: StreamId,
    pub produced: u64,
    pub updates: u64,
    pub emissions: EmissionLog,
    pub metrics: QuantizerMetrics,
}

impl RunReport {
    pub fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }

        let m = &self.metrics;
        println!("📡 [{}] stream {}", self.mode, self.stream_id);
        println!(
            "   produced={} updates={} opportunities={} emitted={} missed={} ({:.2}%)",
            self.produced,
            self.updates,
            m.counters.total_emit_opportunities,
            m.counters.emitted_states,
            m.counters.missed_emit_opportunities,
            m.missed_emit_percentage
        );
        println!(
            "   avg occupancy={:.2} buffered={} dropped={} phase={:?}",
            m.average_occupancy, m.buffered, m.counters.dropped_states, m.phase
        );
        println!(
            "   reordered={} skipped={} longest gap={} fires",
            self.emissions.reordered, self.emissions.skipped, self.emissions.longest_gap
        );
        if let Some(rate) = m.arrivals.estimated_rate_hz {
            println!(
                "   producer ≈ {:.2} Hz, interval σ={:.2} ms, recent max gap={:.2} ms",
                rate,
                m.arrivals.std_dev.as_secs_f64() * 1e3,
                m.arrivals.recent_max.as_secs_f64() * 1e3
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_gaps_skips_and_reordering() {
        let mut log = EmissionLog::default();

        for e in [Some(0), None, None, Some(1), Some(4), Some(3), None, Some(5)] {
            log.record(e);
        }

        assert_eq!(log.delivered, 5);
        assert_eq!(log.empty, 3);
        assert_eq!(log.longest_gap, 2);
        // 2 never arrived, 3 arrived late
        assert_eq!(log.skipped, 1);
        assert_eq!(log.reordered, 1);
    }
}
