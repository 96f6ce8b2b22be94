use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("output rate must be a positive finite number of Hz, got {0}")]
    InvalidRate(f64),

    #[error("EMA smoothing factor must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("refill threshold must be at least 1")]
    InvalidRefillThreshold,

    #[error("buffer limit {max_len} is below the refill threshold {refill_threshold}")]
    CapacityBelowRefill {
        max_len: usize,
        refill_threshold: usize,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
