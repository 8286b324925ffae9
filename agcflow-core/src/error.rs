use thiserror::Error;

use crate::audio::SampleFormat;

/// All errors produced by agcflow-core.
#[derive(Debug, Error)]
pub enum AgcError {
    /// Invalid stream configuration, or the engine rejected the initial gain
    /// configuration. No pipeline is returned.
    #[error("cannot construct pipeline: {0}")]
    Construction(String),

    /// A reconfiguration failed validation. The previous configuration stays
    /// in effect.
    #[error("invalid gain configuration: {0}")]
    Config(String),

    #[error("buffer holds {actual} samples, chunk geometry requires {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("pipeline expects {expected:?} samples, got {actual:?}")]
    FormatMismatch {
        expected: SampleFormat,
        actual: SampleFormat,
    },

    #[error("another operation is in progress on this pipeline")]
    Reentrancy,

    #[error("pipeline is closed")]
    ClosedPipeline,

    #[error("unsupported WAV layout: {0}")]
    UnsupportedWav(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgcError>;
