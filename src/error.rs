use thiserror::Error;

/// Errors raised by instruments, effects, the scheduler and the I/O helpers.
///
/// Everything recoverable in a render (orphan MIDI events, zero-length notes,
/// buffer growth) is reported as data or a log line instead; a `SynthError`
/// aborts only the call that produced it.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid value for parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("parameter `{name}` expects a {expected} value")]
    ParameterType { name: String, expected: &'static str },

    #[error("impulse response crop leaves {remaining} samples, need at least {minimum}")]
    ImpulseResponseTooShort { remaining: usize, minimum: usize },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("scheduler already has a render session running")]
    SchedulerBusy,

    #[error("render worker panicked")]
    WorkerPanicked,

    #[error("note render panicked: {0}")]
    JobPanicked(String),

    #[error(transparent)]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SynthError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;
