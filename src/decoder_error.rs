//! Decoder errors.

/// Errors thrown by the decoder.
#[derive(Debug)]
pub enum DecoderError {
    /// Unsupported combination of sampling rate, channels, frame size or
    /// bandwidth. Surfaced before any decoder state is mutated.
    InvalidConfiguration(&'static str),
    /// A structural error above the range coder layer. Bit-level truncation
    /// is not an error: the range coder tolerates it by design of the format.
    MalformedPacket(&'static str),
    /// An internal invariant was violated. This is a bug; the decoder state
    /// is left in a defined but unusable condition until `reset()`.
    InternalError(&'static str),
}

impl std::fmt::Display for DecoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            DecoderError::MalformedPacket(message) => {
                write!(f, "malformed packet: {}", message)
            }
            DecoderError::InternalError(message) => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
