#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
//! Implements the CELT decoder of the free and open audio codec Opus in Rust.
//!
//! CELT (Constrained Energy Lapped Transform) is the music-oriented half of
//! the Opus codec designed by the IETF Codec Working Group. This crate
//! implements the CELT decoding path together with the range coder that
//! underpins the whole Opus bitstream:
//!
//! * Bit-exact range decoder and its symmetric encoder (RFC 6716, section 4.1)
//! * Coarse / fine / remainder band energy decoding with inter-frame and
//!   inter-band prediction
//! * Deterministic bit allocation
//! * PVQ shape decoding through the CWRS combinatorial enumeration
//! * Band folding, anti-collapse and mid-side / intensity / dual stereo
//! * IMDCT synthesis with overlap-add, the long-term pitch post-filter and
//!   de-emphasis
//!
//! The SILK (speech) layer, the hybrid dispatcher, the encoder pipelines and
//! the Opus packet framing live outside of this crate. A frame handed to
//! [`Decoder::decode_frame`] is a raw CELT frame, already stripped of the
//! TOC byte and the frame-length framing.
pub use decoder::*;
pub use decoder_error::*;
pub use encoder_error::*;

pub(crate) mod celt;
mod decoder;
mod decoder_error;
mod encoder_error;
pub(crate) mod math;
pub(crate) mod range_coder;

// Affects the following targets: avr and msp430
#[cfg(any(target_pointer_width = "8", target_pointer_width = "16"))]
compile_error!("usize needs to be at least 32 bit wide");

/// Audio channels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channels {
    /// Mono - 1 channel
    Mono = 1,
    /// Stereo - 2 channels
    Stereo = 2,
}

/// Samples per second.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SamplingRate {
    /// 8 kHz
    Hz8000 = 8000,
    /// 12 kHz
    Hz12000 = 12000,
    /// 16 kHz
    Hz16000 = 16000,
    /// 24 kHz
    Hz24000 = 24000,
    /// 48 kHz
    Hz48000 = 48000,
}

/// Audio bandwidth.
///
/// CELT codes a fixed 21-band layout; narrower bandwidths simply stop
/// coding bands early. The mapping to effective band counts lives in the
/// mode configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bandwidth {
    /// 4 kHz passband.
    Narrowband,
    /// 6 kHz passband.
    Mediumband,
    /// 8 kHz passband.
    Wideband,
    /// 12 kHz passband.
    Superwideband,
    /// 20 kHz passband.
    Fullband,
}
