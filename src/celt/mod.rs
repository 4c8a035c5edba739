//! Implements the CELT decoder.
pub(crate) use decoder::CeltDecoder;

mod alloc;
mod bands;
mod comb_filter;
mod cwrs;
mod decoder;
mod energy;
mod kiss_fft;
mod mdct;
mod mode;

/// Number of bands of the 48 kHz mode.
pub(crate) const MAX_BANDS: usize = 21;
/// Size of a single short block.
pub(crate) const SHORT_BLOCK_SIZE: usize = 120;
/// Largest supported frame size.
pub(crate) const MAX_FRAME_SIZE: usize = 960;
/// Floor of the band energies in the log domain (one unit is 6 dB).
/// Band energies of silent frames rest here.
pub(crate) const SILENCE_FLOOR: f32 = -28.0;
/// Longest period of the post-filter in samples.
pub(crate) const MAX_PERIOD: usize = 1024;
/// Shortest period of the post-filter in samples.
pub(crate) const MIN_PERIOD: usize = 15;
