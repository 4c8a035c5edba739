//! Implements the decoder.

use crate::celt::CeltDecoder;
use crate::{Bandwidth, Channels, DecoderError, SamplingRate};

/// Longest legal CELT frame in bytes.
const MAX_FRAME_BYTES: usize = 1275;

/// CELT decoder.
///
/// CELT is a stateful codec with overlapping blocks: frames are not coded
/// independently of each other and must be passed into the decoder serially
/// and in the correct order. The band energies, the overlap buffer, the
/// de-emphasis and post-filter memories and the folding RNG all carry over
/// from one frame to the next.
///
/// A single decoder instance must not be used from multiple threads at
/// once; independent instances are fully isolated from each other.
pub struct Decoder {
    celt: CeltDecoder,
    channels: Channels,
    sampling_rate: SamplingRate,
}

impl Decoder {
    /// Creates a new `Decoder`.
    ///
    /// # Arguments
    /// * `sampling_rate` - Sample rate of the decoded output.
    /// * `channels`      - Channel count of the decoded output. A stereo
    ///                     decoder also accepts mono frames; the reverse is
    ///                     an error.
    pub fn new(sampling_rate: SamplingRate, channels: Channels) -> Result<Self, DecoderError> {
        Ok(Self {
            celt: CeltDecoder::new(channels as usize),
            channels,
            sampling_rate,
        })
    }

    /// Resets the decoder to be equivalent to a freshly created one.
    ///
    /// This should be called when switching streams in order to prevent
    /// the back to back decoding from giving different results from
    /// one at a time decoding.
    pub fn reset(&mut self) {
        self.celt.reset();
    }

    /// Returns the sampling rate the decoder was initialized with.
    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    /// Returns the channels the decoder was initialized with.
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Decodes a single CELT frame.
    ///
    /// Returns interleaved PCM with `frame_size` samples per decoder
    /// channel. A mono frame decoded on a stereo decoder is upmixed into
    /// both channels and leaves both channels' state identical.
    ///
    /// # Arguments
    /// * `frame`           - Raw bytes of one CELT frame, stripped of the
    ///                       Opus TOC byte and the frame length framing.
    ///                       Truncated frames are legal and decode to the
    ///                       extent of their bits.
    /// * `frame_size`      - Samples per channel in the frame; one of 120,
    ///                       240, 480 or 960.
    /// * `stream_channels` - Channels coded in this frame.
    /// * `bandwidth`       - Audio bandwidth coded in this frame.
    pub fn decode_frame(
        &mut self,
        frame: &[u8],
        frame_size: usize,
        stream_channels: Channels,
        bandwidth: Bandwidth,
    ) -> Result<Vec<f32>, DecoderError> {
        if frame.len() > MAX_FRAME_BYTES {
            return Err(DecoderError::MalformedPacket("frame exceeds 1275 bytes"));
        }
        if stream_channels == Channels::Stereo && self.channels == Channels::Mono {
            return Err(DecoderError::InvalidConfiguration(
                "stereo frame on a mono decoder",
            ));
        }

        let coded_channels = stream_channels as usize;
        let mut pcm = vec![vec![0.0_f32; frame_size]; coded_channels];
        self.celt
            .decode_frame(frame, frame_size, coded_channels, bandwidth, &mut pcm)?;

        let out_channels = self.channels as usize;
        let mut output = vec![0.0_f32; frame_size * out_channels];

        if out_channels == 2 && coded_channels == 1 {
            // Upmix and keep both channels' cross-frame state identical.
            self.celt.sync_mono_to_stereo();
            (0..frame_size).into_iter().for_each(|i| {
                output[2 * i] = pcm[0][i];
                output[2 * i + 1] = pcm[0][i];
            });
        } else if out_channels == 2 {
            (0..frame_size).into_iter().for_each(|i| {
                output[2 * i] = pcm[0][i];
                output[2 * i + 1] = pcm[1][i];
            });
        } else {
            output.copy_from_slice(&pcm[0]);
        }

        Ok(output)
    }
}
