//! Minimal RIFF/WAVE container for little-endian integer PCM.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the canonical header written by [`pcm_to_wav`].
pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT_TAG: u16 = 1;

/// Shape of a raw PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample.
    pub sample_width: u16,
}

impl Default for PcmFormat {
    /// Piper's usual output: 22050 Hz mono 16-bit.
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
            sample_width: 2,
        }
    }
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_width: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_width,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.sample_width)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width.saturating_mul(8)
    }
}

/// Prepends a 44-byte PCM WAV header to `pcm`.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Bytes {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);

    let mut out = BytesMut::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.put_slice(b"RIFF");
    out.put_u32_le(data_len.saturating_add(36));
    out.put_slice(b"WAVE");

    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(PCM_FORMAT_TAG);
    out.put_u16_le(format.channels);
    out.put_u32_le(format.sample_rate);
    out.put_u32_le(format.byte_rate());
    out.put_u16_le(format.block_align());
    out.put_u16_le(format.bits_per_sample());

    out.put_slice(b"data");
    out.put_u32_le(data_len);
    out.put_slice(pcm);
    out.freeze()
}

/// Fields read back from a canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub riff_size: u32,
    pub format_tag: u16,
    pub format: PcmFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavInfo {
    /// Parses the header layout written by [`pcm_to_wav`]. Returns `None` for
    /// anything else.
    pub fn parse(wav: &[u8]) -> Option<Self> {
        let header = wav.get(..WAV_HEADER_LEN)?;
        if &header[0..4] != b"RIFF"
            || &header[8..12] != b"WAVE"
            || &header[12..16] != b"fmt "
            || &header[36..40] != b"data"
        {
            return None;
        }

        let u16_at = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };

        let bits_per_sample = u16_at(34);
        Some(Self {
            riff_size: u32_at(4),
            format_tag: u16_at(20),
            format: PcmFormat::new(u32_at(24), u16_at(22), bits_per_sample / 8),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample,
            data_len: u32_at(40),
        })
    }
}
