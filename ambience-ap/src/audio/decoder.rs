//! WAV decoding
//!
//! Turns fetched asset bytes into an [`AudioBuffer`]. Integer formats are
//! normalized to -1.0..1.0 by their bit depth.

use crate::audio::buffer::AudioBuffer;
use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use tracing::debug;

/// Decode a complete WAV file held in memory.
///
/// `asset` names the source in error messages.
pub fn decode_wav(asset: &str, bytes: &[u8]) -> Result<AudioBuffer> {
    let decode_err = |reason: String| Error::Decode {
        asset: asset.to_string(),
        reason,
    };

    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| decode_err(e.to_string()))?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?
        }
        (format, bits) => {
            return Err(decode_err(format!(
                "Unsupported sample format {:?} at {} bits",
                format, bits
            )))
        }
    };

    debug!(
        "Decoded '{}': {} Hz, {} channels, {} samples",
        asset,
        spec.sample_rate,
        spec.channels,
        samples.len()
    );

    AudioBuffer::from_interleaved(&samples, spec.channels, spec.sample_rate)
        .map_err(|e| decode_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn encode_i16(samples: &[i16], channels: u16) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_int16_stereo() {
        let bytes = encode_i16(&[16384, -16384, 0, 32767], 2);
        let buffer = decode_wav("test", &bytes).unwrap();

        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2);
        assert!((buffer.sample(0, 0) - 0.5).abs() < 1e-6);
        assert!((buffer.sample(1, 0) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_float32() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.write_sample(-0.75f32).unwrap();
            writer.finalize().unwrap();
        }

        let buffer = decode_wav("float", &cursor.into_inner()).unwrap();
        assert_eq!(buffer.channel(0).unwrap(), &[0.25, -0.75]);
    }

    #[test]
    fn test_corrupt_data_is_decode_error() {
        let result = decode_wav("broken", b"definitely not a riff header");
        match result {
            Err(Error::Decode { asset, .. }) => assert_eq!(asset, "broken"),
            other => panic!("Expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_wav_is_decode_error() {
        let bytes = encode_i16(&[], 1);
        assert!(matches!(decode_wav("empty", &bytes), Err(Error::Decode { .. })));
    }
}
