//! WAV fixture generation
//!
//! Fixtures are built in memory and served through `MemoryAssets`, so tests
//! never touch the filesystem unless they test a directory source.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Low rate keeps decoding and analysis cheap
pub const TEST_SAMPLE_RATE: u32 = 8000;

fn spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn encode(samples: impl Iterator<Item = f32>) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec()).unwrap();
        for sample in samples {
            writer
                .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes
}

fn frames(duration_ms: u64) -> usize {
    (TEST_SAMPLE_RATE as u64 * duration_ms / 1000) as usize
}

/// Mono 16-bit sine
pub fn sine_wav(duration_ms: u64, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    encode((0..frames(duration_ms)).map(move |n| {
        amplitude * (2.0 * PI * frequency_hz * n as f32 / TEST_SAMPLE_RATE as f32).sin()
    }))
}

/// Mono 16-bit silence
pub fn silent_wav(duration_ms: u64) -> Vec<u8> {
    encode(std::iter::repeat(0.0).take(frames(duration_ms)))
}
