use std::io::{Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::error::Result;

/// Decoded PCM, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct WavData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl WavData {
    /// Average the channels of each frame into one mono stream.
    pub fn mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.channels.max(1) as f64 * self.sample_rate as f64)
    }
}

/// Clip to [-1, 1] and quantize to 16-bit signed, `round(x * 32767)`.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

pub fn pcm16_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels: channels.max(1),
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write interleaved samples as 16-bit PCM to any seekable writer.
pub fn write_wav_to<W: Write + Seek>(
    writer: W,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let mut wav = WavWriter::new(writer, pcm16_spec(sample_rate, channels))?;
    for &s in samples {
        wav.write_sample(quantize_i16(s))?;
    }
    wav.finalize()?;
    Ok(())
}

pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let path = path.as_ref();
    let mut wav = WavWriter::create(path, pcm16_spec(sample_rate, channels))?;
    for &s in samples {
        wav.write_sample(quantize_i16(s))?;
    }
    wav.finalize()?;
    debug!(
        "wrote {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        path.display()
    );
    Ok(())
}

/// Decode integer or float PCM from any reader into [-1, 1] floats.
pub fn read_wav_from<R: Read>(reader: R) -> Result<WavData> {
    let reader = WavReader::new(reader)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(WavData {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

pub fn read_wav(path: impl AsRef<Path>) -> Result<WavData> {
    let file = std::fs::File::open(path.as_ref())?;
    read_wav_from(std::io::BufReader::new(file))
}
