use std::path::PathBuf;

use log::info;

use super::wav::write_wav;
use crate::error::Result;

/// Receives a finished track. Playback and transport live behind this trait.
pub trait AudioSink {
    fn consume(&mut self, samples: &[f32], framerate: u32, channels: u16) -> Result<()>;
}

/// Writes every consumed buffer to one 16-bit WAV file, replacing it.
#[derive(Debug, Clone)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl AudioSink for WavFileSink {
    fn consume(&mut self, samples: &[f32], framerate: u32, channels: u16) -> Result<()> {
        write_wav(&self.path, samples, framerate, channels)?;
        info!(
            "rendered {:.2}s to {}",
            samples.len() as f64 / (framerate.max(1) as f64 * channels.max(1) as f64),
            self.path.display()
        );
        Ok(())
    }
}

/// Keeps consumed buffers in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub buffers: Vec<(Vec<f32>, u32, u16)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&(Vec<f32>, u32, u16)> {
        self.buffers.last()
    }
}

impl AudioSink for MemorySink {
    fn consume(&mut self, samples: &[f32], framerate: u32, channels: u16) -> Result<()> {
        self.buffers.push((samples.to_vec(), framerate, channels));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::wav::read_wav;

    #[test]
    fn memory_sink_keeps_everything() {
        let mut sink = MemorySink::new();
        sink.consume(&[0.1, 0.2], 8_000, 1).unwrap();
        sink.consume(&[0.3], 16_000, 1).unwrap();
        assert_eq!(sink.buffers.len(), 2);
        assert_eq!(sink.last().map(|b| b.1), Some(16_000));
    }

    #[test]
    fn wav_sink_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "saavy_render_sink_{}.wav",
            std::process::id()
        ));
        let mut sink = WavFileSink::new(&path);
        sink.consume(&[0.0, 0.5, -0.5], 8_000, 1).unwrap();
        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.samples.len(), 3);
        assert_eq!(wav.sample_rate, 8_000);
        let _ = std::fs::remove_file(&path);
    }
}
