use log::debug;

use super::mix::{spread_channels, MixBuffer};
use super::scheduler::RenderedTrack;
use crate::dsp::gain::compress_segments;
use crate::error::{Result, SynthError};
use crate::io::sink::AudioSink;

/// One rendered track on the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerStrip {
    pub track: RenderedTrack,
    pub volume: f32,
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Compression {
    segment_size: usize,
    threshold: f32,
}

/// Sums rendered tracks into one buffer for an audio sink.
///
/// The mix has as many channels as the widest track; narrower tracks are
/// spread frame by frame before summing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMixer {
    framerate: u32,
    channels: u16,
    strips: Vec<MixerStrip>,
    compression: Option<Compression>,
}

impl TrackMixer {
    pub fn new(framerate: u32) -> Self {
        Self {
            framerate,
            channels: 1,
            strips: Vec::new(),
            compression: None,
        }
    }

    /// Compress the mixdown so no sample exceeds `threshold`.
    pub fn with_compression(mut self, segment_size: usize, threshold: f32) -> Self {
        self.compression = Some(Compression {
            segment_size,
            threshold,
        });
        self
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    /// Channel count of [`mixdown`](Self::mixdown).
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Add a track at unity volume. Returns its strip index.
    pub fn add_track(&mut self, track: RenderedTrack) -> Result<usize> {
        if track.framerate != self.framerate {
            return Err(SynthError::invalid(
                "framerate",
                format!(
                    "track `{}` is {} Hz, mixer runs at {} Hz",
                    track.title, track.framerate, self.framerate
                ),
            ));
        }
        self.channels = self.channels.max(track.channels);
        self.strips.push(MixerStrip {
            track,
            volume: 1.0,
            muted: false,
        });
        Ok(self.strips.len() - 1)
    }

    pub fn strips(&self) -> &[MixerStrip] {
        &self.strips
    }

    pub fn set_volume(&mut self, index: usize, volume: f32) {
        if let Some(strip) = self.strips.get_mut(index) {
            strip.volume = volume.max(0.0);
        }
    }

    pub fn set_muted(&mut self, index: usize, muted: bool) {
        if let Some(strip) = self.strips.get_mut(index) {
            strip.muted = muted;
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<RenderedTrack> {
        if index >= self.strips.len() {
            return None;
        }
        let track = self.strips.remove(index).track;
        self.channels = self.strips.iter().map(|s| s.track.channels).max().unwrap_or(1);
        Some(track)
    }

    /// Sum of every unmuted strip, as long as the longest track. Interleaved
    /// when [`channels`](Self::channels) is above one.
    pub fn mixdown(&self) -> Vec<f32> {
        let channels = self.channels.max(1);
        let longest = self
            .strips
            .iter()
            .map(|s| s.track.frames() * channels as usize)
            .max()
            .unwrap_or(0);
        let mut mix = MixBuffer::with_len(longest, self.framerate);

        for strip in self.strips.iter().filter(|s| !s.muted) {
            let mut samples = spread_channels(&strip.track.samples, strip.track.channels, channels);
            for s in samples.iter_mut() {
                *s *= strip.volume;
            }
            mix.add_at(0, &samples);
        }

        let samples = mix.into_samples();
        match self.compression {
            Some(c) => {
                let (compressed, factors) = compress_segments(&samples, c.segment_size, c.threshold);
                debug!(
                    "mixdown compressed, lowest segment gain {:.3}",
                    factors.iter().copied().fold(1.0, f32::min)
                );
                compressed
            }
            None => samples,
        }
    }

    /// Mix down and hand the result to `sink`.
    pub fn render_to(&self, sink: &mut dyn AudioSink) -> Result<()> {
        let samples = self.mixdown();
        sink.consume(&samples, self.framerate, self.channels)
    }
}
