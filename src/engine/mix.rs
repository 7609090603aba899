use log::debug;

/// Growable overlap-add target for one render session.
///
/// Writes are additive and the buffer only ever grows: a contribution that
/// runs past the end extends the buffer with silence first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MixBuffer {
    samples: Vec<f32>,
    framerate: u32,
}

impl MixBuffer {
    pub fn new(framerate: u32) -> Self {
        Self::with_len(0, framerate)
    }

    /// Pre-sized to `len` samples of silence.
    pub fn with_len(len: usize, framerate: u32) -> Self {
        Self {
            samples: vec![0.0; len],
            framerate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Grow to at least `len` samples. Returns whether the buffer grew.
    pub fn ensure_len(&mut self, len: usize) -> bool {
        if len <= self.samples.len() {
            return false;
        }
        self.samples.resize(len, 0.0);
        true
    }

    /// `buffer[offset + i] += contribution[i]`, growing first if needed.
    pub fn add_at(&mut self, offset: usize, contribution: &[f32]) {
        let end = offset + contribution.len();
        let before = self.samples.len();
        if self.ensure_len(end) {
            debug!("mix buffer grown from {before} to {end} samples");
        }
        for (slot, &s) in self.samples[offset..end].iter_mut().zip(contribution) {
            *slot += s;
        }
    }
}

/// Re-lay interleaved `from`-channel audio as `to` channels, frame by frame.
///
/// Output channel `k` copies input channel `k % from`, so mono is duplicated
/// into every output channel and equal counts pass through unchanged. A
/// trailing partial frame is dropped.
pub fn spread_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = from.max(1) as usize;
    let to = to.max(1) as usize;
    if from == to {
        return samples.to_vec();
    }
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        out.extend((0..to).map(|k| frame[k % from]));
    }
    out
}
