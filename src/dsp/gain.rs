//! Whole-buffer level utilities: gain, peak normalization and a simple
//! look-ahead segment compressor.

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

pub fn apply_gain(samples: &mut [f32], gain: f32) {
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Scale so the absolute peak equals `target`. Silent buffers are left alone.
pub fn normalize_peak(samples: &mut [f32], target: f32) {
    let p = peak(samples);
    if p > 0.0 {
        apply_gain(samples, target / p);
    }
}

/*
Segment Compressor
==================

The buffer is cut into fixed-size segments (the last one may be short). Each
segment boundary gets a gain factor:

    f[j] = min(1, threshold / max(peak[j-1], peak[j]))

looking at the segments on both sides of the boundary. Inside segment i the
gain ramps linearly from f[i] to f[i+1]. Both ends of every ramp already
account for that segment's own peak, so no output sample exceeds the
threshold, and gain changes are spread across a whole segment instead of
clicking on.
*/

/// Compress `input` so no sample exceeds `threshold`. Returns the output and
/// the per-boundary gain factors.
pub fn compress_segments(
    input: &[f32],
    segment_size: usize,
    threshold: f32,
) -> (Vec<f32>, Vec<f32>) {
    let segment_size = segment_size.max(1);
    let peaks: Vec<f32> = input.chunks(segment_size).map(peak).collect();
    if peaks.is_empty() {
        return (Vec::new(), vec![1.0]);
    }

    let factor = |level: f32| {
        if level > threshold && level > 0.0 {
            threshold / level
        } else {
            1.0
        }
    };
    let factors: Vec<f32> = (0..=peaks.len())
        .map(|j| {
            let left = if j > 0 { peaks[j - 1] } else { 0.0 };
            let right = peaks.get(j).copied().unwrap_or(0.0);
            factor(left.max(right))
        })
        .collect();

    let mut output = Vec::with_capacity(input.len());
    for (i, segment) in input.chunks(segment_size).enumerate() {
        let (from, to) = (factors[i], factors[i + 1]);
        let steps = segment.len().saturating_sub(1).max(1) as f32;
        for (k, &s) in segment.iter().enumerate() {
            let g = from + (to - from) * (k as f32 / steps);
            output.push(s * g);
        }
    }
    (output, factors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sets_peak() {
        let mut buf = vec![0.1, -0.4, 0.2];
        normalize_peak(&mut buf, 0.8);
        assert!((peak(&buf) - 0.8).abs() < 1e-6);
        assert!((buf[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_silence_alone() {
        let mut buf = vec![0.0; 8];
        normalize_peak(&mut buf, 1.0);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn compressor_keeps_quiet_audio_untouched() {
        let input: Vec<f32> = (0..1234).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let (output, factors) = compress_segments(&input, 500, 1.0);
        assert_eq!(output, input);
        assert!(factors.iter().all(|&f| f == 1.0));
    }

    #[test]
    fn compressor_caps_loud_segments() {
        let mut input = vec![0.5f32; 2000];
        for s in &mut input[700..900] {
            *s = 3.0;
        }
        let (output, _) = compress_segments(&input, 500, 1.0);
        assert_eq!(output.len(), input.len());
        assert!(peak(&output) <= 1.0 + 1e-6, "peak {}", peak(&output));
        // Far from the loud section the signal is unchanged
        assert!((output[1999] - 0.5).abs() < 1e-6);
    }
}
