use rustfft::{num_complex::Complex, FftPlanner};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Convolution
===========

Convolving a dry signal x (length N) with an impulse response h (length M)
places a scaled copy of h at every input sample and sums them:

    y[n] = Σ_k x[k] · h[n - k]

Output Modes
------------

  full    every partial overlap, length N + M - 1
  same    centred slice of `full`, length max(N, M)
  valid   only complete overlaps, length max(N, M) - min(N, M) + 1

Methods
-------

  direct  O(N·M) nested loop. Fine for short kernels.
  fft     Zero-pad both to a power of two ≥ N + M - 1, multiply spectra,
          inverse transform. O((N + M) log(N + M)).
  auto    direct when the kernel is tiny, fft otherwise.

Both methods produce the same `full` result up to float rounding; the mode
slice is taken afterwards.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvolutionMode {
    #[default]
    Full,
    Same,
    Valid,
}

impl ConvolutionMode {
    pub const NAMES: &'static [&'static str] = &["full", "same", "valid"];

    pub fn name(&self) -> &'static str {
        match self {
            ConvolutionMode::Full => "full",
            ConvolutionMode::Same => "same",
            ConvolutionMode::Valid => "valid",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "full" => Some(ConvolutionMode::Full),
            "same" => Some(ConvolutionMode::Same),
            "valid" => Some(ConvolutionMode::Valid),
            _ => None,
        }
    }

    /// Output length for a signal of `n` and a kernel of `m` samples.
    pub fn output_len(&self, n: usize, m: usize) -> usize {
        if n == 0 || m == 0 {
            return 0;
        }
        match self {
            ConvolutionMode::Full => n + m - 1,
            ConvolutionMode::Same => n.max(m),
            ConvolutionMode::Valid => n.max(m) - n.min(m) + 1,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvolutionMethod {
    Direct,
    Fft,
    #[default]
    Auto,
}

impl ConvolutionMethod {
    pub const NAMES: &'static [&'static str] = &["direct", "fft", "auto"];

    pub fn name(&self) -> &'static str {
        match self {
            ConvolutionMethod::Direct => "direct",
            ConvolutionMethod::Fft => "fft",
            ConvolutionMethod::Auto => "auto",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "direct" => Some(ConvolutionMethod::Direct),
            "fft" => Some(ConvolutionMethod::Fft),
            "auto" => Some(ConvolutionMethod::Auto),
            _ => None,
        }
    }
}

const DIRECT_KERNEL_LIMIT: usize = 64;

pub fn convolve(
    signal: &[f32],
    kernel: &[f32],
    mode: ConvolutionMode,
    method: ConvolutionMethod,
) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }

    let full = match method {
        ConvolutionMethod::Direct => convolve_direct(signal, kernel),
        ConvolutionMethod::Fft => convolve_fft(signal, kernel),
        ConvolutionMethod::Auto => {
            if signal.len().min(kernel.len()) <= DIRECT_KERNEL_LIMIT {
                convolve_direct(signal, kernel)
            } else {
                convolve_fft(signal, kernel)
            }
        }
    };

    let out_len = mode.output_len(signal.len(), kernel.len());
    let start = match mode {
        ConvolutionMode::Full => 0,
        ConvolutionMode::Same => (full.len() - out_len) / 2,
        ConvolutionMode::Valid => signal.len().min(kernel.len()) - 1,
    };
    full[start..start + out_len].to_vec()
}

fn convolve_direct(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f64; signal.len() + kernel.len() - 1];
    for (i, &x) in signal.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &h) in kernel.iter().enumerate() {
            out[i + j] += x as f64 * h as f64;
        }
    }
    out.into_iter().map(|v| v as f32).collect()
}

fn convolve_fft(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let full_len = signal.len() + kernel.len() - 1;
    let size = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let mut a = padded(signal, size);
    let mut b = padded(kernel, size);
    forward.process(&mut a);
    forward.process(&mut b);

    for (x, y) in a.iter_mut().zip(&b) {
        *x *= *y;
    }
    inverse.process(&mut a);

    let scale = 1.0 / size as f64;
    a[..full_len].iter().map(|c| (c.re * scale) as f32).collect()
}

fn padded(samples: &[f32], size: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); size];
    for (slot, &s) in out.iter_mut().zip(samples) {
        slot.re = s as f64;
    }
    out
}

/// Non-negative-lag autocorrelation via FFT, `r[k] = Σ x[n] x[n + k]`.
pub fn autocorrelate(signal: &[f32]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let size = (2 * signal.len()).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let mut spectrum = padded(signal, size);
    forward.process(&mut spectrum);
    for bin in spectrum.iter_mut() {
        *bin = Complex::new(bin.norm_sqr(), 0.0);
    }
    inverse.process(&mut spectrum);

    let scale = 1.0 / size as f64;
    spectrum[..signal.len()]
        .iter()
        .map(|c| c.re * scale)
        .collect()
}
