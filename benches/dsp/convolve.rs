//! Benchmarks for direct vs FFT convolution.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::dsp::convolve::{convolve, ConvolutionMethod, ConvolutionMode};

pub fn bench_convolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/convolve");

    let signal: Vec<f32> = (0..8_192).map(|i| (i as f32 * 0.05).sin()).collect();

    for &kernel_len in &[32usize, 256, 2_048] {
        let kernel: Vec<f32> = (0..kernel_len)
            .map(|i| (-(i as f32) / (kernel_len as f32 / 4.0)).exp())
            .collect();

        // Direct gets slow fast; skip the largest kernel
        if kernel_len <= 256 {
            group.bench_with_input(BenchmarkId::new("direct", kernel_len), &kernel_len, |b, _| {
                b.iter(|| {
                    convolve(
                        black_box(&signal),
                        black_box(&kernel),
                        ConvolutionMode::Full,
                        ConvolutionMethod::Direct,
                    )
                })
            });
        }

        group.bench_with_input(BenchmarkId::new("fft", kernel_len), &kernel_len, |b, _| {
            b.iter(|| {
                convolve(
                    black_box(&signal),
                    black_box(&kernel),
                    ConvolutionMode::Full,
                    ConvolutionMethod::Fft,
                )
            })
        });
    }

    group.finish();
}
