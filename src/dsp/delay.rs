/// Circular delay line with integer and fractional reads.
///
/// Sized at construction for the longest delay the caller will ask for. Reads
/// past the written history return silence, so a freshly built line behaves
/// as if it had been fed zeros forever.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    written: usize,
}

impl DelayLine {
    /// Room for delays up to `max_delay_samples` (inclusive).
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples + 2],
            write_pos: 0,
            written: 0,
        }
    }

    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        self.written = self.written.saturating_add(1);
    }

    /// Sample written `delay` writes ago (1 = the most recent write).
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        if delay == 0 || delay > self.written || delay >= len {
            return 0.0;
        }
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Linearly interpolated read between the two nearest whole delays.
    pub fn read_interpolated(&self, delay: f32) -> f32 {
        let delay = delay.max(0.0);
        let whole = delay.floor();
        let frac = delay - whole;
        let a = self.read(whole as usize);
        let b = self.read(whole as usize + 1);
        a + (b - a) * frac
    }

    /// Write `sample` and return the value `delay_samples` behind it.
    pub fn next_sample(&mut self, sample: f32, delay_samples: usize) -> f32 {
        self.write(sample);
        if delay_samples == 0 {
            sample
        } else {
            self.read(delay_samples + 1)
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, delay_samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_shifts_by_delay() {
        let mut line = DelayLine::new(8);
        let mut buf = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        line.render(&mut buf, 2);
        assert_eq!(buf, [0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn reads_beyond_history_are_silent() {
        let mut line = DelayLine::new(16);
        line.write(0.5);
        assert_eq!(line.read(1), 0.5);
        assert_eq!(line.read(2), 0.0);
        assert_eq!(line.read(100), 0.0);
    }

    #[test]
    fn interpolated_read_blends_neighbours() {
        let mut line = DelayLine::new(4);
        line.write(0.0);
        line.write(1.0);
        // delay 1 = 1.0, delay 2 = 0.0
        assert!((line.read_interpolated(1.25) - 0.75).abs() < 1e-6);
        assert!((line.read_interpolated(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wraps_around_capacity() {
        let mut line = DelayLine::new(3);
        for i in 0..20 {
            line.write(i as f32);
        }
        assert_eq!(line.read(1), 19.0);
        assert_eq!(line.read(3), 17.0);
    }
}
