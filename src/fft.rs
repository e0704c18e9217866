// src/fft.rs
//
// 2D complex FFT on row-major (x fastest) buffers, built from rustfft 1D plans:
// rows first, then columns through a scratch buffer.
//
// Convention: forward is unnormalised, inverse applies 1/(nx*ny), so
// f(x) = (1/N) Σ F(k) e^{+i k x} and ∂/∂x ↔ multiplication by i k.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub type C64 = Complex<f64>;

pub struct Fft2 {
    pub nx: usize,
    pub ny: usize,
    fwd_x: Arc<dyn Fft<f64>>,
    inv_x: Arc<dyn Fft<f64>>,
    fwd_y: Arc<dyn Fft<f64>>,
    inv_y: Arc<dyn Fft<f64>>,
    col_buf: Vec<C64>,
}

impl Fft2 {
    pub fn new(nx: usize, ny: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            nx,
            ny,
            fwd_x: planner.plan_fft_forward(nx),
            inv_x: planner.plan_fft_inverse(nx),
            fwd_y: planner.plan_fft_forward(ny),
            inv_y: planner.plan_fft_inverse(ny),
            col_buf: vec![C64::new(0.0, 0.0); ny],
        }
    }

    pub fn forward(&mut self, data: &mut [C64]) {
        let (fx, fy) = (Arc::clone(&self.fwd_x), Arc::clone(&self.fwd_y));
        self.process(data, &fx, &fy);
    }

    /// Inverse transform including the 1/(nx*ny) normalisation.
    pub fn inverse(&mut self, data: &mut [C64]) {
        let (fx, fy) = (Arc::clone(&self.inv_x), Arc::clone(&self.inv_y));
        self.process(data, &fx, &fy);

        // rustfft is unnormalised -> scale
        let scale = 1.0 / (self.nx * self.ny) as f64;
        for v in data.iter_mut() {
            *v *= scale;
        }
    }

    fn process(&mut self, data: &mut [C64], fft_x: &Arc<dyn Fft<f64>>, fft_y: &Arc<dyn Fft<f64>>) {
        let (nx, ny) = (self.nx, self.ny);
        debug_assert_eq!(data.len(), nx * ny);

        for row in data.chunks_exact_mut(nx) {
            fft_x.process(row);
        }

        for x in 0..nx {
            for y in 0..ny {
                self.col_buf[y] = data[y * nx + x];
            }
            fft_y.process(&mut self.col_buf);
            for y in 0..ny {
                data[y * nx + x] = self.col_buf[y];
            }
        }
    }
}

/// Real samples to complex.
pub fn to_complex(data: &[f64]) -> Vec<C64> {
    data.iter().map(|&v| C64::new(v, 0.0)).collect()
}

/// Angular wavenumbers 2π f for an n-point transform with spacing d,
/// in rustfft bin order (0, 1, ..., n/2-ish, then negatives).
pub fn angular_wavenumbers(n: usize, d: f64) -> Vec<f64> {
    let l = n as f64 * d;
    (0..n)
        .map(|i| {
            let s = if i <= (n - 1) / 2 { i as isize } else { i as isize - n as isize };
            2.0 * PI * s as f64 / l
        })
        .collect()
}

/// Move the zero-frequency bin to the centre of a row-major nx × ny array.
pub fn fftshift<T: Copy>(data: &[T], nx: usize, ny: usize) -> Vec<T> {
    let mut out = data.to_vec();
    for j in 0..ny {
        for i in 0..nx {
            let si = (i + nx / 2) % nx;
            let sj = (j + ny / 2) % ny;
            out[sj * nx + si] = data[j * nx + i];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_inverse_recovers_input() {
        let (nx, ny) = (6, 4);
        let orig: Vec<f64> = (0..nx * ny).map(|k| (k as f64 * 0.37).sin()).collect();
        let mut buf = to_complex(&orig);
        let mut fft = Fft2::new(nx, ny);
        fft.forward(&mut buf);
        fft.inverse(&mut buf);
        for (a, b) in orig.iter().zip(buf.iter()) {
            assert!((a - b.re).abs() < 1e-12 && b.im.abs() < 1e-12);
        }
    }

    #[test]
    fn wavenumbers_wrap_to_negative() {
        let k = angular_wavenumbers(4, 1.0);
        let q = 2.0 * PI / 4.0;
        assert_eq!(k[0], 0.0);
        assert!((k[1] - q).abs() < 1e-15);
        // n even: bin n/2 is treated as negative Nyquist
        assert!((k[2] + 2.0 * q).abs() < 1e-15);
        assert!((k[3] + q).abs() < 1e-15);
    }

    #[test]
    fn fftshift_centres_dc() {
        let data = vec![1, 0, 0, 0, 0, 0];
        let s = fftshift(&data, 3, 2);
        // DC moves to (1, 1)
        assert_eq!(s[1 * 3 + 1], 1);
    }
}
