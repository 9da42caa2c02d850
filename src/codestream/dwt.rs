//! Discrete wavelet transforms (ISO/IEC 15444-1 Annex F).
//!
//! Both filters run as in-place lifting on an interleaved signal with
//! whole-sample symmetric extension. The 2D transforms keep the Mallat
//! layout inside a [`Plane`]: after `d` levels the top-left
//! `ceil^d(w) x ceil^d(h)` region holds LL, and the HL/LH/HH bands of every
//! level sit to its right, below it and diagonally.

use super::tile::Plane;
use crate::geometry::Size;
use crate::resolution::reduce;

pub trait Wavelet {
    type Sample: Copy + Default;

    /// Analysis lifting steps on an interleaved signal of two or more samples.
    fn analyze(x: &mut [Self::Sample]);

    /// Exact inverse of [`Wavelet::analyze`] (up to float rounding for 9/7).
    fn synthesize(x: &mut [Self::Sample]);
}

/// Indices of the left and right neighbours of `i` with symmetric extension.
#[inline]
fn mirror(len: usize, i: usize) -> (usize, usize) {
    let left = if i > 0 { i - 1 } else { i + 1 };
    let right = if i + 1 < len { i + 1 } else { i - 1 };
    (left, right)
}

/// Reversible integer 5/3 filter.
pub struct Dwt53;

impl Wavelet for Dwt53 {
    type Sample = i32;

    fn analyze(x: &mut [i32]) {
        let len = x.len();
        // y[2n+1] = x[2n+1] - floor((x[2n] + x[2n+2]) / 2)
        for i in (1..len).step_by(2) {
            let (l, r) = mirror(len, i);
            x[i] -= (x[l] + x[r]) >> 1;
        }
        // y[2n] = x[2n] + floor((y[2n-1] + y[2n+1] + 2) / 4)
        for i in (0..len).step_by(2) {
            let (l, r) = mirror(len, i);
            x[i] += (x[l] + x[r] + 2) >> 2;
        }
    }

    fn synthesize(x: &mut [i32]) {
        let len = x.len();
        for i in (0..len).step_by(2) {
            let (l, r) = mirror(len, i);
            x[i] -= (x[l] + x[r] + 2) >> 2;
        }
        for i in (1..len).step_by(2) {
            let (l, r) = mirror(len, i);
            x[i] += (x[l] + x[r]) >> 1;
        }
    }
}

/// Irreversible floating-point 9/7 filter.
pub struct Dwt97;

impl Dwt97 {
    const ALPHA: f32 = -1.586_134_3;
    const BETA: f32 = -0.052_980_12;
    const GAMMA: f32 = 0.882_911_1;
    const DELTA: f32 = 0.443_506_87;
    const K: f32 = 1.230_174_1;
    const INV_K: f32 = 1.0 / 1.230_174_1;

    fn lift(x: &mut [f32], start: usize, coefficient: f32) {
        let len = x.len();
        for i in (start..len).step_by(2) {
            let (l, r) = mirror(len, i);
            x[i] += coefficient * (x[l] + x[r]);
        }
    }
}

impl Wavelet for Dwt97 {
    type Sample = f32;

    fn analyze(x: &mut [f32]) {
        Self::lift(x, 1, Self::ALPHA);
        Self::lift(x, 0, Self::BETA);
        Self::lift(x, 1, Self::GAMMA);
        Self::lift(x, 0, Self::DELTA);
        for (i, v) in x.iter_mut().enumerate() {
            *v *= if i % 2 == 0 { Self::INV_K } else { Self::K };
        }
    }

    fn synthesize(x: &mut [f32]) {
        for (i, v) in x.iter_mut().enumerate() {
            *v *= if i % 2 == 0 { Self::K } else { Self::INV_K };
        }
        Self::lift(x, 0, -Self::DELTA);
        Self::lift(x, 1, -Self::GAMMA);
        Self::lift(x, 0, -Self::BETA);
        Self::lift(x, 1, -Self::ALPHA);
    }
}

/// Transforms `signal` in place into `[low | high]` order.
fn forward_1d<W: Wavelet>(signal: &mut [W::Sample], scratch: &mut Vec<W::Sample>) {
    let len = signal.len();
    if len < 2 {
        return;
    }
    scratch.clear();
    scratch.extend_from_slice(signal);
    W::analyze(scratch);
    let low_count = len.div_ceil(2);
    for (i, &v) in scratch.iter().enumerate() {
        let target = if i % 2 == 0 { i / 2 } else { low_count + i / 2 };
        signal[target] = v;
    }
}

/// Inverse of [`forward_1d`].
fn inverse_1d<W: Wavelet>(signal: &mut [W::Sample], scratch: &mut Vec<W::Sample>) {
    let len = signal.len();
    if len < 2 {
        return;
    }
    let low_count = len.div_ceil(2);
    scratch.clear();
    scratch.extend((0..len).map(|i| {
        if i % 2 == 0 {
            signal[i / 2]
        } else {
            signal[low_count + i / 2]
        }
    }));
    W::synthesize(scratch);
    signal.copy_from_slice(scratch);
}

/// Applies `levels` decompositions to `plane`.
pub fn forward_2d<W: Wavelet>(plane: &mut Plane<W::Sample>, levels: u32) {
    let full = plane.size();
    let mut scratch = Vec::new();
    let mut column = Vec::new();
    for level in 0..levels {
        let region = reduce(full, level);
        if region.width <= 1 && region.height <= 1 {
            break;
        }
        for y in 0..region.height as usize {
            forward_1d::<W>(&mut plane.row_mut(y)[..region.width as usize], &mut scratch);
        }
        for x in 0..region.width as usize {
            plane.read_column(x, region.height as usize, &mut column);
            forward_1d::<W>(&mut column, &mut scratch);
            plane.write_column(x, &column);
        }
    }
}

/// Undoes decomposition levels `levels` down to `stop_at + 1`, leaving the
/// image at decomposition level `stop_at` in the top-left
/// `reduce(size, stop_at)` region.
pub fn inverse_2d<W: Wavelet>(plane: &mut Plane<W::Sample>, levels: u32, stop_at: u32) {
    let full = plane.size();
    let mut scratch = Vec::new();
    let mut column = Vec::new();
    for level in (stop_at..levels).rev() {
        let region: Size = reduce(full, level);
        if region.width <= 1 && region.height <= 1 {
            continue;
        }
        for x in 0..region.width as usize {
            plane.read_column(x, region.height as usize, &mut column);
            inverse_1d::<W>(&mut column, &mut scratch);
            plane.write_column(x, &column);
        }
        for y in 0..region.height as usize {
            inverse_1d::<W>(&mut plane.row_mut(y)[..region.width as usize], &mut scratch);
        }
    }
}
