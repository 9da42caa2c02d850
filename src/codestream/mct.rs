//! Multiple component transforms (ISO/IEC 15444-1 Annex G) applied to the
//! first three components.

pub fn forward_rct(c0: &mut [i32], c1: &mut [i32], c2: &mut [i32]) {
    for ((r, g), b) in c0.iter_mut().zip(c1.iter_mut()).zip(c2.iter_mut()) {
        let y = (*r + 2 * *g + *b) >> 2;
        let cb = *b - *g;
        let cr = *r - *g;
        (*r, *g, *b) = (y, cb, cr);
    }
}

pub fn inverse_rct(c0: &mut [i32], c1: &mut [i32], c2: &mut [i32]) {
    for ((y, cb), cr) in c0.iter_mut().zip(c1.iter_mut()).zip(c2.iter_mut()) {
        let g = *y - ((*cb + *cr) >> 2);
        let r = *cr + g;
        let b = *cb + g;
        (*y, *cb, *cr) = (r, g, b);
    }
}

pub fn forward_ict(c0: &mut [f32], c1: &mut [f32], c2: &mut [f32]) {
    for ((r, g), b) in c0.iter_mut().zip(c1.iter_mut()).zip(c2.iter_mut()) {
        let y = 0.299 * *r + 0.587 * *g + 0.114 * *b;
        let cb = -0.16875 * *r - 0.33126 * *g + 0.5 * *b;
        let cr = 0.5 * *r - 0.41869 * *g - 0.08131 * *b;
        (*r, *g, *b) = (y, cb, cr);
    }
}

pub fn inverse_ict(c0: &mut [f32], c1: &mut [f32], c2: &mut [f32]) {
    for ((y, cb), cr) in c0.iter_mut().zip(c1.iter_mut()).zip(c2.iter_mut()) {
        let r = *y + 1.402 * *cr;
        let g = *y - 0.34413 * *cb - 0.71414 * *cr;
        let b = *y + 1.772 * *cb;
        (*y, *cb, *cr) = (r, g, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rct_is_lossless() {
        let r0 = vec![-128, 0, 127, 55, -3];
        let g0 = vec![127, -128, 0, 12, -90];
        let b0 = vec![5, 66, -128, 127, 0];
        let (mut r, mut g, mut b) = (r0.clone(), g0.clone(), b0.clone());
        forward_rct(&mut r, &mut g, &mut b);
        inverse_rct(&mut r, &mut g, &mut b);
        assert_eq!((r, g, b), (r0, g0, b0));
    }

    #[test]
    fn ict_round_trips_closely() {
        let (mut r, mut g, mut b) = (vec![100.0f32], vec![-20.0f32], vec![60.0f32]);
        forward_ict(&mut r, &mut g, &mut b);
        inverse_ict(&mut r, &mut g, &mut b);
        assert!((r[0] - 100.0).abs() < 0.05);
        assert!((g[0] + 20.0).abs() < 0.05);
        assert!((b[0] - 60.0).abs() < 0.05);
    }
}
