//! Dead-zone scalar quantization for the irreversible path.

/// q = sign(x) * floor(|x| / step)
pub fn quantize_scalar(coeff: f32, step: f32) -> i32 {
    let magnitude = (coeff.abs() / step).floor() as i32;
    if coeff < 0.0 { -magnitude } else { magnitude }
}

/// Mid-point reconstruction: (|q| + 0.5) * step * sign(q), zero stays zero.
pub fn dequantize_scalar(q: i32, step: f32) -> f32 {
    if q == 0 {
        return 0.0;
    }
    let magnitude = (q.unsigned_abs() as f32 + 0.5) * step;
    if q < 0 { -magnitude } else { magnitude }
}

/// Packs `step` into the 16-bit SPqcd form `exponent << 11 | mantissa`,
/// where step = 2^(range_bits - exponent) * (1 + mantissa / 2^11).
pub fn encode_step(step: f32, range_bits: u8) -> u16 {
    let exponent = (range_bits as i32 - step.log2().floor() as i32).clamp(0, 31);
    let base = 2f32.powi(range_bits as i32 - exponent);
    let mantissa = ((step / base - 1.0) * 2048.0).round().clamp(0.0, 2047.0) as u16;
    ((exponent as u16) << 11) | mantissa
}

pub fn decode_step(value: u16, range_bits: u8) -> f32 {
    let exponent = (value >> 11) as i32;
    let mantissa = (value & 0x7FF) as f32;
    2f32.powi(range_bits as i32 - exponent) * (1.0 + mantissa / 2048.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_is_dead_zone() {
        // 10.5 / 2.0 = 5.25 -> 5
        assert_eq!(quantize_scalar(10.5, 2.0), 5);
        assert_eq!(quantize_scalar(-10.5, 2.0), -5);
        assert_eq!(quantize_scalar(1.9, 2.0), 0);
        assert_eq!(dequantize_scalar(5, 2.0), 11.0);
        assert_eq!(dequantize_scalar(-5, 2.0), -11.0);
        assert_eq!(dequantize_scalar(0, 2.0), 0.0);
    }

    #[test]
    fn step_survives_qcd_packing() {
        for &step in &[1.0f32, 0.5, 0.005, 3.75, 17.0] {
            let decoded = decode_step(encode_step(step, 8), 8);
            assert!((decoded - step).abs() / step < 1e-3, "{step} -> {decoded}");
        }
        assert_eq!(encode_step(1.0, 8), 8 << 11);
    }
}
