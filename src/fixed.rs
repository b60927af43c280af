//! Q15 fixed-point primitives.
//!
//! One sign bit, 15 fractional bits: representable range [-1.0, 0.999969...].
//! Every operation is total over the 16-bit domain; results saturate instead
//! of wrapping or trapping.

pub const Q15_MIN: i16 = i16::MIN;
pub const Q15_MAX: i16 = i16::MAX;
pub const Q15_SCALE: f64 = 32768.0;

#[inline(always)]
fn clamp_i32(v: i32) -> i16 {
    if v > Q15_MAX as i32 {
        Q15_MAX
    } else if v < Q15_MIN as i32 {
        Q15_MIN
    } else {
        v as i16
    }
}

/// Convert a float to Q15 with round-to-nearest and saturation.
#[inline(always)]
pub fn to_q15(x: f64) -> i16 {
    let scaled = (x * Q15_SCALE).round();
    if scaled >= Q15_MAX as f64 {
        Q15_MAX
    } else if scaled <= Q15_MIN as f64 {
        Q15_MIN
    } else {
        scaled as i16
    }
}

#[inline(always)]
pub fn to_f64(q: i16) -> f64 {
    q as f64 / Q15_SCALE
}

#[inline(always)]
pub fn sat_add(a: i16, b: i16) -> i16 {
    clamp_i32(a as i32 + b as i32)
}

#[inline(always)]
pub fn sat_sub(a: i16, b: i16) -> i16 {
    clamp_i32(a as i32 - b as i32)
}

/// Q15 multiply: widen to a 32-bit product, shift right 15, saturate.
#[inline(always)]
pub fn sat_mul(a: i16, b: i16) -> i16 {
    clamp_i32((a as i32 * b as i32) >> 15)
}

/// Q15 divide: widen the dividend and pre-shift left 15. Division by zero
/// returns the saturation value carrying the dividend's sign.
#[inline(always)]
pub fn sat_div(a: i16, b: i16) -> i16 {
    if b == 0 {
        return if a < 0 { Q15_MIN } else { Q15_MAX };
    }
    clamp_i32(((a as i32) << 15) / b as i32)
}

pub fn quantize(data: &[f64]) -> Vec<i16> {
    data.iter().map(|&x| to_q15(x)).collect()
}

pub fn dequantize(data: &[i16]) -> Vec<f64> {
    data.iter().map(|&q| to_f64(q)).collect()
}
