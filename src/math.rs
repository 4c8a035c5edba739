use std::f32::consts::LN_2;
use std::mem::size_of;

/// The minimum number of bits required to store a positive integer in binary, or 0 for a non-positive integer.
#[inline(always)]
pub(crate) fn ilog(x: u32) -> u32 {
    (size_of::<u32>() * 8) as u32 - x.leading_zeros()
}

/// Same as `ilog`, but for 64 bit integers.
#[inline(always)]
pub(crate) fn ilog64(x: u64) -> u32 {
    (size_of::<u64>() * 8) as u32 - x.leading_zeros()
}

/// Fast version for exp2.
#[inline(always)]
pub(crate) fn fast_exp2(x: f32) -> f32 {
    (x * LN_2).exp()
}

/// This is a cos() approximation designed to be bit-exact on any platform. Bit exactness
/// with this approximation is important because it has an impact on the bit allocation.
///
/// Valid for inputs in (0, 16384) exclusive; the endpoints are special-cased
/// by the stereo band decoder.
#[inline(always)]
pub(crate) fn bitexact_cos(x: i16) -> i16 {
    let x2 = i32::from(x) * i32::from(x);
    let y = ((x2 + 4096) >> 13) as i16;
    1 + (32767 - y) + frac_mul16(y, -7651 + frac_mul16(y, 8277 + frac_mul16(-626, y)))
}

/// This is designed to be bit-exact on any platform.
#[inline(always)]
pub(crate) fn bitexact_log2tan(isin: i32, icos: i32) -> i32 {
    let ls = ilog(isin as u32) as i32;
    let lc = ilog(icos as u32) as i32;

    let icos = (icos << (15 - lc)) as i16;
    let isin = (isin << (15 - ls)) as i16;

    let a = i32::from(frac_mul16(isin, frac_mul16(isin, -2597) + 7932));
    let b = i32::from(frac_mul16(icos, frac_mul16(icos, -2597) + 7932));
    (ls - lc) * (1 << 11) + a - b
}

#[inline(always)]
pub(crate) fn frac_mul16(rhs: i16, lhs: i16) -> i16 {
    let x = i32::from(rhs) * i32::from(lhs);
    ((16384 + x) >> 15) as i16
}
