//! Wire-level numeric codec (§4.2).
//!
//! Two fixed-width encodings, both packed into a single little-endian `u64`
//! so every wire field is the same size regardless of which one is used:
//!
//! - [`encode_change`]/[`decode_change`] — signed values in `[-1, 1]`, used
//!   for prices, displacements and imbalances.
//! - [`encode_orderbook`]/[`decode_orderbook`] — signed values in
//!   `[-1024, 1024)`, used for volumes and order counts.
//!
//! Both are exact on zero (and on any magnitude below [`ZERO_EPSILON`]) and
//! symmetric around zero: encoding `-v` differs from encoding `v` only in
//! the sign bit.

use crate::errors::CodecError;

/// Magnitudes below this are encoded (and decoded) as exactly zero.
pub const ZERO_EPSILON: f64 = 1e-15;

const CHANGE_MANTISSA_BITS: u32 = 63;
const CHANGE_MANTISSA_MAX: f64 = ((1u64 << CHANGE_MANTISSA_BITS) - 1) as f64;
const CHANGE_SIGN_BIT: u64 = 1u64 << 63;
const CHANGE_MANTISSA_MASK: u64 = (1u64 << 63) - 1;

const OB_FRAC_BITS: u32 = 53;
const OB_FRAC_MAX: f64 = ((1u64 << OB_FRAC_BITS) - 1) as f64;
const OB_FRAC_MASK: u64 = (1u64 << OB_FRAC_BITS) - 1;
const OB_INT_MAX: u64 = 1023;
const OB_SIGN_BIT: u64 = 1u64 << 63;

/// Encode a "change value" — a signed quantity whose magnitude lives in
/// `[0, 1]`: prices, displacements, imbalances.
///
/// Returns [`CodecError::ChangeValueOutOfRange`] if `value` is not finite or
/// its magnitude exceeds `1.0` (with a small floating-point tolerance).
pub fn encode_change(value: f64) -> Result<u64, CodecError> {
    if !value.is_finite() || value.abs() > 1.0 + 1e-9 {
        return Err(CodecError::ChangeValueOutOfRange(value));
    }

    let magnitude = value.abs();
    if magnitude < ZERO_EPSILON {
        return Ok(0);
    }

    let mantissa = (magnitude.min(1.0) * CHANGE_MANTISSA_MAX).floor() as u64;
    let mantissa = mantissa.min(CHANGE_MANTISSA_MASK);

    let sign_bit = if value < 0.0 { CHANGE_SIGN_BIT } else { 0 };
    Ok(sign_bit | mantissa)
}

/// Decode a "change value" produced by [`encode_change`].
pub fn decode_change(bits: u64) -> f64 {
    let mantissa = bits & CHANGE_MANTISSA_MASK;
    if mantissa == 0 {
        return 0.0;
    }

    let magnitude = mantissa as f64 / CHANGE_MANTISSA_MAX;
    if bits & CHANGE_SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode an "orderbook value" — a signed quantity whose magnitude lives in
/// `[0, 1024)`: volumes, order counts.
///
/// The integer part is clamped to 1023 rather than rejected, matching the
/// bit layout's own ceiling — a volume of 2000 is indistinguishable on the
/// wire from 1023.999... This is a lossy encoding by design for values this
/// far outside the intended range.
pub fn encode_orderbook(value: f64) -> u64 {
    if !value.is_finite() {
        return 0;
    }

    let magnitude = value.abs();
    if magnitude < ZERO_EPSILON {
        return 0;
    }

    let int_part = magnitude.floor().min(OB_INT_MAX as f64) as u64;
    let frac = magnitude - magnitude.floor();
    let frac_bits = (frac * OB_FRAC_MAX).floor() as u64 & OB_FRAC_MASK;

    let sign_bit = if value < 0.0 { OB_SIGN_BIT } else { 0 };
    sign_bit | (int_part << OB_FRAC_BITS) | frac_bits
}

/// Decode an "orderbook value" produced by [`encode_orderbook`].
pub fn decode_orderbook(bits: u64) -> f64 {
    let int_part = (bits >> OB_FRAC_BITS) & 0x3FF;
    let frac_bits = bits & OB_FRAC_MASK;

    let magnitude = int_part as f64 + (frac_bits as f64 / OB_FRAC_MAX);
    if bits & OB_SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn change_zero_is_exact() {
        assert_eq!(encode_change(0.0).unwrap(), 0);
        assert_eq!(decode_change(0), 0.0);
    }

    #[test]
    fn change_negative_sets_sign_bit() {
        let bits = encode_change(-0.5).unwrap();
        assert_ne!(bits & CHANGE_SIGN_BIT, 0);
        assert!((decode_change(bits) - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn change_positive_clears_sign_bit() {
        let bits = encode_change(0.5).unwrap();
        assert_eq!(bits & CHANGE_SIGN_BIT, 0);
    }

    #[test]
    fn change_rejects_out_of_range() {
        assert!(encode_change(1.5).is_err());
        assert!(encode_change(-2.0).is_err());
        assert!(encode_change(f64::NAN).is_err());
    }

    #[test]
    fn change_boundary_one_round_trips() {
        let bits = encode_change(1.0).unwrap();
        assert!((decode_change(bits) - 1.0).abs() <= f64::EPSILON * 4.0);
        let bits = encode_change(-1.0).unwrap();
        assert!((decode_change(bits) - (-1.0)).abs() <= f64::EPSILON * 4.0);
    }

    #[test]
    fn orderbook_zero_is_exact() {
        assert_eq!(encode_orderbook(0.0), 0);
        assert_eq!(decode_orderbook(0), 0.0);
    }

    #[test]
    fn orderbook_clamps_integer_part() {
        let bits = encode_orderbook(5000.25);
        let decoded = decode_orderbook(bits);
        assert!(decoded < 1024.0);
        assert!(decoded >= 1023.0);
    }

    #[test]
    fn orderbook_negative_round_trips() {
        let bits = encode_orderbook(-12.75);
        let decoded = decode_orderbook(bits);
        assert!((decoded - (-12.75)).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn change_round_trip(v in -1.0f64..=1.0f64) {
            let bits = encode_change(v).unwrap();
            let decoded = decode_change(bits);
            prop_assert!((decoded - v).abs() <= 2f64.powi(-62));
        }

        #[test]
        fn change_sign_matches(v in 1e-10f64..=1.0f64) {
            let pos_bits = encode_change(v).unwrap();
            let neg_bits = encode_change(-v).unwrap();
            prop_assert_eq!(pos_bits & CHANGE_SIGN_BIT, 0);
            prop_assert_ne!(neg_bits & CHANGE_SIGN_BIT, 0);
        }

        #[test]
        fn orderbook_round_trip(v in -1023.0f64..1023.0f64) {
            let bits = encode_orderbook(v);
            let decoded = decode_orderbook(bits);
            let whole_ulp = (v.abs().trunc() + 1.0) * f64::EPSILON;
            prop_assert!((decoded - v).abs() <= 2f64.powi(-52) + whole_ulp);
        }
    }
}
