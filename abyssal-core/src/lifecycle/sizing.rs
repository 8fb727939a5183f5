//! Position-sizing policy (§4.4.2).

use crate::errors::SizingError;

pub const MARGIN_CAP_PERCENT: f64 = 20.0;
pub const LEVERAGE: f64 = 100.0;
pub const MIN_CONTRACT: f64 = 0.1;

fn round_down_one_decimal(v: f64) -> f64 {
    (v * 10.0).floor() / 10.0
}

/// `max_per_side = (balance * margin_cap_percent / 100) * leverage / (mid / 100)`,
/// rounded down to one decimal (§4.4.2).
pub fn max_per_side(balance: f64, mid_price: f64) -> f64 {
    let raw = (balance * MARGIN_CAP_PERCENT / 100.0) * LEVERAGE / (mid_price / 100.0);
    round_down_one_decimal(raw)
}

/// Evaluate a requested order size against the side's existing exposure
/// (filled + pending). Returns the accepted size, possibly reduced, or a
/// rejection (§4.4.2).
pub fn evaluate(
    requested_size: f64,
    existing_side_exposure: f64,
    balance: f64,
    mid_price: f64,
) -> Result<f64, SizingError> {
    let cap = max_per_side(balance, mid_price);
    let projected = existing_side_exposure + requested_size;

    if projected <= cap {
        return Ok(requested_size);
    }

    let overrun = projected - cap;
    let adjusted = requested_size - overrun;

    if adjusted < MIN_CONTRACT {
        Err(SizingError::BelowMinimum {
            requested: adjusted,
            min_contract: MIN_CONTRACT,
        })
    } else {
        Ok(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_at_cap_is_accepted_unchanged() {
        let balance = 10_000.0;
        let mid = 30_000.0;
        let cap = max_per_side(balance, mid);
        let result = evaluate(cap, 0.0, balance, mid).unwrap();
        assert_eq!(result, cap);
    }

    #[test]
    fn size_over_cap_is_reduced_to_cap() {
        let balance = 10_000.0;
        let mid = 30_000.0;
        let cap = max_per_side(balance, mid);
        let result = evaluate(cap + 5.0, 0.0, balance, mid).unwrap();
        assert_eq!(result, cap);
    }

    #[test]
    fn size_whose_adjustment_falls_below_minimum_is_rejected() {
        let balance = 1.0;
        let mid = 30_000.0;
        let cap = max_per_side(balance, mid);
        // cap is near zero for this tiny balance; any meaningfully larger
        // request reduces to below MIN_CONTRACT and must be rejected.
        let err = evaluate(cap + 10.0, 0.0, balance, mid).unwrap_err();
        assert!(matches!(err, SizingError::BelowMinimum { .. }));
    }

    #[test]
    fn existing_exposure_counts_against_the_cap() {
        let balance = 10_000.0;
        let mid = 30_000.0;
        let cap = max_per_side(balance, mid);
        let result = evaluate(1.0, cap - 0.5, balance, mid).unwrap();
        assert_eq!(result, 0.5);
    }
}
