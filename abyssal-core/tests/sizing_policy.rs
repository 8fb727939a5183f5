//! Sizing-policy boundary properties (§4.4.2, §8) exercised at the crate
//! boundary, complementing the literal cases in `lifecycle::sizing`'s own
//! `#[cfg(test)]` module.

use abyssal_core::errors::SizingError;
use abyssal_core::lifecycle::sizing::{evaluate, max_per_side, MIN_CONTRACT};
use proptest::prelude::*;

proptest! {
    /// A request that keeps projected exposure at or under the cap is
    /// always accepted at its full requested size.
    #[test]
    fn requests_within_cap_pass_through_unchanged(
        balance in 100.0f64..1_000_000.0,
        mid in 1.0f64..200_000.0,
        existing in 0.0f64..10_000.0,
    ) {
        let cap = max_per_side(balance, mid);
        prop_assume!(existing < cap);
        let headroom = cap - existing;
        prop_assume!(headroom > 0.0);
        let requested = headroom / 2.0;
        prop_assume!(requested > 0.0);

        let accepted = evaluate(requested, existing, balance, mid).unwrap();
        prop_assert_eq!(accepted, requested);
    }

    /// Whatever size is ultimately accepted, existing exposure plus that
    /// size never exceeds the cap.
    #[test]
    fn accepted_size_never_breaches_the_cap(
        balance in 100.0f64..1_000_000.0,
        mid in 1.0f64..200_000.0,
        existing in 0.0f64..10_000.0,
        requested in 0.0001f64..20_000.0,
    ) {
        let cap = max_per_side(balance, mid);
        match evaluate(requested, existing, balance, mid) {
            Ok(accepted) => prop_assert!(existing + accepted <= cap + 1e-9),
            Err(SizingError::BelowMinimum { requested: adjusted, .. }) => {
                prop_assert!(adjusted < MIN_CONTRACT)
            }
            Err(other) => prop_assert!(false, "unexpected error variant: {other:?}"),
        }
    }
}

#[test]
fn zero_balance_yields_zero_cap_and_rejects_any_request() {
    let cap = max_per_side(0.0, 30_000.0);
    assert_eq!(cap, 0.0);
    let err = evaluate(1.0, 0.0, 0.0, 30_000.0).unwrap_err();
    assert!(matches!(err, SizingError::BelowMinimum { .. }));
}

#[test]
fn exact_minimum_contract_at_the_cap_boundary_is_accepted() {
    let balance = 10_000.0;
    let mid = 30_000.0;
    let cap = max_per_side(balance, mid);
    let existing = cap - MIN_CONTRACT;
    let accepted = evaluate(MIN_CONTRACT, existing, balance, mid).unwrap();
    assert_eq!(accepted, MIN_CONTRACT);
}
