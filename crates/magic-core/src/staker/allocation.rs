//! # Allocation Math
//!
//! Weight splits and pro-rata reward shares. Both floor every part except the
//! last nonzero one, which takes the remainder, so the input is always fully
//! consumed.

use crate::constants::{BPS_DENOMINATOR, TOTAL_WEIGHT};
use crate::errors::{MagicError, MagicResult};
use crate::math::{mul_div, safe_sub};

/// Check a weight vector against the strategy set.
///
/// `enabled[i]` tells whether strategy `i` accepts new weight.
pub fn validate_weights(weights: &[u16], enabled: &[bool]) -> MagicResult<()> {
    if weights.len() != enabled.len() {
        return Err(MagicError::InvalidWeights("length must match strategy count"));
    }
    let sum: u32 = weights.iter().map(|w| u32::from(*w)).sum();
    if sum != u32::from(TOTAL_WEIGHT) {
        return Err(MagicError::InvalidWeights("weights must sum to 10000"));
    }
    if weights.iter().zip(enabled).any(|(w, on)| *w > 0 && !on) {
        return Err(MagicError::InvalidWeights("disabled strategy given weight"));
    }
    Ok(())
}

/// Split `amount` across `weights` (basis points summing to 10000)
pub fn split_by_weights(amount: u128, weights: &[u16]) -> MagicResult<Vec<u128>> {
    let last = weights
        .iter()
        .rposition(|w| *w > 0)
        .ok_or(MagicError::InvalidWeights("weights not set"))?;

    let mut parts = vec![0u128; weights.len()];
    let mut assigned = 0u128;
    for (i, weight) in weights.iter().enumerate().take(last) {
        let part = mul_div(amount, u128::from(*weight), BPS_DENOMINATOR)?;
        parts[i] = part;
        assigned += part;
    }
    parts[last] = safe_sub(amount, assigned)?;
    Ok(parts)
}

/// Split `distributable` across strategies by their snapshot supplies
pub fn pro_rata_shares(distributable: u128, supplies: &[u128], static_supply: u128) -> MagicResult<Vec<u128>> {
    let mut shares = vec![0u128; supplies.len()];
    let last = match supplies.iter().rposition(|s| *s > 0) {
        Some(last) if static_supply > 0 => last,
        _ => return Ok(shares),
    };

    let mut assigned = 0u128;
    for (i, supply) in supplies.iter().enumerate().take(last) {
        let share = mul_div(distributable, *supply, static_supply)?;
        shares[i] = share;
        assigned += share;
    }
    shares[last] = safe_sub(distributable, assigned)?;
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_remainder_goes_to_last_weighted() {
        assert_eq!(split_by_weights(10, &[3_333, 6_667]).unwrap(), vec![3, 7]);
        assert_eq!(split_by_weights(10, &[3_333, 6_667, 0]).unwrap(), vec![3, 7, 0]);
        assert_eq!(split_by_weights(7, &[10_000, 0]).unwrap(), vec![7, 0]);
        assert!(split_by_weights(7, &[0, 0]).is_err());
    }

    #[test]
    fn test_validate_weights() {
        assert!(validate_weights(&[5_000, 5_000], &[true, true]).is_ok());
        assert_eq!(
            validate_weights(&[5_000, 4_999], &[true, true]),
            Err(MagicError::InvalidWeights("weights must sum to 10000"))
        );
        assert_eq!(
            validate_weights(&[10_000], &[true, true]),
            Err(MagicError::InvalidWeights("length must match strategy count"))
        );
        assert_eq!(
            validate_weights(&[5_000, 5_000], &[true, false]),
            Err(MagicError::InvalidWeights("disabled strategy given weight"))
        );
        assert!(validate_weights(&[10_000, 0], &[true, false]).is_ok());
    }

    #[test]
    fn test_pro_rata_uses_snapshot() {
        assert_eq!(pro_rata_shares(1_001, &[750, 1_250], 2_000).unwrap(), vec![375, 626]);
        assert_eq!(pro_rata_shares(1_000, &[0, 0], 0).unwrap(), vec![0, 0]);
        assert_eq!(pro_rata_shares(1_000, &[500, 0], 500).unwrap(), vec![1_000, 0]);
    }

    fn weights() -> impl Strategy<Value = Vec<u16>> {
        prop::collection::vec(0u16..5_000, 1..8).prop_map(|raw| {
            let sum: u32 = raw.iter().map(|w| u32::from(*w)).sum::<u32>().max(1);
            let mut scaled: Vec<u16> = raw
                .iter()
                .map(|w| (u32::from(*w) * 10_000 / sum) as u16)
                .collect();
            let assigned: u32 = scaled.iter().map(|w| u32::from(*w)).sum();
            let last = scaled.len() - 1;
            scaled[last] += (10_000 - assigned) as u16;
            scaled
        })
    }

    proptest! {
        #[test]
        fn prop_split_consumes_full_amount(amount in 0u128..u64::MAX as u128, weights in weights()) {
            let parts = split_by_weights(amount, &weights).unwrap();
            prop_assert_eq!(parts.iter().sum::<u128>(), amount);
            for (part, weight) in parts.iter().zip(&weights) {
                if *weight == 0 {
                    prop_assert_eq!(*part, 0);
                }
            }
        }

        #[test]
        fn prop_pro_rata_loses_nothing(
            distributable in 0u128..u64::MAX as u128,
            supplies in prop::collection::vec(0u128..1_000_000_000, 1..8),
        ) {
            let total: u128 = supplies.iter().sum();
            let shares = pro_rata_shares(distributable, &supplies, total).unwrap();
            if let Some(last) = supplies.iter().rposition(|s| *s > 0) {
                prop_assert_eq!(shares.iter().sum::<u128>(), distributable);
                for (i, share) in shares.iter().enumerate().take(last) {
                    prop_assert_eq!(*share, distributable * supplies[i] / total);
                }
            } else {
                prop_assert!(shares.iter().all(|s| *s == 0));
            }
        }
    }
}
