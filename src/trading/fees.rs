//! EIP-1559 gas parameters for Polygon transactions.

/// Wei per gwei.
pub const GWEI: u128 = 1_000_000_000;

/// Base fee assumed when the chain does not report one, in gwei.
pub const ASSUMED_BASE_FEE_GWEI: u64 = 100;

/// Lowest max fee ever bid when computing from the base fee, in gwei.
pub const FALLBACK_MAX_FEE_GWEI: u64 = 150;

/// Gas price bid for one transaction, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    /// Priority fee (tip) per gas.
    pub max_priority_fee_per_gas: u128,
    /// Maximum total fee per gas.
    pub max_fee_per_gas: u128,
}

impl GasParams {
    /// Compute the bid.
    ///
    /// With an override the max fee is taken as given. Otherwise it is
    /// `base * 1.2 + tip`, floored at [`FALLBACK_MAX_FEE_GWEI`], where a missing
    /// base fee counts as [`ASSUMED_BASE_FEE_GWEI`].
    pub fn compute(base_fee_wei: Option<u128>, tip_gwei: u64, max_fee_override_gwei: Option<u64>) -> Self {
        let tip = gwei(tip_gwei);

        let max_fee = match max_fee_override_gwei {
            Some(max_gwei) => gwei(max_gwei),
            None => {
                let base = base_fee_wei.unwrap_or_else(|| gwei(ASSUMED_BASE_FEE_GWEI));
                let buffered = base.saturating_mul(120) / 100;
                buffered.saturating_add(tip).max(gwei(FALLBACK_MAX_FEE_GWEI))
            }
        };

        Self {
            max_priority_fee_per_gas: tip,
            max_fee_per_gas: max_fee,
        }
    }

    /// Priority fee in gwei, for display.
    pub fn tip_gwei(&self) -> u128 {
        self.max_priority_fee_per_gas / GWEI
    }

    /// Max fee in gwei, for display.
    pub fn max_fee_gwei(&self) -> u128 {
        self.max_fee_per_gas / GWEI
    }
}

fn gwei(value: u64) -> u128 {
    u128::from(value) * GWEI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_base_fee_plus_tip() {
        let gas = GasParams::compute(Some(200 * GWEI), 30, None);
        assert_eq!(gas.max_priority_fee_per_gas, 30 * GWEI);
        assert_eq!(gas.max_fee_per_gas, 270 * GWEI);
    }

    #[test]
    fn floor_applies_to_low_base_fee() {
        let gas = GasParams::compute(Some(30 * GWEI), 30, None);
        assert_eq!(gas.max_fee_gwei(), 150);
    }

    #[test]
    fn missing_base_fee_assumes_default() {
        let gas = GasParams::compute(None, 30, None);
        assert_eq!(gas.max_fee_gwei(), 150);

        let gas = GasParams::compute(None, 50, None);
        assert_eq!(gas.max_fee_gwei(), 170);
    }

    #[test]
    fn override_wins() {
        let gas = GasParams::compute(Some(500 * GWEI), 30, Some(90));
        assert_eq!(gas.max_fee_gwei(), 90);
        assert_eq!(gas.tip_gwei(), 30);
    }

    #[test]
    fn computed_fee_meets_both_bounds() {
        for base_gwei in [0u128, 1, 25, 99, 100, 101, 123, 400, 10_000] {
            for tip in [0u64, 25, 30, 80] {
                let base = base_gwei * GWEI + 7;
                let gas = GasParams::compute(Some(base), tip, None);
                assert!(gas.max_fee_per_gas >= base * 120 / 100 + u128::from(tip) * GWEI);
                assert!(gas.max_fee_per_gas >= 150 * GWEI);
            }
        }
    }
}
