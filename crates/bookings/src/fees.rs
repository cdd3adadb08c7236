//! Platform fee policy.

use serde::{Deserialize, Serialize};

use gatepass_core::{DomainError, DomainResult};

/// Default platform cut: 10%.
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 1_000;

const BPS_DENOMINATOR: u32 = 10_000;

/// Fee policy expressed in basis points so the split stays in integer math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    rate_bps: u32,
}

/// Result of splitting a payment between the platform and the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub platform_fee: u64,
    pub payout_to_host: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            rate_bps: DEFAULT_PLATFORM_FEE_BPS,
        }
    }
}

impl FeePolicy {
    pub fn new(rate_bps: u32) -> DomainResult<Self> {
        if rate_bps > BPS_DENOMINATOR {
            return Err(DomainError::validation(format!(
                "fee rate must be at most {BPS_DENOMINATOR} bps, got {rate_bps}"
            )));
        }
        Ok(Self { rate_bps })
    }

    pub fn rate_bps(&self) -> u32 {
        self.rate_bps
    }

    /// Split an amount into platform fee and host payout.
    ///
    /// The fee is floor-rounded to the smallest currency unit, so
    /// `platform_fee + payout_to_host == amount` holds exactly.
    pub fn split(&self, amount: u64) -> FeeSplit {
        let platform_fee =
            ((amount as u128 * self.rate_bps as u128) / BPS_DENOMINATOR as u128) as u64;
        FeeSplit {
            platform_fee,
            payout_to_host: amount - platform_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ten_percent_of_1000_is_100() {
        let split = FeePolicy::default().split(1_000);
        assert_eq!(split.platform_fee, 100);
        assert_eq!(split.payout_to_host, 900);
    }

    #[test]
    fn fee_is_floor_rounded() {
        // 10% of 1005 is 100.5; the platform takes the floor.
        let split = FeePolicy::default().split(1_005);
        assert_eq!(split.platform_fee, 100);
        assert_eq!(split.payout_to_host, 905);
    }

    #[test]
    fn zero_amount_splits_to_zero() {
        let split = FeePolicy::default().split(0);
        assert_eq!(split.platform_fee, 0);
        assert_eq!(split.payout_to_host, 0);
    }

    #[test]
    fn full_rate_pays_the_platform_everything() {
        let policy = FeePolicy::new(10_000).unwrap();
        let split = policy.split(777);
        assert_eq!(split.platform_fee, 777);
        assert_eq!(split.payout_to_host, 0);
    }

    #[test]
    fn rates_above_100_percent_are_rejected() {
        assert!(FeePolicy::new(10_001).is_err());
    }

    proptest! {
        #[test]
        fn split_always_sums_to_amount(amount in any::<u64>(), rate_bps in 0u32..=10_000) {
            let policy = FeePolicy::new(rate_bps).unwrap();
            let split = policy.split(amount);
            prop_assert_eq!(split.platform_fee + split.payout_to_host, amount);
            prop_assert!(split.platform_fee <= amount);
        }
    }
}
