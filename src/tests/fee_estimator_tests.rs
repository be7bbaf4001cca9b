//! Fee estimation behavior against scripted fee-market data

use std::sync::Arc;

use proptest::prelude::*;

use crate::config::{FeeConfig, FeeTier};
use crate::errors::RpcError;
use crate::fees::{FeeEstimate, FeeEstimator};
use crate::tests::test_helpers::MockChainRpc;

fn estimator(mock: Arc<MockChainRpc>, config: FeeConfig) -> FeeEstimator {
    FeeEstimator::new(mock, config)
}

#[tokio::test]
async fn derives_quartile_schedule_from_samples() {
    let mock = Arc::new(MockChainRpc::default());
    mock.script_fee_samples(&[0, 0, 5_000, 10_000, 20_000]);

    let estimate = estimator(
        mock,
        FeeConfig {
            minimum_floor: 1,
            ..FeeConfig::default()
        },
    )
    .estimate(None)
    .await;

    // Zero samples are dropped; the schedule splits the max.
    assert_eq!(estimate.low, 5_000);
    assert_eq!(estimate.medium, 10_000);
    assert_eq!(estimate.high, 15_000);
    assert_eq!(estimate.extreme, 20_000);
}

#[tokio::test]
async fn all_zero_window_uses_fallback() {
    let mock = Arc::new(MockChainRpc::default());
    mock.script_fee_samples(&[0, 0, 0]);

    let config = FeeConfig::default();
    let fallback = config.fallback;
    let estimate = estimator(mock, config).estimate(None).await;

    assert_eq!(estimate, fallback);
}

#[tokio::test]
async fn empty_window_uses_fallback() {
    let mock = Arc::new(MockChainRpc::default());
    mock.script_fee_samples(&[]);

    let config = FeeConfig::default();
    let fallback = config.fallback;
    let estimate = estimator(mock, config).estimate(None).await;

    assert_eq!(estimate, fallback);
}

#[tokio::test]
async fn rpc_failure_uses_fallback() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(
        &mock.fee_responses,
        vec![Err(RpcError::Timeout { timeout_ms: 5_000 })],
    );

    let config = FeeConfig::default();
    let fallback = config.fallback;
    let estimate = estimator(mock, config).estimate(None).await;

    assert_eq!(estimate, fallback);
}

#[tokio::test]
async fn low_contention_clamps_to_floor() {
    let mock = Arc::new(MockChainRpc::default());
    mock.script_fee_samples(&[1, 2, 3]);

    let estimate = estimator(
        mock,
        FeeConfig {
            minimum_floor: 1_000,
            ..FeeConfig::default()
        },
    )
    .estimate(None)
    .await;

    assert_eq!(estimate.low, 1_000);
    assert_eq!(estimate.medium, 1_000);
    assert_eq!(estimate.high, 1_000);
    assert_eq!(estimate.extreme, 1_000);
}

#[tokio::test]
async fn reference_account_is_forwarded() {
    let mock = Arc::new(MockChainRpc::default());
    mock.script_fee_samples(&[8_000]);
    let reference = solana_sdk::pubkey::Pubkey::new_unique();

    let config = FeeConfig {
        minimum_floor: 1,
        ..FeeConfig::default()
    };
    let estimate = estimator(Arc::clone(&mock), config)
        .estimate(Some(&reference))
        .await;

    assert_eq!(estimate.extreme, 8_000);
    assert_eq!(mock.fee_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn tier_lookup_is_total() {
    let estimate = FeeEstimate {
        low: 10,
        medium: 20,
        high: 30,
        extreme: 40,
    };
    for tier in [FeeTier::Low, FeeTier::Medium, FeeTier::High, FeeTier::Extreme] {
        assert!(estimate.for_tier(tier) >= 10);
    }
}

proptest! {
    // Any sample window and floor must yield a monotonic schedule with
    // every tier at or above the floor.
    #[test]
    fn schedule_is_monotonic_and_floored(
        samples in proptest::collection::vec(0u64..10_000_000, 0..64),
        floor in 1u64..1_000_000,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let estimate = runtime.block_on(async {
            let mock = Arc::new(MockChainRpc::default());
            mock.script_fee_samples(&samples);
            let config = FeeConfig {
                minimum_floor: floor,
                fallback: FeeEstimate {
                    low: floor,
                    medium: floor,
                    high: floor,
                    extreme: floor,
                },
            };
            estimator(mock, config).estimate(None).await
        });

        prop_assert!(estimate.is_monotonic());
        prop_assert!(estimate.low >= floor);
        prop_assert!(estimate.extreme >= floor);
    }
}
