//! Balance-delta observation: polling, fee exclusion, zero-delta fallback

use std::sync::Arc;
use std::sync::atomic::Ordering;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::balance::{BalanceDeltaObserver, BalanceSnapshot};
use crate::config::BalancePollConfig;
use crate::errors::RpcError;
use crate::tests::test_helpers::MockChainRpc;
use crate::types::AssetId;

fn fast_config(max_attempts: u32) -> BalancePollConfig {
    BalancePollConfig {
        max_attempts,
        interval_ms: 10,
    }
}

fn native_snapshot(owner: Pubkey, amount: u64) -> BalanceSnapshot {
    BalanceSnapshot {
        owner,
        asset: AssetId::Native,
        amount,
        observed_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn snapshot_reads_native_balance() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(&mock.lamport_responses, vec![Ok(5_000_000)]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(1));
    let owner = Pubkey::new_unique();
    let snapshot = observer.snapshot(&owner, &AssetId::Native).await.unwrap();

    assert_eq!(snapshot.amount, 5_000_000);
    assert_eq!(snapshot.owner, owner);
}

#[tokio::test]
async fn snapshot_reads_token_balance() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(&mock.token_responses, vec![Ok(42)]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(1));
    let mint = Pubkey::new_unique();
    let snapshot = observer
        .snapshot(&Pubkey::new_unique(), &AssetId::Token(mint))
        .await
        .unwrap();

    assert_eq!(snapshot.amount, 42);
    assert_eq!(snapshot.asset, AssetId::Token(mint));
}

#[tokio::test(start_paused = true)]
async fn native_delta_excludes_network_fee() {
    let mock = Arc::new(MockChainRpc::default());
    // Payer sent 1_000_000 lamports and paid a 5_000 lamport fee.
    MockChainRpc::script(&mock.lamport_responses, vec![Ok(8_995_000)]);
    MockChainRpc::script(&mock.tx_fee_responses, vec![Ok(Some(5_000))]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(5));
    let before = native_snapshot(Pubkey::new_unique(), 10_000_000);
    let delta = observer.observe(&before, &Signature::default()).await;

    assert_eq!(delta.change, -1_000_000);
    assert_eq!(delta.network_fee, 5_000);
}

#[tokio::test(start_paused = true)]
async fn token_delta_has_no_fee_component() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(&mock.token_responses, vec![Ok(700)]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(5));
    let before = BalanceSnapshot {
        owner: Pubkey::new_unique(),
        asset: AssetId::Token(Pubkey::new_unique()),
        amount: 500,
        observed_at: chrono::Utc::now(),
    };
    let delta = observer.observe(&before, &Signature::default()).await;

    assert_eq!(delta.change, 200);
    assert_eq!(delta.network_fee, 0);
    // No transaction lookup for token assets.
    assert_eq!(mock.tx_fee_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn stops_polling_on_first_movement() {
    let mock = Arc::new(MockChainRpc::default());
    // Two unchanged reads, then the delta becomes visible.
    MockChainRpc::script(
        &mock.lamport_responses,
        vec![Ok(1_000), Ok(1_000), Ok(3_000)],
    );
    MockChainRpc::script(&mock.tx_fee_responses, vec![Ok(Some(500))]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(10));
    let before = native_snapshot(Pubkey::new_unique(), 1_000);
    let delta = observer.observe(&before, &Signature::default()).await;

    assert_eq!(delta.change, 2_500);
    assert_eq!(mock.lamport_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_reports_zero_delta() {
    let mock = Arc::new(MockChainRpc::default());
    // Balance never moves; default scripted read repeats the old amount.
    MockChainRpc::script(&mock.lamport_responses, vec![Ok(1_000); 4]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(4));
    let before = native_snapshot(Pubkey::new_unique(), 1_000);
    let delta = observer.observe(&before, &Signature::default()).await;

    assert!(delta.is_zero());
    assert_eq!(delta.network_fee, 0);
    assert_eq!(mock.lamport_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn read_errors_consume_attempts() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(
        &mock.lamport_responses,
        vec![
            Err(RpcError::RateLimited),
            Err(RpcError::RateLimited),
            Ok(1_000),
        ],
    );

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(3));
    let before = native_snapshot(Pubkey::new_unique(), 1_000);
    let delta = observer.observe(&before, &Signature::default()).await;

    // Errors counted against the budget; no movement seen in time.
    assert!(delta.is_zero());
    assert_eq!(mock.lamport_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_fee_record_keeps_raw_delta() {
    let mock = Arc::new(MockChainRpc::default());
    MockChainRpc::script(&mock.lamport_responses, vec![Ok(2_000)]);
    MockChainRpc::script(&mock.tx_fee_responses, vec![Ok(None)]);

    let observer = BalanceDeltaObserver::new(Arc::clone(&mock) as _, fast_config(5));
    let before = native_snapshot(Pubkey::new_unique(), 1_000);
    let delta = observer.observe(&before, &Signature::default()).await;

    assert_eq!(delta.change, 1_000);
    assert_eq!(delta.network_fee, 0);
}
