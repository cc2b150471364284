//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Balances never go negative under any operation interleaving
//! - A deposit reference credits exactly once, however often it is replayed
//! - A task reward pays exactly once, however often it is approved
//! - Accrual credits floor(principal * rate) once per period per position

use gateway_client::{ChargeStatus, MockGateway};
use ledger_engine::{
    Amount, DocumentStore, EngineConfig, Error, LedgerEngine, MemoryStore, UserId,
    WithdrawalStatus,
};
use proptest::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// One step of a randomized wallet history
#[derive(Debug, Clone, Copy)]
enum WalletOp {
    Deposit(i64),
    Withdraw(i64),
}

/// Strategy for generating wallet operations
fn wallet_op_strategy() -> impl Strategy<Value = WalletOp> {
    prop_oneof![
        (1i64..10_000).prop_map(WalletOp::Deposit),
        (1i64..10_000).prop_map(WalletOp::Withdraw),
    ]
}

fn test_engine() -> (Arc<MemoryStore>, Arc<MockGateway>, LedgerEngine<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new());
    let engine = LedgerEngine::new(store.clone(), gateway.clone(), EngineConfig::default())
        .expect("engine construction");
    (store, gateway, engine)
}

async fn stored_balance(store: &MemoryStore, uid: &str) -> i64 {
    let doc = store.get("users", uid).await.unwrap().unwrap();
    doc.data["balance"].as_i64().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the stored balance tracks the model and never goes negative
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec(wallet_op_strategy(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, gateway, engine) = test_engine();
            store.insert("users", "u1", json!({ "email": "u1@zyppayx.test", "balance": 0 }));
            let uid = UserId::new("u1");

            let mut model: i64 = 0;
            for (i, op) in ops.iter().enumerate() {
                match *op {
                    WalletOp::Deposit(amount) => {
                        let reference = format!("dep-{}", i);
                        gateway.program_charge(&reference, ChargeStatus::Success, amount);
                        let receipt = engine.verify_deposit(&reference, &uid).await.unwrap();
                        model += amount;
                        prop_assert_eq!(receipt.new_balance, Amount::from_minor(model));
                    }
                    WalletOp::Withdraw(amount) => {
                        let id = format!("wd-{}", i);
                        store.insert("withdrawals", &id, json!({
                            "uid": "u1",
                            "amount": amount,
                            "status": "pending",
                            "recipientCode": "RCP_1"
                        }));
                        match engine.process_withdrawal(&id).await {
                            Ok(outcome) => {
                                prop_assert_eq!(outcome.status, WithdrawalStatus::Completed);
                                prop_assert!(model >= amount);
                                model -= amount;
                            }
                            Err(Error::InsufficientBalance { .. }) => {
                                prop_assert!(model < amount);
                            }
                            Err(e) => return Err(TestCaseError::fail(format!("{:?}", e))),
                        }
                    }
                }

                let balance = stored_balance(&store, "u1").await;
                prop_assert!(balance >= 0);
                prop_assert_eq!(balance, model);
            }
            Ok(())
        })?;
    }

    /// Property: replaying references credits each distinct reference once
    #[test]
    fn prop_replayed_references_credit_once(
        picks in prop::collection::vec(0usize..5, 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, gateway, engine) = test_engine();
            store.insert("users", "u1", json!({ "email": "u1@zyppayx.test", "balance": 0 }));
            let uid = UserId::new("u1");

            // a small pool of charges, each with its own amount
            let amounts = [1_000i64, 2_500, 40, 777, 10_000];
            for (i, amount) in amounts.iter().enumerate() {
                gateway.program_charge(&format!("ref-{}", i), ChargeStatus::Success, *amount);
            }

            let mut seen = HashSet::new();
            for pick in &picks {
                let reference = format!("ref-{}", pick);
                let result = engine.verify_deposit(&reference, &uid).await;
                if seen.insert(*pick) {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert!(matches!(result, Err(Error::DuplicateDeposit(_))));
                }
            }

            let expected: i64 = seen.iter().map(|i| amounts[*i]).sum();
            prop_assert_eq!(stored_balance(&store, "u1").await, expected);
            Ok(())
        })?;
    }

    /// Property: a reward settles once no matter how often it is approved
    #[test]
    fn prop_reward_settles_once(reward in 1i64..100_000, approvals in 1usize..5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, _gateway, engine) = test_engine();
            store.insert("users", "u1", json!({ "email": "u1@zyppayx.test", "balance": 0 }));
            store.insert("task-submissions", "s1", json!({
                "userId": "u1",
                "reward": reward,
                "status": "pending",
                "paid": false
            }));

            for attempt in 0..approvals {
                let result = engine.approve_submission("s1").await;
                if attempt == 0 {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert!(matches!(result, Err(Error::AlreadyPaid(_))));
                }
            }

            prop_assert_eq!(stored_balance(&store, "u1").await, reward);
            Ok(())
        })?;
    }

    /// Property: accrual credits floor(principal * rate) once per period
    #[test]
    fn prop_accrual_credits_floor_once_per_period(
        principal in 1i64..100_000_000,
        rate_bps in 0u32..10_000u32,
        runs in 1usize..4,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, _gateway, engine) = test_engine();
            store.insert("users", "u1", json!({ "email": "u1@zyppayx.test", "balance": 0 }));

            let rate = Decimal::new(rate_bps as i64, 4);
            store.insert("userinvestments", "p1", json!({
                "uid": "u1",
                "amount": principal,
                "dailyRate": rate.to_string(),
                "status": "active"
            }));

            for _ in 0..runs {
                engine.run_accrual().await.unwrap();
            }

            let expected = (Decimal::from(principal) * rate).trunc().to_i64().unwrap();
            prop_assert_eq!(stored_balance(&store, "u1").await, expected);
            Ok(())
        })?;
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_wallet_lifecycle() {
        let (store, gateway, engine) = test_engine();
        store.insert(
            "users",
            "u1",
            json!({ "email": "u1@zyppayx.test", "balance": 0 }),
        );
        let uid = UserId::new("u1");

        // 1. Deposit verified and credited
        gateway.program_charge("ref_life", ChargeStatus::Success, 150_000);
        let receipt = engine.verify_deposit("ref_life", &uid).await.unwrap();
        assert_eq!(receipt.new_balance, Amount::from_minor(150_000));

        // 2. Task reward settled
        store.insert(
            "task-submissions",
            "s_life",
            json!({ "userId": "u1", "reward": 2_000, "status": "pending", "paid": false }),
        );
        let reward = engine.approve_submission("s_life").await.unwrap();
        assert_eq!(reward.new_balance, Amount::from_minor(152_000));

        // 3. Withdrawal debited, transferred and completed
        store.insert(
            "withdrawals",
            "w_life",
            json!({ "uid": "u1", "amount": 50_000, "status": "pending", "recipientCode": "RCP_9" }),
        );
        let outcome = engine.process_withdrawal("w_life").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);

        // 4. Accrual credits the active position
        store.insert(
            "userinvestments",
            "p_life",
            json!({ "uid": "u1", "amount": 200_000, "dailyRate": "0.015", "status": "active" }),
        );
        let report = engine.run_accrual().await.unwrap();
        assert_eq!(report.credited, 1);
        assert_eq!(report.total_profit, Amount::from_minor(3_000));

        // 150000 + 2000 - 50000 + 3000
        assert_eq!(stored_balance(&store, "u1").await, 105_000);
    }

    #[tokio::test]
    async fn test_unconfirmed_withdrawal_recovers_through_reconciliation() {
        let (store, gateway, engine) = test_engine();
        store.insert(
            "users",
            "u1",
            json!({ "email": "u1@zyppayx.test", "balance": 80_000 }),
        );
        store.insert(
            "withdrawals",
            "w_rec",
            json!({ "uid": "u1", "amount": 30_000, "status": "pending", "recipientCode": "RCP_9" }),
        );

        // the gateway drops off right as the transfer is initiated
        gateway.set_unreachable(true);
        let outcome = engine.process_withdrawal("w_rec").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Processing);
        assert_eq!(stored_balance(&store, "u1").await, 50_000);

        // reconciliation cannot decide while the gateway is down
        assert!(engine.reconcile_withdrawal("w_rec").await.is_err());
        assert_eq!(stored_balance(&store, "u1").await, 50_000);

        // once it is back, the lost transfer is resubmitted and settles
        gateway.set_unreachable(false);
        let outcome = engine.reconcile_withdrawal("w_rec").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);
        assert_eq!(stored_balance(&store, "u1").await, 50_000);
        assert_eq!(gateway.transfer_initiations("zyp-wd-w_rec"), 1);
    }
}
