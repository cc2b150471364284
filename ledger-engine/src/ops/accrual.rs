//! Investment accrual
//!
//! Credits daily profit to the owners of active investment positions. Each
//! position carries a `lastRun` timestamp; a position whose `lastRun` falls
//! in the current accrual period is skipped, so re-running the job within a
//! period never double-credits. Positions are processed in id-ordered chunks,
//! one transactional scope per chunk.

use crate::config::AccrualConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ops::run_txn;
use crate::retry::RetryConfig;
use crate::store::{collections, doc_amount, DocumentStore, StoreTxn};
use crate::types::{AccrualPeriod, AccrualReport, Amount, InvestmentPosition, PositionStatus};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-chunk tally folded into the final report.
#[derive(Debug, Default, Clone, Copy)]
struct ChunkTally {
    credited: usize,
    skipped: usize,
    profit: Amount,
}

/// Runs profit accrual over all active investment positions.
pub struct AccrualRunner<S> {
    store: Arc<S>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
    period: AccrualPeriod,
    chunk_size: usize,
}

impl<S: DocumentStore> AccrualRunner<S> {
    /// Create a runner over the given collaborators.
    pub fn new(
        store: Arc<S>,
        accrual: AccrualConfig,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            retry,
            metrics,
            period: accrual.period,
            chunk_size: accrual.chunk_size.max(1),
        }
    }

    /// Accrue profit for every active position not yet run this period.
    pub async fn run(&self) -> Result<AccrualReport> {
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        let period_key = self.period.key_for(now);

        let active = self
            .store
            .query_eq(
                collections::USER_INVESTMENTS,
                "status",
                &serde_json::to_value(PositionStatus::Active)?,
            )
            .await?;
        let ids: Vec<String> = active.into_iter().map(|(id, _)| id).collect();
        info!(
            "Accrual run {} over {} active positions (period {})",
            run_id,
            ids.len(),
            period_key
        );

        let mut credited = 0usize;
        let mut skipped = 0usize;
        let mut total_profit = Amount::ZERO;

        for chunk in ids.chunks(self.chunk_size) {
            let period = self.period;
            let tally = run_txn(
                self.store.as_ref(),
                &self.retry,
                &self.metrics,
                "accrual_chunk",
                |mut txn| {
                    let chunk = chunk.to_vec();
                    async move {
                        let mut tally = ChunkTally::default();
                        for position_id in &chunk {
                            let pdoc =
                                match txn.get(collections::USER_INVESTMENTS, position_id).await? {
                                    Some(doc) => doc,
                                    None => {
                                        tally.skipped += 1;
                                        continue;
                                    }
                                };
                            let position: InvestmentPosition =
                                match serde_json::from_value(pdoc.clone()) {
                                    Ok(p) => p,
                                    Err(e) => {
                                        warn!("Skipping malformed position {}: {}", position_id, e);
                                        tally.skipped += 1;
                                        continue;
                                    }
                                };

                            if position.status != PositionStatus::Active {
                                tally.skipped += 1;
                                continue;
                            }
                            let already_run = match position.last_run {
                                Some(last) => period.same_period(last, now),
                                None => false,
                            };
                            if already_run {
                                tally.skipped += 1;
                                continue;
                            }

                            let gain = position
                                .amount
                                .to_decimal()
                                .checked_mul(position.daily_rate)
                                .and_then(Amount::from_decimal_floor);
                            let gain = match gain {
                                Some(gain) => gain,
                                None => {
                                    warn!(
                                        "Skipping position {} with out-of-range profit (rate {})",
                                        position_id, position.daily_rate
                                    );
                                    tally.skipped += 1;
                                    continue;
                                }
                            };

                            let uid = position.uid.clone();
                            let mut user = match txn.get(collections::USERS, uid.as_str()).await? {
                                Some(doc) => doc,
                                None => {
                                    warn!(
                                        "Skipping position {} with missing owner {}",
                                        position_id, uid
                                    );
                                    tally.skipped += 1;
                                    continue;
                                }
                            };
                            let balance = doc_amount(&user, "balance")?;
                            let updated = balance.checked_add(gain).ok_or_else(|| {
                                Error::Internal(format!("Balance overflow crediting {}", uid))
                            })?;
                            user["balance"] = json!(updated.minor());
                            txn.set(collections::USERS, uid.as_str(), user);

                            let mut pdoc = pdoc;
                            pdoc["lastRun"] = json!(now);
                            txn.set(collections::USER_INVESTMENTS, position_id, pdoc);

                            tally.credited += 1;
                            tally.profit = tally.profit.checked_add(gain).ok_or_else(|| {
                                Error::Internal("Accrual profit tally overflow".to_string())
                            })?;
                        }
                        Ok((txn, tally))
                    }
                },
            )
            .await?;

            credited += tally.credited;
            skipped += tally.skipped;
            total_profit = total_profit
                .checked_add(tally.profit)
                .ok_or_else(|| Error::Internal("Accrual profit tally overflow".to_string()))?;
        }

        self.metrics.record_accrual(credited);
        let report = AccrualReport {
            run_id,
            period_key,
            positions_seen: ids.len(),
            credited,
            skipped,
            total_profit,
            completed_at: Utc::now(),
        };
        info!(
            "Accrual run {} credited {} positions for {} (skipped {})",
            report.run_id, report.credited, report.total_profit, report.skipped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;

    fn runner_with(
        store: Arc<MemoryStore>,
        period: AccrualPeriod,
        chunk_size: usize,
    ) -> AccrualRunner<MemoryStore> {
        AccrualRunner::new(
            store,
            AccrualConfig { period, chunk_size },
            RetryConfig::default(),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn seed_position(store: &MemoryStore, id: &str, uid: &str, amount: i64, rate: &str) {
        store.insert(
            "userinvestments",
            id,
            json!({
                "uid": uid,
                "amount": amount,
                "dailyRate": rate,
                "status": "active"
            }),
        );
    }

    #[tokio::test]
    async fn credits_each_active_position_once() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        store.insert("users", "u2", json!({ "balance": 500 }));
        seed_position(&store, "p1", "u1", 10_000, "0.015");
        seed_position(&store, "p2", "u1", 4_000, "0.015");
        seed_position(&store, "p3", "u2", 20_000, "0.02");

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.positions_seen, 3);
        assert_eq!(report.credited, 3);
        assert_eq!(report.skipped, 0);
        // 150 + 60 + 400
        assert_eq!(report.total_profit, Amount::from_minor(610));

        // both of u1's positions land in one balance
        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 210);
        let u2 = store.get("users", "u2").await.unwrap().unwrap();
        assert_eq!(u2.data["balance"], 900);

        let p1 = store.get("userinvestments", "p1").await.unwrap().unwrap();
        assert!(p1.data["lastRun"].is_string());
    }

    #[tokio::test]
    async fn second_run_in_the_same_period_credits_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        seed_position(&store, "p1", "u1", 10_000, "0.015");

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        runner.run().await.unwrap();
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total_profit, Amount::ZERO);

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 150);
    }

    #[tokio::test]
    async fn stale_last_run_is_credited_again() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        store.insert(
            "userinvestments",
            "p1",
            json!({
                "uid": "u1",
                "amount": 10_000,
                "dailyRate": "0.015",
                "status": "active",
                "lastRun": Utc::now() - Duration::days(1)
            }),
        );

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 1);

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 150);
    }

    #[tokio::test]
    async fn closed_positions_are_not_selected() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        store.insert(
            "userinvestments",
            "p1",
            json!({
                "uid": "u1",
                "amount": 10_000,
                "dailyRate": "0.015",
                "status": "closed"
            }),
        );

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.positions_seen, 0);
        assert_eq!(report.credited, 0);

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 0);
    }

    #[tokio::test]
    async fn small_chunks_cover_every_position() {
        let store = Arc::new(MemoryStore::new());
        for i in 1..=5 {
            let uid = format!("u{}", i);
            store.insert("users", &uid, json!({ "balance": 0 }));
            seed_position(&store, &format!("p{}", i), &uid, 10_000, "0.01");
        }

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 2);
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 5);
        assert_eq!(report.total_profit, Amount::from_minor(500));

        for i in 1..=5 {
            let user = store
                .get("users", &format!("u{}", i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(user.data["balance"], 100);
        }
    }

    #[tokio::test]
    async fn orphaned_position_is_skipped_without_failing_the_run() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        seed_position(&store, "p1", "ghost", 10_000, "0.015");
        seed_position(&store, "p2", "u1", 10_000, "0.015");

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 1);
        assert_eq!(report.skipped, 1);

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 150);
    }

    #[tokio::test]
    async fn unusable_rates_are_skipped_without_failing_the_run() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        store.insert("users", "u2", json!({ "balance": 0 }));
        store.insert("users", "u3", json!({ "balance": 0 }));
        // the product overflows decimal arithmetic
        store.insert(
            "userinvestments",
            "p1",
            json!({
                "uid": "u1",
                "amount": 9_000_000_000_000_000_000i64,
                "dailyRate": "20000000000",
                "status": "active"
            }),
        );
        seed_position(&store, "p2", "u2", 10_000, "-0.5");
        seed_position(&store, "p3", "u3", 10_000, "0.015");

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.total_profit, Amount::from_minor(150));

        // skipped positions move no money and keep no lastRun
        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 0);
        let u2 = store.get("users", "u2").await.unwrap().unwrap();
        assert_eq!(u2.data["balance"], 0);
        let p1 = store.get("userinvestments", "p1").await.unwrap().unwrap();
        assert!(p1.data.get("lastRun").is_none());

        let u3 = store.get("users", "u3").await.unwrap().unwrap();
        assert_eq!(u3.data["balance"], 150);
    }

    #[tokio::test]
    async fn zero_gain_still_advances_last_run() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", "u1", json!({ "balance": 0 }));
        // 10 * 0.015 floors to zero minor units
        seed_position(&store, "p1", "u1", 10, "0.015");

        let runner = runner_with(store.clone(), AccrualPeriod::Daily, 50);
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 1);
        assert_eq!(report.total_profit, Amount::ZERO);

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.data["balance"], 0);
        let p1 = store.get("userinvestments", "p1").await.unwrap().unwrap();
        assert!(p1.data["lastRun"].is_string());

        // and the period guard holds on the next run
        let report = runner.run().await.unwrap();
        assert_eq!(report.credited, 0);
        assert_eq!(report.skipped, 1);
    }
}
