//! Task reward settlement
//!
//! Approval credits the reward and flips the submission's `paid` flag in one
//! transactional scope. `paid` is checked and set under the same commit
//! validation, so a submission pays out at most once no matter how many
//! approvals race.

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ops::run_txn;
use crate::retry::RetryConfig;
use crate::store::{collections, doc_amount, DocumentStore, StoreTxn};
use crate::types::{RewardReceipt, SubmissionStatus, TaskSubmission};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Settles task rewards on operator approval.
pub struct RewardSettler<S> {
    store: Arc<S>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl<S: DocumentStore> RewardSettler<S> {
    /// Create a settler over the given store.
    pub fn new(store: Arc<S>, retry: RetryConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            retry,
            metrics,
        }
    }

    /// Approve a submission and credit its reward to the submitting user.
    pub async fn approve(&self, submission_id: &str) -> Result<RewardReceipt> {
        if submission_id.trim().is_empty() {
            return Err(Error::Validation(
                "Submission id must not be empty".to_string(),
            ));
        }

        let receipt = run_txn(
            self.store.as_ref(),
            &self.retry,
            &self.metrics,
            "approve_submission",
            |mut txn| {
                let submission_id = submission_id.to_string();
                async move {
                    let mut sub_doc = txn
                        .get(collections::TASK_SUBMISSIONS, &submission_id)
                        .await?
                        .ok_or_else(|| Error::SubmissionNotFound(submission_id.clone()))?;
                    let submission: TaskSubmission = serde_json::from_value(sub_doc.clone())?;

                    if submission.paid {
                        return Err(Error::AlreadyPaid(submission_id));
                    }
                    if !submission.reward.is_positive() {
                        return Err(Error::Validation(format!(
                            "Submission {} has a non-positive reward",
                            submission_id
                        )));
                    }

                    let uid = submission.user_id.clone();
                    let mut user = txn
                        .get(collections::USERS, uid.as_str())
                        .await?
                        .ok_or_else(|| Error::UserNotFound(uid.to_string()))?;
                    let balance = doc_amount(&user, "balance")?;
                    let new_balance = balance.checked_add(submission.reward).ok_or_else(|| {
                        Error::Internal(format!("Balance overflow crediting {}", uid))
                    })?;
                    user["balance"] = json!(new_balance.minor());
                    txn.set(collections::USERS, uid.as_str(), user);

                    let approved_at = Utc::now();
                    sub_doc["status"] = json!(SubmissionStatus::Approved);
                    sub_doc["paid"] = json!(true);
                    sub_doc["approvedAt"] = json!(approved_at);
                    txn.set(collections::TASK_SUBMISSIONS, &submission_id, sub_doc);

                    Ok((
                        txn,
                        RewardReceipt {
                            submission_id,
                            uid,
                            reward: submission.reward,
                            new_balance,
                            approved_at,
                        },
                    ))
                }
            },
        )
        .await?;

        self.metrics.record_reward();
        info!(
            "Settled reward {} for submission {} to {} (balance {})",
            receipt.reward, receipt.submission_id, receipt.uid, receipt.new_balance
        );
        Ok(receipt)
    }
}
