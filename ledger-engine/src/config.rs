//! Configuration for the ledger engine

use crate::retry::RetryConfig;
use crate::types::AccrualPeriod;
use serde::{Deserialize, Serialize};

/// Engine configuration, injected by the hosting process
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Conflict retry policy shared by all operations
    pub retry: RetryConfig,
    /// Accrual runner policy
    pub accrual: AccrualConfig,
}

/// Accrual runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Bucketing scheme for the once-per-period guard
    pub period: AccrualPeriod,
    /// Positions settled per transactional chunk
    pub chunk_size: usize,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            period: AccrualPeriod::Daily,
            chunk_size: 50,
        }
    }
}
