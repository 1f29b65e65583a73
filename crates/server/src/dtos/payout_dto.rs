use database::PayoutBatch;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 一轮结算的执行结果
#[derive(Clone, Serialize, Deserialize, Debug, ToSchema)]
pub struct PayoutRunResponse {
    /// 本轮新建的批次
    pub batches: Vec<PayoutBatch>,
    /// 本轮结算总额
    pub total_paid: u64,
}

impl PayoutRunResponse {
    pub fn from_batches(batches: Vec<PayoutBatch>) -> Self {
        let total_paid = batches.iter().map(|b| b.total).sum();
        Self { batches, total_paid }
    }
}
