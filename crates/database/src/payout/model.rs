use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// 结算批次：一个受益人一次性结清的一组佣金记录
///
/// `(beneficiary_id, cycle_window)` 唯一，调度器在同一周期内重跑不会产生
/// 第二个批次；批次内的entry在同一事务中被标记paid，一条佣金记录
/// 永远只属于至多一个批次。导出给外部支付系统(银行转账/PayPal等)使用。
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PayoutBatch {
    /// 批次ID
    pub batch_id: String,
    /// 受益人ID
    pub beneficiary_id: String,
    /// 批次总额(货币最小单位)
    pub total: u64,
    /// 包含的佣金记录ID列表
    pub entry_ids: Vec<String>,
    /// 结算周期窗口(UTC日期, YYYY-MM-DD)
    pub cycle_window: String,
    /// 创建时间戳
    pub created_at: u64,
}

impl PayoutBatch {
    pub fn new(beneficiary_id: &str, total: u64, entry_ids: Vec<String>, cycle_window: &str, created_at: u64) -> Self {
        Self {
            batch_id: Uuid::new_v4().simple().to_string(),
            beneficiary_id: beneficiary_id.to_string(),
            total,
            entry_ids,
            cycle_window: cycle_window.to_string(),
            created_at,
        }
    }
}
