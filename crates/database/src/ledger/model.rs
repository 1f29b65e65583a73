use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// 佣金记录状态，单向迁移：pending → paid 或 pending → cancelled
///
/// 不存在反向迁移，paid/cancelled是终态。所有状态更新都带
/// `status: "pending"` 条件，由存储层保证不会出现非法迁移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }

    /// 状态机合法性判断
    pub fn can_transition_to(&self, next: CommissionStatus) -> bool {
        matches!(
            (self, next),
            (CommissionStatus::Pending, CommissionStatus::Paid)
                | (CommissionStatus::Pending, CommissionStatus::Cancelled)
        )
    }
}

/// 佣金账目行：某个受益人在某笔捐赠中挣到的一份(tier 1或tier 2)
///
/// 除status及其附属字段(paid_at/payout_batch_id/cancel_reason)外写入后不可变；
/// `(donation_id, tier)` 唯一索引保证每笔捐赠每个层级至多一条。
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CommissionEntry {
    /// 账目行ID
    pub entry_id: String,
    /// 来源捐赠ID
    pub donation_id: String,
    /// 受益人(推荐人)ID
    pub beneficiary_id: String,
    /// 层级: 1=直接推荐人, 2=推荐人的推荐人
    pub tier: u8,
    /// 佣金金额(货币最小单位)
    pub amount: u64,
    /// 生命周期状态
    pub status: CommissionStatus,
    /// 所属结算批次(标记paid时写入)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_batch_id: Option<String>,
    /// 取消原因(捐赠被退款/拒付时写入)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// 创建时间戳
    pub created_at: u64,
    /// 支付时间戳
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<u64>,
}

impl CommissionEntry {
    pub fn new_pending(donation_id: &str, beneficiary_id: &str, tier: u8, amount: u64, created_at: u64) -> Self {
        Self {
            entry_id: Uuid::new_v4().simple().to_string(),
            donation_id: donation_id.to_string(),
            beneficiary_id: beneficiary_id.to_string(),
            tier,
            amount,
            status: CommissionStatus::Pending,
            payout_batch_id: None,
            cancel_reason: None,
            created_at,
            paid_at: None,
        }
    }
}

/// 受益人账目汇总(dashboard读模型)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LedgerTotals {
    pub beneficiary_id: String,
    pub pending_total: u64,
    pub pending_count: u64,
    pub paid_total: u64,
    pub paid_count: u64,
    pub cancelled_total: u64,
    pub cancelled_count: u64,
}
