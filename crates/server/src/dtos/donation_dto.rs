use commission::Split;
use database::{CommissionEntry, Donation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 捐赠确认请求
///
/// 只有在外部支付网关确认capture之后才允许调用；本系统不发起、
/// 不重试支付。重试同一笔捐赠时idempotency_key必须保持不变。
#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
pub struct ConfirmDonationRequest {
    /// 捐赠ID
    #[validate(length(min = 1))]
    pub donation_id: String,
    /// 调用方的幂等键
    #[validate(length(min = 1))]
    pub idempotency_key: String,
    /// 金额(货币最小单位，必须为正)
    #[validate(range(min = 1))]
    pub amount: u64,
    /// 受赠艺术家ID
    #[validate(length(min = 1))]
    pub recipient_id: String,
    /// 捐赠人ID(匿名捐赠不传)
    pub payer_id: Option<String>,
}

/// 入账结果：捐赠 + 拆分 + 产生的佣金账目行
#[derive(Clone, Serialize, Deserialize, Debug, ToSchema)]
pub struct PostedDonationResponse {
    pub donation: Donation,
    pub split: Split,
    pub entries: Vec<CommissionEntry>,
    /// true表示这是一次重放(幂等命中)，返回的是此前已入账的结果
    pub replayed: bool,
}
