use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 捐赠记录：外部支付网关确认capture之后才会进入本系统，写入后不可变
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Donation {
    /// 捐赠ID
    pub donation_id: String,
    /// 调用方提供的幂等键，重试时必须保持不变
    pub idempotency_key: String,
    /// 金额(货币最小单位，必须为正)
    pub amount: u64,
    /// 受赠艺术家ID
    pub recipient_id: String,
    /// 捐赠人ID(匿名捐赠为空)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<String>,
    /// 一级佣金受益人，首写时按受赠人当时的推荐链固化。
    /// 重放从这份快照推导账目行——受赠人事后归因不会改变本笔的账目集合。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier1_id: Option<String>,
    /// 二级佣金受益人(同上)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier2_id: Option<String>,
    /// 创建时间戳
    pub created_at: u64,
}
