use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 推荐码：签发后绑定唯一owner，永不变更
///
/// 多个注册/捐赠可以引用同一个码；是否还能用于归因由归因窗口决定。
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReferralToken {
    /// 分享码(全局唯一)
    pub code: String,
    /// 码的所有者(推荐人)ID
    pub owner_id: String,
    /// 签发时间戳
    pub created_at: u64,
}

impl ReferralToken {
    /// 是否仍在归因窗口内
    pub fn is_within_window(&self, now: u64, window_secs: u64) -> bool {
        now <= self.created_at.saturating_add(window_secs)
    }
}
