use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 推荐关系边：child(被推荐人) → parent(推荐人)
///
/// 一个用户最多一条出边(child_id唯一索引)，边一旦写入永不删除——
/// 它是后续所有佣金义务的依据。整个图因此是一片森林，不会有环。
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReferralEdge {
    /// 被推荐人ID
    pub child_id: String,
    /// 推荐人ID
    pub parent_id: String,
    /// 创建时间戳
    pub created_at: u64, // 1734187238
}
