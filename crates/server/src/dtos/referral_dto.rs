use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 注册归因请求：在账号创建时由外层(UI/账号系统)调用
///
/// referral_code为空表示本次注册不带推荐——该用户将永久没有推荐人。
#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
pub struct AttributionRequest {
    /// 新注册用户ID
    #[validate(length(min = 1))]
    pub new_user_id: String,
    /// 注册时携带的推荐码(链接/cookie/手填)
    pub referral_code: Option<String>,
}

/// 归因结果
///
/// attributed=false且带noop_reason时表示安全重试的no-op(例如用户已绑定过)，
/// 对调用方而言等价于成功。
#[derive(Clone, Serialize, Deserialize, Debug, ToSchema)]
pub struct AttributionResponse {
    pub attributed: bool,
    /// 本次(或此前)绑定的推荐人
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noop_reason: Option<String>,
}
