use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// 账目列表查询参数
#[derive(Clone, Serialize, Deserialize, Debug, Default, IntoParams)]
pub struct EntriesQuery {
    /// 按状态过滤: pending | paid | cancelled
    pub status: Option<String>,
    /// 返回条数上限(默认100)
    pub limit: Option<i64>,
}

/// 取消佣金记录的请求体(捐赠被退款/拒付)
#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
pub struct CancelEntryRequest {
    /// 取消原因
    #[validate(length(min = 1))]
    pub reason: String,
}
