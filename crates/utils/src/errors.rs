use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

/// 业务错误分类
///
/// "已经完成"类错误(AlreadyAttributed/AlreadyPosted)是安全重试的预期结果，
/// 调用方应当视为成功的no-op，Service层负责转换，不会以失败形式返回给终端用户。
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// 用户已经绑定过推荐人，且与本次请求的推荐人不一致
    #[error("user {0} is already attributed to another referrer")]
    AlreadyAttributed(String),

    /// 不允许自己推荐自己
    #[error("user {0} cannot be attributed to their own referral token")]
    SelfReferral(String),

    /// 归因会在推荐图中形成环(child出现在parent的祖先链上)
    #[error("attributing user {0} would create a referral cycle")]
    CycleDetected(String),

    /// 推荐码不存在
    #[error("referral token {0} not found")]
    TokenNotFound(String),

    /// 推荐码超出归因窗口
    #[error("referral token {0} is outside the attribution window")]
    TokenExpired(String),

    /// 同一笔捐赠已经入账(幂等键冲突)
    #[error("donation {0} has already been posted")]
    AlreadyPosted(String),

    /// 账目状态机非法迁移(pending→paid/cancelled之外的迁移)
    /// 属于调用方契约违规，按severe处理
    #[error("invalid commission entry status transition: {0}")]
    InvalidTransition(String),

    /// 捐赠金额非法(必须为正的最小货币单位)
    #[error("donation amount must be positive")]
    InsufficientFunds,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),

    #[error(transparent)]
    AxumJsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    MongoError(#[from] mongodb::error::Error),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl AppError {
    /// 是否属于安全重试产生的"已完成"冲突
    pub fn is_retry_noop(&self) -> bool {
        matches!(self, AppError::AlreadyAttributed(_) | AppError::AlreadyPosted(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AlreadyAttributed(_) | AppError::AlreadyPosted(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::SelfReferral(_) | AppError::CycleDetected(_) | AppError::BadRequest(_) | AppError::InsufficientFunds => {
                StatusCode::BAD_REQUEST
            }
            AppError::TokenNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TokenExpired(_) => StatusCode::GONE,
            AppError::ValidationError(_) | AppError::AxumJsonRejection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition(_) | AppError::MongoError(_) | AppError::AnyhowError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::InvalidTransition(ref detail) = self {
            // 正确的调用方不应触发该错误，记录后报警
            error!("🔴 ledger contract violation: {}", detail);
        }

        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
