use crate::{
    dtos::referral_dto::{AttributionRequest, AttributionResponse},
    extractors::ValidationExtractor,
    services::{referral_service::ReferralServiceTrait, Services},
};
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use database::ReferralToken;
use utils::AppResult;

/// 注册归因：为新用户绑定推荐人
#[utoipa::path(
    post,
    path = "/api/v1/referral/attribution",
    tag = "referral",
    request_body = AttributionRequest,
    responses(
        (status = 200, description = "归因完成(包含安全重试的no-op)", body = AttributionResponse),
        (status = 404, description = "推荐码不存在"),
        (status = 410, description = "推荐码超出归因窗口"),
        (status = 400, description = "不允许自己推荐自己")
    )
)]
pub async fn resolve_attribution(
    Extension(services): Extension<Services>,
    ValidationExtractor(req): ValidationExtractor<AttributionRequest>,
) -> AppResult<Json<AttributionResponse>> {
    let outcome = services
        .referral
        .resolve_attribution(&req.new_user_id, req.referral_code.as_deref())
        .await?;

    Ok(Json(AttributionResponse {
        attributed: outcome.attributed,
        parent_id: outcome.parent_id,
        noop_reason: outcome.noop_reason,
    }))
}

/// 获取完整推荐链(上级&上上级)
#[utoipa::path(
    get,
    path = "/api/v1/referral/uppers/{user_id}",
    tag = "referral",
    params(
        ("user_id" = String, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "成功返回推荐链(最多2个，由近到远)", body = Vec<String>)
    )
)]
pub async fn get_uppers(
    Extension(services): Extension<Services>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let uppers = services.referral.get_ancestors(&user_id).await?;

    Ok(Json(uppers))
}

/// 获取(或签发)用户的分享推荐码
#[utoipa::path(
    post,
    path = "/api/v1/referral/token/{user_id}",
    tag = "referral",
    params(
        ("user_id" = String, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "成功返回推荐码", body = ReferralToken)
    )
)]
pub async fn get_or_issue_token(
    Extension(services): Extension<Services>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ReferralToken>> {
    let token = services.referral.get_or_issue_token(&user_id).await?;

    Ok(Json(token))
}

pub struct ReferralController;
impl ReferralController {
    pub fn app() -> Router {
        Router::new()
            .route("/referral/attribution", post(resolve_attribution))
            .route("/referral/uppers/:user_id", get(get_uppers))
            .route("/referral/token/:user_id", post(get_or_issue_token))
    }
}
