use crate::{
    dtos::donation_dto::{ConfirmDonationRequest, PostedDonationResponse},
    extractors::ValidationExtractor,
    services::{donation_service::DonationServiceTrait, Services},
};
use axum::{routing::post, Extension, Json, Router};
use utils::AppResult;

/// 捐赠入账：拆分并登记佣金
///
/// 只接受支付网关已确认capture的捐赠；同一idempotency_key重试
/// 返回此前入账的结果(replayed=true)，不会产生重复佣金。
#[utoipa::path(
    post,
    path = "/api/v1/donation/confirm",
    tag = "donation",
    request_body = ConfirmDonationRequest,
    responses(
        (status = 200, description = "入账完成(或幂等重放)", body = PostedDonationResponse),
        (status = 400, description = "金额非法")
    )
)]
pub async fn confirm_donation(
    Extension(services): Extension<Services>,
    ValidationExtractor(req): ValidationExtractor<ConfirmDonationRequest>,
) -> AppResult<Json<PostedDonationResponse>> {
    let posted = services.donation.confirm_donation(req).await?;

    Ok(Json(posted))
}

pub struct DonationController;
impl DonationController {
    pub fn app() -> Router {
        Router::new().route("/donation/confirm", post(confirm_donation))
    }
}
