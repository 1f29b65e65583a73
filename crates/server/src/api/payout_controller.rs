use crate::{
    dtos::payout_dto::PayoutRunResponse,
    services::{payout_service::PayoutServiceTrait, Services},
};
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use database::PayoutBatch;
use utils::AppResult;

/// 手动触发一轮结算(正常情况由scheduler定时执行)
#[utoipa::path(
    post,
    path = "/api/v1/payout/run",
    tag = "payout",
    responses(
        (status = 200, description = "本轮结算结果", body = PayoutRunResponse)
    )
)]
pub async fn run_payout(Extension(services): Extension<Services>) -> AppResult<Json<PayoutRunResponse>> {
    let now = Utc::now().timestamp() as u64;
    let batches = services.payout.run_cycle(now).await?;

    Ok(Json(PayoutRunResponse::from_batches(batches)))
}

/// 受益人的结算批次(导出给外部支付系统)
#[utoipa::path(
    get,
    path = "/api/v1/payout/batches/{beneficiary_id}",
    tag = "payout",
    params(
        ("beneficiary_id" = String, Path, description = "受益人ID")
    ),
    responses(
        (status = 200, description = "成功返回批次列表(时间倒序)", body = Vec<PayoutBatch>)
    )
)]
pub async fn list_batches(
    Extension(services): Extension<Services>,
    Path(beneficiary_id): Path<String>,
) -> AppResult<Json<Vec<PayoutBatch>>> {
    let batches = services.payout.list_batches(&beneficiary_id).await?;

    Ok(Json(batches))
}

pub struct PayoutController;
impl PayoutController {
    pub fn app() -> Router {
        Router::new()
            .route("/payout/run", post(run_payout))
            .route("/payout/batches/:beneficiary_id", get(list_batches))
    }
}
