use crate::{
    dtos::ledger_dto::{CancelEntryRequest, EntriesQuery},
    extractors::ValidationExtractor,
    services::{ledger_service::LedgerServiceTrait, Services},
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use database::{CommissionEntry, LedgerTotals};
use utils::AppResult;

/// 受益人的佣金账目列表
#[utoipa::path(
    get,
    path = "/api/v1/ledger/entries/{beneficiary_id}",
    tag = "ledger",
    params(
        ("beneficiary_id" = String, Path, description = "受益人ID"),
        EntriesQuery
    ),
    responses(
        (status = 200, description = "成功返回账目列表(时间倒序)", body = Vec<CommissionEntry>),
        (status = 400, description = "状态过滤参数非法")
    )
)]
pub async fn list_entries(
    Extension(services): Extension<Services>,
    Path(beneficiary_id): Path<String>,
    Query(query): Query<EntriesQuery>,
) -> AppResult<Json<Vec<CommissionEntry>>> {
    let entries = services
        .ledger
        .list_entries(&beneficiary_id, query.status, query.limit)
        .await?;

    Ok(Json(entries))
}

/// 受益人的账目汇总
#[utoipa::path(
    get,
    path = "/api/v1/ledger/totals/{beneficiary_id}",
    tag = "ledger",
    params(
        ("beneficiary_id" = String, Path, description = "受益人ID")
    ),
    responses(
        (status = 200, description = "成功返回pending/paid/cancelled汇总", body = LedgerTotals)
    )
)]
pub async fn get_totals(
    Extension(services): Extension<Services>,
    Path(beneficiary_id): Path<String>,
) -> AppResult<Json<LedgerTotals>> {
    let totals = services.ledger.get_totals(&beneficiary_id).await?;

    Ok(Json(totals))
}

/// 取消pending佣金记录(捐赠退款/拒付)
#[utoipa::path(
    post,
    path = "/api/v1/ledger/cancel/{entry_id}",
    tag = "ledger",
    params(
        ("entry_id" = String, Path, description = "佣金记录ID")
    ),
    request_body = CancelEntryRequest,
    responses(
        (status = 200, description = "取消成功", body = CommissionEntry),
        (status = 404, description = "记录不存在"),
        (status = 500, description = "记录已paid/cancelled，状态机违规")
    )
)]
pub async fn cancel_entry(
    Extension(services): Extension<Services>,
    Path(entry_id): Path<String>,
    ValidationExtractor(req): ValidationExtractor<CancelEntryRequest>,
) -> AppResult<Json<CommissionEntry>> {
    let entry = services.ledger.cancel_entry(&entry_id, &req.reason).await?;

    Ok(Json(entry))
}

pub struct LedgerController;
impl LedgerController {
    pub fn app() -> Router {
        Router::new()
            .route("/ledger/entries/:beneficiary_id", get(list_entries))
            .route("/ledger/totals/:beneficiary_id", get(get_totals))
            .route("/ledger/cancel/:entry_id", post(cancel_entry))
    }
}
