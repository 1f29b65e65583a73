use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Encore Referral Ledger API",
        description = "基于 Rust 和 Axum 的捐赠推荐佣金账本系统 API 文档",
        version = "1.0.0",
        contact(
            name = "API Support",
            email = "support@encore.fm"
        )
    ),
    paths(
        // Referral endpoints
        crate::api::referral_controller::resolve_attribution,
        crate::api::referral_controller::get_uppers,
        crate::api::referral_controller::get_or_issue_token,
        // Donation endpoints
        crate::api::donation_controller::confirm_donation,
        // Ledger endpoints
        crate::api::ledger_controller::list_entries,
        crate::api::ledger_controller::get_totals,
        crate::api::ledger_controller::cancel_entry,
        // Payout endpoints
        crate::api::payout_controller::run_payout,
        crate::api::payout_controller::list_batches,
    ),
    components(
        schemas(
            crate::dtos::referral_dto::AttributionRequest,
            crate::dtos::referral_dto::AttributionResponse,
            crate::dtos::donation_dto::ConfirmDonationRequest,
            crate::dtos::donation_dto::PostedDonationResponse,
            crate::dtos::ledger_dto::CancelEntryRequest,
            crate::dtos::payout_dto::PayoutRunResponse,
            commission::ReferralChain,
            commission::Split,
            database::Donation,
            database::CommissionEntry,
            database::CommissionStatus,
            database::LedgerTotals,
            database::PayoutBatch,
            database::ReferralEdge,
            database::ReferralToken,
        )
    ),
    tags(
        (name = "referral", description = "推荐关系与归因"),
        (name = "donation", description = "捐赠入账"),
        (name = "ledger", description = "佣金账本读模型与取消"),
        (name = "payout", description = "结算批次")
    )
)]
pub struct ApiDoc;
