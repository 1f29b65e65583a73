pub mod donation_controller;
pub mod ledger_controller;
pub mod payout_controller;
pub mod referral_controller;

use axum::Router;

pub fn app() -> Router {
    Router::new()
        .merge(referral_controller::ReferralController::app())
        .merge(donation_controller::DonationController::app())
        .merge(ledger_controller::LedgerController::app())
        .merge(payout_controller::PayoutController::app())
}
