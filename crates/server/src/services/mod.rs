////////////////////////////////////////////////////////////////////////
//
// Service层：业务编排，建立在database仓库Trait之上
// 每个Domain一个Service，通过Dyn*(Arc<dyn Trait>)注入仓库
//
//////////////////////////////////////////////////////////////////////

pub mod donation_service;
pub mod ledger_service;
pub mod payout_service;
pub mod referral_service;

#[cfg(test)]
mod tests;

use database::Database;
use std::sync::Arc;
use tracing::info;
use utils::AppConfig;

use donation_service::{DonationService, DynDonationService};
use ledger_service::{DynLedgerService, LedgerService};
use payout_service::{DynPayoutService, PayoutService};
use referral_service::{DynReferralService, ReferralService};

#[derive(Clone)]
pub struct Services {
    pub referral: DynReferralService,
    pub donation: DynDonationService,
    pub ledger: DynLedgerService,
    pub payout: DynPayoutService,
    pub database: Arc<Database>,
}

impl Services {
    pub fn new(db: Database, config: Arc<AppConfig>) -> Self {
        let database = Arc::new(db);

        let referral: DynReferralService = Arc::new(ReferralService::new(
            database.clone(),
            database.clone(),
            config.attribution_window_secs(),
        ));

        let donation: DynDonationService = Arc::new(DonationService::new(
            database.clone(),
            database.clone(),
            database.clone(),
        ));

        let ledger: DynLedgerService = Arc::new(LedgerService::new(database.clone()));

        let payout: DynPayoutService = Arc::new(PayoutService::new(
            database.clone(),
            database.clone(),
            config.hold_period_secs(),
            config.min_payout_threshold,
        ));

        info!(
            "🧠 services initialized (attribution window {}d, hold {}d, payout threshold {})",
            config.attribution_window_days, config.hold_period_days, config.min_payout_threshold
        );

        Services {
            referral,
            donation,
            ledger,
            payout,
            database,
        }
    }
}
