pub mod donation_dto;
pub mod ledger_dto;
pub mod payout_dto;
pub mod referral_dto;
