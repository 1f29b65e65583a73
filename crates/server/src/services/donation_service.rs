use crate::dtos::donation_dto::{ConfirmDonationRequest, PostedDonationResponse};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use commission::{compute_split, ReferralChain, Split};
use database::donation::repository::{DonationRepositoryTrait, DynDonationRepository};
use database::ledger::repository::{DynLedgerRepository, LedgerRepositoryTrait};
use database::referral::repository::{DynReferralRepository, ReferralRepositoryTrait};
use database::{CommissionEntry, Donation};
use std::sync::Arc;
use tracing::{error, info, warn};
use utils::{AppError, AppResult};

pub type DynDonationService = Arc<dyn DonationServiceTrait + Send + Sync>;

#[async_trait]
pub trait DonationServiceTrait {
    /// 网关确认后的捐赠入账
    ///
    /// 捐赠 → 受赠人推荐链 → 拆分 → 佣金账目，整条链路幂等：
    /// 任意一步之后中断重试，最终落库的账目行集合完全一致。
    async fn confirm_donation(&self, request: ConfirmDonationRequest) -> AppResult<PostedDonationResponse>;
}

#[derive(Clone)]
pub struct DonationService {
    donations: DynDonationRepository,
    ledger: DynLedgerRepository,
    referrals: DynReferralRepository,
}

impl DonationService {
    pub fn new(
        donations: DynDonationRepository,
        ledger: DynLedgerRepository,
        referrals: DynReferralRepository,
    ) -> Self {
        Self {
            donations,
            ledger,
            referrals,
        }
    }

    /// 按拆分结果落佣金账目行，每个层级至多一条、金额为0不落
    async fn post_entries(
        &self,
        donation: &Donation,
        split: &Split,
        chain: &ReferralChain,
    ) -> AppResult<Vec<CommissionEntry>> {
        let mut entries = Vec::new();

        if let Some(tier1_id) = &chain.tier1_id {
            if split.tier1_share > 0 {
                let entry = CommissionEntry::new_pending(
                    &donation.donation_id,
                    tier1_id,
                    1,
                    split.tier1_share,
                    donation.created_at,
                );
                entries.push(self.ledger.insert_entry(entry).await?);
            }
        }

        if let Some(tier2_id) = &chain.tier2_id {
            if split.tier2_share > 0 {
                let entry = CommissionEntry::new_pending(
                    &donation.donation_id,
                    tier2_id,
                    2,
                    split.tier2_share,
                    donation.created_at,
                );
                entries.push(self.ledger.insert_entry(entry).await?);
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl DonationServiceTrait for DonationService {
    async fn confirm_donation(&self, request: ConfirmDonationRequest) -> AppResult<PostedDonationResponse> {
        if request.amount == 0 {
            return Err(AppError::InsufficientFunds);
        }

        // 推荐链在首写时固化到捐赠记录上：受赠人此后被归因也不会
        // 追溯产生新账目行，重放得到的账目集合与第一次完全一致
        let ancestors = self.referrals.get_ancestors(&request.recipient_id).await?;
        let resolved_chain = ReferralChain::from_ancestors(&ancestors);

        let new_donation = Donation {
            donation_id: request.donation_id.clone(),
            idempotency_key: request.idempotency_key.clone(),
            amount: request.amount,
            recipient_id: request.recipient_id.clone(),
            payer_id: request.payer_id.clone(),
            tier1_id: resolved_chain.tier1_id.clone(),
            tier2_id: resolved_chain.tier2_id.clone(),
            created_at: Utc::now().timestamp() as u64,
        };

        let write = self.donations.create_donation(new_donation).await?;
        let replayed = write.is_replay();
        let donation = write.into_donation();

        if replayed && donation.amount != request.amount {
            // 幂等键复用但载荷不同：以已入账的记录为准
            warn!(
                "⚠️ idempotency key {} replayed with different amount ({} vs recorded {})",
                donation.idempotency_key, request.amount, donation.amount
            );
        }

        // 重放路径读已落库的快照，不重读当前推荐图
        let chain = ReferralChain {
            tier1_id: donation.tier1_id.clone(),
            tier2_id: donation.tier2_id.clone(),
        };

        let split = compute_split(donation.amount, &chain);
        if !split.verify(donation.amount) {
            // 费率/舍入bug，宁可中止也不落错误账
            error!(
                "🔴 split invariant violated for donation {}: {:?} vs amount {}",
                donation.donation_id, split, donation.amount
            );
            return Err(AppError::AnyhowError(anyhow!(
                "commission split does not sum to donation amount for {}",
                donation.donation_id
            )));
        }

        // 重放也会走到这里：insert_entry的(donation_id, tier)唯一约束
        // 让缺失的行补上、已有的行原样返回，结果收敛
        let entries = self.post_entries(&donation, &split, &chain).await?;

        if replayed {
            info!(
                "🔁 donation {} replayed, returning {} previously posted entries",
                donation.donation_id,
                entries.len()
            );
        } else {
            info!(
                "💰 donation {} posted: amount={} entries={} recipient={}",
                donation.donation_id,
                donation.amount,
                entries.len(),
                donation.recipient_id
            );
        }

        Ok(PostedDonationResponse {
            donation,
            split,
            entries,
            replayed,
        })
    }
}
