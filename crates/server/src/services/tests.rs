//! Service层行为测试
//!
//! 仓库Trait用内存Mock实现，Mock复刻了Mongo唯一索引的裁决语义
//! (first-write-wins、幂等撞键、条件状态更新)，因此可以在无数据库的
//! 情况下验证归因永久性、入账幂等、批次原子性等性质。

use super::donation_service::{DonationService, DonationServiceTrait};
use super::payout_service::{PayoutService, PayoutServiceTrait};
use super::referral_service::{ReferralService, ReferralServiceTrait};
use crate::dtos::donation_dto::ConfirmDonationRequest;
use async_trait::async_trait;
use chrono::Utc;
use database::donation::repository::{DonationRepositoryTrait, DonationWrite};
use database::ledger::repository::LedgerRepositoryTrait;
use database::payout::repository::PayoutRepositoryTrait;
use database::referral::repository::ReferralRepositoryTrait;
use database::token::repository::TokenRepositoryTrait;
use database::{CommissionEntry, CommissionStatus, Donation, LedgerTotals, PayoutBatch, ReferralEdge, ReferralToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use utils::{AppError, AppResult};

const DAY: u64 = 86_400;

#[derive(Default)]
struct MockState {
    edges: HashMap<String, ReferralEdge>,
    tokens: Vec<ReferralToken>,
    donations: HashMap<String, Donation>,
    entries: Vec<CommissionEntry>,
    batches: Vec<PayoutBatch>,
}

#[derive(Default)]
struct MockStore {
    state: Mutex<MockState>,
}

impl MockStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn issue_token_at(&self, owner_id: &str, code: &str, created_at: u64) {
        let mut state = self.state.lock().unwrap();
        state.tokens.push(ReferralToken {
            code: code.to_string(),
            owner_id: owner_id.to_string(),
            created_at,
        });
    }

    fn entry_status(&self, entry_id: &str) -> Option<CommissionStatus> {
        let state = self.state.lock().unwrap();
        state.entries.iter().find(|e| e.entry_id == entry_id).map(|e| e.status)
    }

    fn all_entries(&self) -> Vec<CommissionEntry> {
        self.state.lock().unwrap().entries.clone()
    }
}

#[async_trait]
impl ReferralRepositoryTrait for MockStore {
    async fn create_edge(&self, child_id: &str, parent_id: &str) -> AppResult<ReferralEdge> {
        if child_id == parent_id {
            return Err(AppError::SelfReferral(child_id.to_string()));
        }

        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.edges.get(child_id) {
            // 唯一索引语义：同parent重试幂等成功，不同parent判负
            return if existing.parent_id == parent_id {
                Ok(existing.clone())
            } else {
                Err(AppError::AlreadyAttributed(child_id.to_string()))
            };
        }

        // 环检测语义：child不允许出现在parent的祖先链上
        let mut current = parent_id.to_string();
        while let Some(edge) = state.edges.get(&current) {
            if edge.parent_id == child_id {
                return Err(AppError::CycleDetected(child_id.to_string()));
            }
            current = edge.parent_id.clone();
        }

        let edge = ReferralEdge {
            child_id: child_id.to_string(),
            parent_id: parent_id.to_string(),
            created_at: Utc::now().timestamp() as u64,
        };
        state.edges.insert(child_id.to_string(), edge.clone());
        Ok(edge)
    }

    async fn get_parent(&self, child_id: &str) -> AppResult<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.edges.get(child_id).map(|e| e.parent_id.clone()))
    }

    async fn get_ancestors(&self, child_id: &str) -> AppResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut result = Vec::new();
        let mut current = child_id.to_string();
        for _ in 0..2 {
            match state.edges.get(&current) {
                Some(edge) => {
                    result.push(edge.parent_id.clone());
                    current = edge.parent_id.clone();
                }
                None => break,
            }
        }
        Ok(result)
    }

}

#[async_trait]
impl TokenRepositoryTrait for MockStore {
    async fn get_or_issue(&self, owner_id: &str) -> AppResult<ReferralToken> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.tokens.iter().find(|t| t.owner_id == owner_id) {
            return Ok(existing.clone());
        }
        let token = ReferralToken {
            code: format!("code-{}", owner_id),
            owner_id: owner_id.to_string(),
            created_at: Utc::now().timestamp() as u64,
        };
        state.tokens.push(token.clone());
        Ok(token)
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<ReferralToken>> {
        let state = self.state.lock().unwrap();
        Ok(state.tokens.iter().find(|t| t.code == code).cloned())
    }

    async fn find_by_owner(&self, owner_id: &str) -> AppResult<Option<ReferralToken>> {
        let state = self.state.lock().unwrap();
        Ok(state.tokens.iter().find(|t| t.owner_id == owner_id).cloned())
    }
}

#[async_trait]
impl DonationRepositoryTrait for MockStore {
    async fn create_donation(&self, donation: Donation) -> AppResult<DonationWrite> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.donations.get(&donation.idempotency_key) {
            return Ok(DonationWrite::AlreadyRecorded(existing.clone()));
        }
        state
            .donations
            .insert(donation.idempotency_key.clone(), donation.clone());
        Ok(DonationWrite::Created(donation))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> AppResult<Option<Donation>> {
        let state = self.state.lock().unwrap();
        Ok(state.donations.get(key).cloned())
    }
}

#[async_trait]
impl LedgerRepositoryTrait for MockStore {
    async fn insert_entry(&self, entry: CommissionEntry) -> AppResult<CommissionEntry> {
        let mut state = self.state.lock().unwrap();
        // (donation_id, tier)唯一索引语义
        if let Some(existing) = state
            .entries
            .iter()
            .find(|e| e.donation_id == entry.donation_id && e.tier == entry.tier)
        {
            return Ok(existing.clone());
        }
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_entry_id(&self, entry_id: &str) -> AppResult<Option<CommissionEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state.entries.iter().find(|e| e.entry_id == entry_id).cloned())
    }

    async fn list_entries(
        &self,
        beneficiary_id: &str,
        status: Option<CommissionStatus>,
        _limit: i64,
    ) -> AppResult<Vec<CommissionEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.beneficiary_id == beneficiary_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect())
    }

    async fn list_pending_older_than(&self, beneficiary_id: &str, cutoff: u64) -> AppResult<Vec<CommissionEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| {
                e.beneficiary_id == beneficiary_id
                    && e.status == CommissionStatus::Pending
                    && e.created_at <= cutoff
            })
            .cloned()
            .collect())
    }

    async fn pending_beneficiaries(&self, cutoff: u64) -> AppResult<Vec<(String, u64)>> {
        let state = self.state.lock().unwrap();
        let mut totals: HashMap<String, u64> = HashMap::new();
        for entry in state
            .entries
            .iter()
            .filter(|e| e.status == CommissionStatus::Pending && e.created_at <= cutoff)
        {
            *totals.entry(entry.beneficiary_id.clone()).or_insert(0) += entry.amount;
        }
        Ok(totals.into_iter().collect())
    }

    async fn get_totals(&self, beneficiary_id: &str) -> AppResult<LedgerTotals> {
        let state = self.state.lock().unwrap();
        let mut totals = LedgerTotals {
            beneficiary_id: beneficiary_id.to_string(),
            ..Default::default()
        };
        for entry in state.entries.iter().filter(|e| e.beneficiary_id == beneficiary_id) {
            match entry.status {
                CommissionStatus::Pending => {
                    totals.pending_total += entry.amount;
                    totals.pending_count += 1;
                }
                CommissionStatus::Paid => {
                    totals.paid_total += entry.amount;
                    totals.paid_count += 1;
                }
                CommissionStatus::Cancelled => {
                    totals.cancelled_total += entry.amount;
                    totals.cancelled_count += 1;
                }
            }
        }
        Ok(totals)
    }

    async fn cancel_entry(&self, entry_id: &str, reason: &str) -> AppResult<CommissionEntry> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.entry_id == entry_id)
            .ok_or_else(|| AppError::NotFound(format!("commission entry {} not found", entry_id)))?;

        if entry.status != CommissionStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "cancel entry {}: status is {}, expected pending",
                entry_id,
                entry.status.as_str()
            )));
        }

        entry.status = CommissionStatus::Cancelled;
        entry.cancel_reason = Some(reason.to_string());
        Ok(entry.clone())
    }

    async fn mark_paid(&self, entry_ids: &[String], payout_batch_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        // 全有或全无：先检查整组都在pending，再一次性更新
        let all_pending = entry_ids.iter().all(|id| {
            state
                .entries
                .iter()
                .any(|e| &e.entry_id == id && e.status == CommissionStatus::Pending)
        });
        if !all_pending {
            return Err(AppError::InvalidTransition(format!(
                "mark_paid batch {}: some entries were not pending",
                payout_batch_id
            )));
        }
        for entry in state.entries.iter_mut() {
            if entry_ids.contains(&entry.entry_id) {
                entry.status = CommissionStatus::Paid;
                entry.payout_batch_id = Some(payout_batch_id.to_string());
                entry.paid_at = Some(Utc::now().timestamp() as u64);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PayoutRepositoryTrait for MockStore {
    async fn commit_batch(&self, batch: PayoutBatch) -> AppResult<Option<PayoutBatch>> {
        {
            let state = self.state.lock().unwrap();
            // (beneficiary_id, cycle_window)唯一索引语义
            if state
                .batches
                .iter()
                .any(|b| b.beneficiary_id == batch.beneficiary_id && b.cycle_window == batch.cycle_window)
            {
                return Ok(None);
            }
        }

        // 批次落库与标记paid原子：mark_paid失败则批次不落
        self.mark_paid(&batch.entry_ids, &batch.batch_id).await?;

        let mut state = self.state.lock().unwrap();
        state.batches.push(batch.clone());
        Ok(Some(batch))
    }

    async fn list_batches(&self, beneficiary_id: &str, _limit: i64) -> AppResult<Vec<PayoutBatch>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .batches
            .iter()
            .filter(|b| b.beneficiary_id == beneficiary_id)
            .cloned()
            .collect())
    }
}

fn referral_service(store: &Arc<MockStore>) -> ReferralService {
    ReferralService::new(store.clone(), store.clone(), 90 * DAY)
}

fn donation_service(store: &Arc<MockStore>) -> DonationService {
    DonationService::new(store.clone(), store.clone(), store.clone())
}

fn payout_service(store: &Arc<MockStore>, hold_secs: u64, threshold: u64) -> PayoutService {
    PayoutService::new(store.clone(), store.clone(), hold_secs, threshold)
}

fn donation_request(donation_id: &str, amount: u64, recipient: &str) -> ConfirmDonationRequest {
    ConfirmDonationRequest {
        donation_id: donation_id.to_string(),
        idempotency_key: format!("idem-{}", donation_id),
        amount,
        recipient_id: recipient.to_string(),
        payer_id: Some("fan-1".to_string()),
    }
}

fn now() -> u64 {
    Utc::now().timestamp() as u64
}

// ---------------------------------------------------------------- 归因

#[tokio::test]
async fn test_attribution_records_tier1_edge() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    let service = referral_service(&store);

    let outcome = service.resolve_attribution("newbie", Some("tok-upper")).await.unwrap();

    assert!(outcome.attributed);
    assert_eq!(outcome.parent_id.as_deref(), Some("upper"));
    assert_eq!(
        ReferralRepositoryTrait::get_parent(store.as_ref(), "newbie").await.unwrap(),
        Some("upper".to_string())
    );
}

#[tokio::test]
async fn test_attribution_without_code_is_success_noop() {
    let store = MockStore::new();
    let service = referral_service(&store);

    let outcome = service.resolve_attribution("newbie", None).await.unwrap();

    assert!(!outcome.attributed);
    assert!(outcome.parent_id.is_none());
}

#[tokio::test]
async fn test_attribution_is_first_write_wins() {
    let store = MockStore::new();
    store.issue_token_at("upper_a", "tok-a", now());
    store.issue_token_at("upper_b", "tok-b", now());
    let service = referral_service(&store);

    let first = service.resolve_attribution("newbie", Some("tok-a")).await.unwrap();
    assert!(first.attributed);

    // 换一个推荐码再归因：no-op，原有归因保持不变
    let second = service.resolve_attribution("newbie", Some("tok-b")).await.unwrap();
    assert!(!second.attributed);
    assert_eq!(second.parent_id.as_deref(), Some("upper_a"));
    assert!(second.noop_reason.is_some());

    assert_eq!(
        ReferralRepositoryTrait::get_parent(store.as_ref(), "newbie").await.unwrap(),
        Some("upper_a".to_string())
    );
}

#[tokio::test]
async fn test_attribution_same_code_retry_is_idempotent() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    let service = referral_service(&store);

    let first = service.resolve_attribution("newbie", Some("tok-upper")).await.unwrap();
    let retry = service.resolve_attribution("newbie", Some("tok-upper")).await.unwrap();

    assert!(first.attributed);
    assert_eq!(retry.parent_id.as_deref(), Some("upper"));
}

#[tokio::test]
async fn test_attribution_rejects_unknown_and_expired_tokens() {
    let store = MockStore::new();
    // 91天前签发的码已超出90天窗口
    store.issue_token_at("upper", "tok-old", now() - 91 * DAY);
    let service = referral_service(&store);

    let missing = service.resolve_attribution("newbie", Some("tok-nope")).await;
    assert!(matches!(missing, Err(AppError::TokenNotFound(_))));

    let expired = service.resolve_attribution("newbie", Some("tok-old")).await;
    assert!(matches!(expired, Err(AppError::TokenExpired(_))));

    // 两种失败都不会写边
    assert!(ReferralRepositoryTrait::get_parent(store.as_ref(), "newbie")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_attribution_rejects_own_token() {
    let store = MockStore::new();
    store.issue_token_at("artist", "tok-self", now());
    let service = referral_service(&store);

    let result = service.resolve_attribution("artist", Some("tok-self")).await;
    assert!(matches!(result, Err(AppError::SelfReferral(_))));
}

#[tokio::test]
async fn test_attribution_rejects_cycles() {
    let store = MockStore::new();
    store.issue_token_at("a", "tok-a", now());
    store.issue_token_at("b", "tok-b", now());
    store.issue_token_at("c", "tok-c", now());
    let service = referral_service(&store);

    // A无码注册，B由A推荐，之后A拿B的码归因：二节点环，必须拒绝
    service.resolve_attribution("b", Some("tok-a")).await.unwrap();
    let result = service.resolve_attribution("a", Some("tok-b")).await;
    assert!(matches!(result, Err(AppError::CycleDetected(_))));
    assert!(ReferralRepositoryTrait::get_parent(store.as_ref(), "a")
        .await
        .unwrap()
        .is_none());

    // 更长的链同样拦截：A→B→C之后A拿C的码归因
    service.resolve_attribution("c", Some("tok-b")).await.unwrap();
    let result = service.resolve_attribution("a", Some("tok-c")).await;
    assert!(matches!(result, Err(AppError::CycleDetected(_))));

    // 图保持森林：A不会成为自己捐赠的tier-2受益人
    let posted = donation_service(&store)
        .confirm_donation(donation_request("don-1", 1000, "a"))
        .await
        .unwrap();
    assert!(posted
        .entries
        .iter()
        .all(|e| e.beneficiary_id != "a"));
}

#[tokio::test]
async fn test_two_level_chain_is_derived_not_stored() {
    let store = MockStore::new();
    store.issue_token_at("grand", "tok-grand", now());
    store.issue_token_at("middle", "tok-middle", now());
    let service = referral_service(&store);

    // grand推荐middle，middle推荐artist
    service.resolve_attribution("middle", Some("tok-grand")).await.unwrap();
    service.resolve_attribution("artist", Some("tok-middle")).await.unwrap();

    let chain = service.get_chain("artist").await.unwrap();
    assert_eq!(chain.tier1_id.as_deref(), Some("middle"));
    assert_eq!(chain.tier2_id.as_deref(), Some("grand"));

    // 只有一层时tier2缺失
    let chain = service.get_chain("middle").await.unwrap();
    assert_eq!(chain.tier1_id.as_deref(), Some("grand"));
    assert!(chain.tier2_id.is_none());

    // 没有推荐人则链为空
    let chain = service.get_chain("grand").await.unwrap();
    assert!(chain.tier1_id.is_none());
    assert!(chain.tier2_id.is_none());
}

// ---------------------------------------------------------------- 入账

#[tokio::test]
async fn test_donation_flow_tier1_only() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    referral_service(&store)
        .resolve_attribution("artist", Some("tok-upper"))
        .await
        .unwrap();

    let service = donation_service(&store);
    let posted = service
        .confirm_donation(donation_request("don-1", 1000, "artist"))
        .await
        .unwrap();

    // 1000分，有一级无二级: 800/25/0/175
    assert_eq!(posted.split.recipient_share, 800);
    assert_eq!(posted.split.tier1_share, 25);
    assert_eq!(posted.split.tier2_share, 0);
    assert_eq!(posted.split.platform_share, 175);

    assert_eq!(posted.entries.len(), 1);
    assert_eq!(posted.entries[0].beneficiary_id, "upper");
    assert_eq!(posted.entries[0].tier, 1);
    assert_eq!(posted.entries[0].amount, 25);
    assert_eq!(posted.entries[0].status, CommissionStatus::Pending);
    assert!(!posted.replayed);
}

#[tokio::test]
async fn test_posting_is_idempotent() {
    let store = MockStore::new();
    store.issue_token_at("grand", "tok-grand", now());
    store.issue_token_at("middle", "tok-middle", now());
    let referral = referral_service(&store);
    referral.resolve_attribution("middle", Some("tok-grand")).await.unwrap();
    referral.resolve_attribution("artist", Some("tok-middle")).await.unwrap();

    let service = donation_service(&store);
    let first = service
        .confirm_donation(donation_request("don-1", 1000, "artist"))
        .await
        .unwrap();
    let second = service
        .confirm_donation(donation_request("don-1", 1000, "artist"))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);

    // 同一组entry id，账目行没有翻倍
    let first_ids: Vec<_> = first.entries.iter().map(|e| e.entry_id.clone()).collect();
    let second_ids: Vec<_> = second.entries.iter().map(|e| e.entry_id.clone()).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(store.all_entries().len(), 2);

    let total: u64 = store.all_entries().iter().map(|e| e.amount).sum();
    assert_eq!(total, 50); // 25 + 25，重放没有加倍
}

#[tokio::test]
async fn test_partial_replay_converges() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    referral_service(&store)
        .resolve_attribution("artist", Some("tok-upper"))
        .await
        .unwrap();

    // 模拟部分写入：捐赠已落库但账目行丢失(网关超时后进程崩溃)
    let request = donation_request("don-1", 1000, "artist");
    DonationRepositoryTrait::create_donation(
        store.as_ref(),
        Donation {
            donation_id: request.donation_id.clone(),
            idempotency_key: request.idempotency_key.clone(),
            amount: request.amount,
            recipient_id: request.recipient_id.clone(),
            payer_id: request.payer_id.clone(),
            tier1_id: Some("upper".to_string()),
            tier2_id: None,
            created_at: now(),
        },
    )
    .await
    .unwrap();
    assert!(store.all_entries().is_empty());

    // 重试同一请求：补上缺失的账目行
    let posted = donation_service(&store).confirm_donation(request).await.unwrap();
    assert!(posted.replayed);
    assert_eq!(posted.entries.len(), 1);
    assert_eq!(posted.entries[0].amount, 25);
}

#[tokio::test]
async fn test_replay_after_late_attribution_keeps_entry_set() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    let donation = donation_service(&store);

    // 归因之前入账：当时无推荐链，0条账目
    let first = donation
        .confirm_donation(donation_request("don-1", 1000, "artist"))
        .await
        .unwrap();
    assert!(first.entries.is_empty());
    assert_eq!(first.split.platform_share, 200);

    // 受赠人事后才被归因
    referral_service(&store)
        .resolve_attribution("artist", Some("tok-upper"))
        .await
        .unwrap();

    // 同一请求重放：账目集合与首次完全一致，不会追溯产生tier-1行
    let second = donation
        .confirm_donation(donation_request("don-1", 1000, "artist"))
        .await
        .unwrap();
    assert!(second.replayed);
    assert!(second.entries.is_empty());
    assert_eq!(second.split, first.split);
    assert!(store.all_entries().is_empty());

    // 归因之后的新捐赠才按新链分佣
    let fresh = donation
        .confirm_donation(donation_request("don-2", 1000, "artist"))
        .await
        .unwrap();
    assert_eq!(fresh.entries.len(), 1);
    assert_eq!(fresh.entries[0].beneficiary_id, "upper");
}

#[tokio::test]
async fn test_zero_amount_donation_rejected() {
    let store = MockStore::new();
    let service = donation_service(&store);

    let result = service.confirm_donation(donation_request("don-0", 0, "artist")).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds)));
    assert!(store.all_entries().is_empty());
}

#[tokio::test]
async fn test_donation_without_chain_creates_no_entries() {
    let store = MockStore::new();
    let service = donation_service(&store);

    let posted = service
        .confirm_donation(donation_request("don-1", 1000, "orphan-artist"))
        .await
        .unwrap();

    assert!(posted.entries.is_empty());
    assert_eq!(posted.split.platform_share, 200); // 两级2.5%都归平台
}

#[tokio::test]
async fn test_tiny_donation_creates_no_zero_amount_entries() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    referral_service(&store)
        .resolve_attribution("artist", Some("tok-upper"))
        .await
        .unwrap();

    // 39分：2.5%截断为0，不应产生0金额的账目行
    let posted = donation_service(&store)
        .confirm_donation(donation_request("don-tiny", 39, "artist"))
        .await
        .unwrap();

    assert!(posted.entries.is_empty());
    assert!(posted.split.verify(39));
}

// ---------------------------------------------------------------- 状态机

#[tokio::test]
async fn test_cancel_then_pay_is_rejected() {
    let store = MockStore::new();
    store.issue_token_at("upper", "tok-upper", now());
    referral_service(&store)
        .resolve_attribution("artist", Some("tok-upper"))
        .await
        .unwrap();

    let old = now() - 30 * DAY;
    let entry = CommissionEntry::new_pending("don-1", "upper", 1, 2000, old);
    let entry_id = entry.entry_id.clone();
    LedgerRepositoryTrait::insert_entry(store.as_ref(), entry).await.unwrap();

    // 先取消(退款)
    LedgerRepositoryTrait::cancel_entry(store.as_ref(), &entry_id, "chargeback")
        .await
        .unwrap();
    assert_eq!(store.entry_status(&entry_id), Some(CommissionStatus::Cancelled));

    // 取消后的记录不能再被结算
    let payout = payout_service(&store, 14 * DAY, 1000);
    let batches = payout.run_cycle(now()).await.unwrap();
    assert!(batches.is_empty());

    // 再次取消同样被拒
    let again = LedgerRepositoryTrait::cancel_entry(store.as_ref(), &entry_id, "retry").await;
    assert!(matches!(again, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn test_cancel_paid_entry_is_invalid_transition() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    let entry = CommissionEntry::new_pending("don-1", "upper", 1, 2000, old);
    let entry_id = entry.entry_id.clone();
    LedgerRepositoryTrait::insert_entry(store.as_ref(), entry).await.unwrap();

    // 结算后entry变paid
    payout_service(&store, 14 * DAY, 1000).run_cycle(now()).await.unwrap();
    assert_eq!(store.entry_status(&entry_id), Some(CommissionStatus::Paid));

    // paid后的取消需要走独立的clawback流程，这里必须拒绝
    let result = LedgerRepositoryTrait::cancel_entry(store.as_ref(), &entry_id, "too late").await;
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));
}

// ---------------------------------------------------------------- 结算

/// 造一条已过冻结期的pending账目
async fn seed_entry(store: &Arc<MockStore>, donation_id: &str, beneficiary: &str, amount: u64, created_at: u64) {
    let entry = CommissionEntry::new_pending(donation_id, beneficiary, 1, amount, created_at);
    LedgerRepositoryTrait::insert_entry(store.as_ref(), entry).await.unwrap();
}

#[tokio::test]
async fn test_payout_batches_matured_entries() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    seed_entry(&store, "d1", "upper", 600, old).await;
    seed_entry(&store, "d2", "upper", 700, old).await;

    let service = payout_service(&store, 14 * DAY, 1000);
    let batches = service.run_cycle(now()).await.unwrap();

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].beneficiary_id, "upper");
    assert_eq!(batches[0].total, 1300);
    assert_eq!(batches[0].entry_ids.len(), 2);

    // 批次内所有entry都被原子标记为paid
    for entry in store.all_entries() {
        assert_eq!(entry.status, CommissionStatus::Paid);
        assert_eq!(entry.payout_batch_id.as_deref(), Some(batches[0].batch_id.as_str()));
    }
}

#[tokio::test]
async fn test_payout_skips_below_threshold() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    seed_entry(&store, "d1", "small-fry", 999, old).await;

    let service = payout_service(&store, 14 * DAY, 1000);
    let batches = service.run_cycle(now()).await.unwrap();

    // 不做部分结算：低于门槛整体跳过，entry保持pending
    assert!(batches.is_empty());
    assert!(store
        .all_entries()
        .iter()
        .all(|e| e.status == CommissionStatus::Pending));
}

#[tokio::test]
async fn test_payout_respects_hold_period() {
    let store = MockStore::new();
    seed_entry(&store, "d1", "upper", 5000, now() - 2 * DAY).await;

    let service = payout_service(&store, 14 * DAY, 1000);
    let batches = service.run_cycle(now()).await.unwrap();

    // 入账才2天，未过14天冻结期
    assert!(batches.is_empty());
    assert!(store
        .all_entries()
        .iter()
        .all(|e| e.status == CommissionStatus::Pending));
}

#[tokio::test]
async fn test_payout_rerun_in_same_window_is_noop() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    seed_entry(&store, "d1", "upper", 5000, old).await;

    let service = payout_service(&store, 14 * DAY, 1000);
    let run_at = now();

    let first = service.run_cycle(run_at).await.unwrap();
    assert_eq!(first.len(), 1);

    // 同一窗口重跑：没有第二个批次，也不会有entry被两个批次共享
    let second = service.run_cycle(run_at).await.unwrap();
    assert!(second.is_empty());

    let state_batches = PayoutRepositoryTrait::list_batches(store.as_ref(), "upper", 100)
        .await
        .unwrap();
    assert_eq!(state_batches.len(), 1);
}

#[tokio::test]
async fn test_payout_batches_are_per_beneficiary() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    seed_entry(&store, "d1", "alice", 2000, old).await;
    seed_entry(&store, "d2", "bob", 3000, old).await;
    seed_entry(&store, "d3", "carol", 500, old).await; // 低于门槛

    let service = payout_service(&store, 14 * DAY, 1000);
    let mut batches = service.run_cycle(now()).await.unwrap();
    batches.sort_by(|a, b| a.beneficiary_id.cmp(&b.beneficiary_id));

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].beneficiary_id, "alice");
    assert_eq!(batches[0].total, 2000);
    assert_eq!(batches[1].beneficiary_id, "bob");
    assert_eq!(batches[1].total, 3000);
}

// ---------------------------------------------------------------- 读模型

#[tokio::test]
async fn test_totals_reflect_lifecycle() {
    let store = MockStore::new();
    let old = now() - 30 * DAY;
    seed_entry(&store, "d1", "upper", 2000, old).await;
    seed_entry(&store, "d2", "upper", 300, old).await;

    // 取消一条，结算——剩下的那条单独成批
    let cancel_target = store
        .all_entries()
        .iter()
        .find(|e| e.amount == 300)
        .map(|e| e.entry_id.clone())
        .unwrap();
    LedgerRepositoryTrait::cancel_entry(store.as_ref(), &cancel_target, "refund")
        .await
        .unwrap();
    payout_service(&store, 14 * DAY, 1000).run_cycle(now()).await.unwrap();

    let totals = LedgerRepositoryTrait::get_totals(store.as_ref(), "upper").await.unwrap();
    assert_eq!(totals.pending_total, 0);
    assert_eq!(totals.paid_total, 2000);
    assert_eq!(totals.paid_count, 1);
    assert_eq!(totals.cancelled_total, 300);
    assert_eq!(totals.cancelled_count, 1);
}
