use crate::{
    is_duplicate_key_error,
    ledger::model::{CommissionEntry, CommissionStatus, LedgerTotals},
    Database,
};
use async_trait::async_trait;
use chrono::prelude::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::FindOptions;
use std::sync::Arc;
use tracing::error;
use utils::{AppError, AppResult};

pub type DynLedgerRepository = Arc<dyn LedgerRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait LedgerRepositoryTrait {
    /// 写入一条pending佣金记录
    ///
    /// `(donation_id, tier)` 撞唯一索引时返回已存在的那条——
    /// 重放同一笔捐赠得到完全相同的账目行集合，总额不会翻倍。
    async fn insert_entry(&self, entry: CommissionEntry) -> AppResult<CommissionEntry>;

    async fn find_by_entry_id(&self, entry_id: &str) -> AppResult<Option<CommissionEntry>>;

    /// dashboard读模型：按受益人(可选按状态)列账目
    async fn list_entries(
        &self,
        beneficiary_id: &str,
        status: Option<CommissionStatus>,
        limit: i64,
    ) -> AppResult<Vec<CommissionEntry>>;

    /// 调度器读模型：某受益人已过冻结期的pending账目
    async fn list_pending_older_than(&self, beneficiary_id: &str, cutoff: u64) -> AppResult<Vec<CommissionEntry>>;

    /// 所有存在过期pending账目的受益人及其pending总额
    async fn pending_beneficiaries(&self, cutoff: u64) -> AppResult<Vec<(String, u64)>>;

    /// 受益人的pending/paid/cancelled汇总
    async fn get_totals(&self, beneficiary_id: &str) -> AppResult<LedgerTotals>;

    /// pending → cancelled(捐赠退款/拒付时)
    ///
    /// 已经paid或cancelled的记录返回InvalidTransition；
    /// paid后的追回走独立的clawback流程，不在本层处理。
    async fn cancel_entry(&self, entry_id: &str, reason: &str) -> AppResult<CommissionEntry>;

    /// 整组账目 pending → paid，单事务全有或全无
    async fn mark_paid(&self, entry_ids: &[String], payout_batch_id: &str) -> AppResult<()>;
}

#[async_trait]
impl LedgerRepositoryTrait for Database {
    async fn insert_entry(&self, entry: CommissionEntry) -> AppResult<CommissionEntry> {
        match self.commission_entries.insert_one(&entry, None).await {
            Ok(_) => Ok(entry),
            Err(err) if is_duplicate_key_error(&err) => {
                let filter = doc! { "donation_id": &entry.donation_id, "tier": entry.tier as i32 };
                self.commission_entries
                    .find_one(filter, None)
                    .await?
                    .ok_or_else(|| AppError::AlreadyPosted(entry.donation_id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_entry_id(&self, entry_id: &str) -> AppResult<Option<CommissionEntry>> {
        let filter = doc! { "entry_id": entry_id };
        let entry = self.commission_entries.find_one(filter, None).await?;

        Ok(entry)
    }

    async fn list_entries(
        &self,
        beneficiary_id: &str,
        status: Option<CommissionStatus>,
        limit: i64,
    ) -> AppResult<Vec<CommissionEntry>> {
        let mut filter = doc! { "beneficiary_id": beneficiary_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();

        let cursor = self.commission_entries.find(filter, options).await?;
        let entries = cursor.try_collect().await?;

        Ok(entries)
    }

    async fn list_pending_older_than(&self, beneficiary_id: &str, cutoff: u64) -> AppResult<Vec<CommissionEntry>> {
        let filter = doc! {
            "beneficiary_id": beneficiary_id,
            "status": CommissionStatus::Pending.as_str(),
            "created_at": { "$lte": cutoff as i64 },
        };

        let cursor = self.commission_entries.find(filter, None).await?;
        let entries = cursor.try_collect().await?;

        Ok(entries)
    }

    async fn pending_beneficiaries(&self, cutoff: u64) -> AppResult<Vec<(String, u64)>> {
        let pipeline = vec![
            doc! { "$match": {
                "status": CommissionStatus::Pending.as_str(),
                "created_at": { "$lte": cutoff as i64 },
            }},
            doc! { "$group": {
                "_id": "$beneficiary_id",
                "total": { "$sum": "$amount" },
            }},
        ];

        let mut cursor = self.commission_entries.aggregate(pipeline, None).await?;
        let mut result = Vec::new();

        while let Some(group) = cursor.try_next().await? {
            let beneficiary = group.get_str("_id").unwrap_or_default().to_string();
            let total = read_sum(&group, "total");
            result.push((beneficiary, total));
        }

        Ok(result)
    }

    async fn get_totals(&self, beneficiary_id: &str) -> AppResult<LedgerTotals> {
        let pipeline = vec![
            doc! { "$match": { "beneficiary_id": beneficiary_id } },
            doc! { "$group": {
                "_id": "$status",
                "total": { "$sum": "$amount" },
                "count": { "$sum": 1 },
            }},
        ];

        let mut cursor = self.commission_entries.aggregate(pipeline, None).await?;
        let mut totals = LedgerTotals {
            beneficiary_id: beneficiary_id.to_string(),
            ..Default::default()
        };

        while let Some(group) = cursor.try_next().await? {
            let total = read_sum(&group, "total");
            let count = read_sum(&group, "count");

            match group.get_str("_id").unwrap_or_default() {
                "pending" => {
                    totals.pending_total = total;
                    totals.pending_count = count;
                }
                "paid" => {
                    totals.paid_total = total;
                    totals.paid_count = count;
                }
                "cancelled" => {
                    totals.cancelled_total = total;
                    totals.cancelled_count = count;
                }
                other => {
                    error!("🔴 unknown commission status in ledger: {}", other);
                }
            }
        }

        Ok(totals)
    }

    async fn cancel_entry(&self, entry_id: &str, reason: &str) -> AppResult<CommissionEntry> {
        // 条件更新只命中pending行：paid/cancelled不会被覆盖
        let filter = doc! {
            "entry_id": entry_id,
            "status": CommissionStatus::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": CommissionStatus::Cancelled.as_str(),
                "cancel_reason": reason,
            },
        };

        let result = self.commission_entries.update_one(filter, update, None).await?;

        if result.modified_count == 1 {
            return self
                .find_by_entry_id(entry_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("entry {} vanished after cancel", entry_id)));
        }

        // 没有命中：区分"不存在"和"状态机违规"
        match self.find_by_entry_id(entry_id).await? {
            None => Err(AppError::NotFound(format!("commission entry {} not found", entry_id))),
            Some(entry) => Err(AppError::InvalidTransition(format!(
                "cancel entry {}: status is {}, expected pending",
                entry_id,
                entry.status.as_str()
            ))),
        }
    }

    async fn mark_paid(&self, entry_ids: &[String], payout_batch_id: &str) -> AppResult<()> {
        if entry_ids.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "entry_id": { "$in": entry_ids },
            "status": CommissionStatus::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": CommissionStatus::Paid.as_str(),
                "payout_batch_id": payout_batch_id,
                "paid_at": Utc::now().timestamp(),
            },
        };

        let result = self
            .commission_entries
            .update_many_with_session(filter, update, None, &mut session)
            .await?;

        if result.modified_count as usize != entry_ids.len() {
            // 有记录不在pending：整组回滚，不做部分提交
            session.abort_transaction().await?;
            return Err(AppError::InvalidTransition(format!(
                "mark_paid batch {}: {} of {} entries were not pending",
                payout_batch_id,
                entry_ids.len() - result.modified_count as usize,
                entry_ids.len()
            )));
        }

        session.commit_transaction().await?;
        Ok(())
    }
}

/// 聚合结果里的数值字段可能是int32/int64，统一读成u64
fn read_sum(group: &Document, key: &str) -> u64 {
    if let Ok(v) = group.get_i64(key) {
        return v.max(0) as u64;
    }
    if let Ok(v) = group.get_i32(key) {
        return v.max(0) as u64;
    }
    0
}
