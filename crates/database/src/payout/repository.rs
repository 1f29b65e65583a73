use crate::{
    is_duplicate_key_error,
    ledger::model::CommissionStatus,
    payout::model::PayoutBatch,
    Database,
};
use async_trait::async_trait;
use chrono::prelude::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use std::sync::Arc;
use utils::{AppError, AppResult};

pub type DynPayoutRepository = Arc<dyn PayoutRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait PayoutRepositoryTrait {
    /// 创建批次并把其中的佣金记录标记为paid，单事务全有或全无
    ///
    /// - `(beneficiary_id, cycle_window)` 撞唯一索引: 本周期已经结算过，
    ///   返回None(调度器重跑的幂等路径)
    /// - 有entry不在pending: 整个事务回滚，返回InvalidTransition——
    ///   绝不会出现批次落库而entry没标记、或两个批次共享同一条entry
    async fn commit_batch(&self, batch: PayoutBatch) -> AppResult<Option<PayoutBatch>>;

    /// 导出读模型：某受益人的历史批次(时间倒序)
    async fn list_batches(&self, beneficiary_id: &str, limit: i64) -> AppResult<Vec<PayoutBatch>>;
}

#[async_trait]
impl PayoutRepositoryTrait for Database {
    async fn commit_batch(&self, batch: PayoutBatch) -> AppResult<Option<PayoutBatch>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self.payout_batches.insert_one_with_session(&batch, None, &mut session).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key_error(&err) => {
                // 本周期已有批次，调度器重跑——什么都不做
                session.abort_transaction().await?;
                return Ok(None);
            }
            Err(err) => {
                session.abort_transaction().await?;
                return Err(err.into());
            }
        }

        let filter = doc! {
            "entry_id": { "$in": &batch.entry_ids },
            "status": CommissionStatus::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "status": CommissionStatus::Paid.as_str(),
                "payout_batch_id": &batch.batch_id,
                "paid_at": Utc::now().timestamp(),
            },
        };

        let result = self
            .commission_entries
            .update_many_with_session(filter, update, None, &mut session)
            .await?;

        if result.modified_count as usize != batch.entry_ids.len() {
            session.abort_transaction().await?;
            return Err(AppError::InvalidTransition(format!(
                "payout batch for {} in window {}: {} of {} entries were not pending",
                batch.beneficiary_id,
                batch.cycle_window,
                batch.entry_ids.len() - result.modified_count as usize,
                batch.entry_ids.len()
            )));
        }

        session.commit_transaction().await?;
        Ok(Some(batch))
    }

    async fn list_batches(&self, beneficiary_id: &str, limit: i64) -> AppResult<Vec<PayoutBatch>> {
        let filter = doc! { "beneficiary_id": beneficiary_id };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();

        let cursor = self.payout_batches.find(filter, options).await?;
        let batches = cursor.try_collect().await?;

        Ok(batches)
    }
}
