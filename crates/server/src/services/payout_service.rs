use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::ledger::repository::{DynLedgerRepository, LedgerRepositoryTrait};
use database::payout::repository::{DynPayoutRepository, PayoutRepositoryTrait};
use database::PayoutBatch;
use std::sync::Arc;
use tracing::{info, warn};
use utils::AppResult;

pub type DynPayoutService = Arc<dyn PayoutServiceTrait + Send + Sync>;

#[async_trait]
pub trait PayoutServiceTrait {
    /// 执行一轮结算
    ///
    /// 对每个pending总额达到门槛、且账目已过冻结期的受益人建一个批次，
    /// 批次落库与账目标记paid在同一事务内。低于门槛的受益人整体跳过，
    /// 账目保持pending等下一轮。同一周期窗口内重跑是no-op。
    async fn run_cycle(&self, now: u64) -> AppResult<Vec<PayoutBatch>>;

    /// 导出读模型：受益人的历史批次
    async fn list_batches(&self, beneficiary_id: &str) -> AppResult<Vec<PayoutBatch>>;
}

#[derive(Clone)]
pub struct PayoutService {
    ledger: DynLedgerRepository,
    payouts: DynPayoutRepository,
    /// 冻结期(秒)：入账后先挂pending这么久，抵御退款/拒付
    hold_secs: u64,
    /// 最小结算金额(货币最小单位)
    min_threshold: u64,
}

impl PayoutService {
    pub fn new(ledger: DynLedgerRepository, payouts: DynPayoutRepository, hold_secs: u64, min_threshold: u64) -> Self {
        Self {
            ledger,
            payouts,
            hold_secs,
            min_threshold,
        }
    }

    /// 结算周期窗口：UTC日期(YYYY-MM-DD)
    fn cycle_window(now: u64) -> String {
        DateTime::<Utc>::from_timestamp(now as i64, 0)
            .map(|dt| dt.date_naive().to_string())
            .unwrap_or_else(|| "1970-01-01".to_string())
    }
}

#[async_trait]
impl PayoutServiceTrait for PayoutService {
    async fn run_cycle(&self, now: u64) -> AppResult<Vec<PayoutBatch>> {
        let cutoff = now.saturating_sub(self.hold_secs);
        let window = Self::cycle_window(now);

        let candidates = self.ledger.pending_beneficiaries(cutoff).await?;
        info!(
            "⏳ payout cycle {} starting: {} beneficiaries with matured pending entries",
            window,
            candidates.len()
        );

        let mut batches = Vec::new();

        for (beneficiary_id, pending_total) in candidates {
            if pending_total < self.min_threshold {
                // 不做部分结算：低于门槛整体跳过，下一轮再看
                continue;
            }

            let entries = self.ledger.list_pending_older_than(&beneficiary_id, cutoff).await?;
            if entries.is_empty() {
                // 聚合和逐条读取之间被并发取消/结算了
                continue;
            }

            let total: u64 = entries.iter().map(|e| e.amount).sum();
            if total < self.min_threshold {
                continue;
            }

            let entry_ids: Vec<String> = entries.iter().map(|e| e.entry_id.clone()).collect();
            let batch = PayoutBatch::new(&beneficiary_id, total, entry_ids, &window, now);

            match self.payouts.commit_batch(batch).await? {
                Some(batch) => {
                    info!(
                        "💸 payout batch {} committed: beneficiary={} total={} entries={}",
                        batch.batch_id,
                        batch.beneficiary_id,
                        batch.total,
                        batch.entry_ids.len()
                    );
                    batches.push(batch);
                }
                None => {
                    // 本窗口已结算过(调度器重跑)
                    warn!(
                        "⚠️ payout for {} in window {} already built, skipping",
                        beneficiary_id, window
                    );
                }
            }
        }

        info!("✅ payout cycle {} finished: {} new batches", window, batches.len());
        Ok(batches)
    }

    async fn list_batches(&self, beneficiary_id: &str) -> AppResult<Vec<PayoutBatch>> {
        self.payouts.list_batches(beneficiary_id, 100).await
    }
}
