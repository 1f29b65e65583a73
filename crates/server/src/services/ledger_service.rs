use async_trait::async_trait;
use database::ledger::repository::{DynLedgerRepository, LedgerRepositoryTrait};
use database::{CommissionEntry, CommissionStatus, LedgerTotals};
use std::sync::Arc;
use tracing::info;
use utils::{AppError, AppResult};

pub type DynLedgerService = Arc<dyn LedgerServiceTrait + Send + Sync>;

const DEFAULT_LIST_LIMIT: i64 = 100;

#[async_trait]
pub trait LedgerServiceTrait {
    /// dashboard读模型：按受益人列账目
    async fn list_entries(
        &self,
        beneficiary_id: &str,
        status: Option<String>,
        limit: Option<i64>,
    ) -> AppResult<Vec<CommissionEntry>>;

    /// 受益人汇总(pending/paid/cancelled总额与条数)
    async fn get_totals(&self, beneficiary_id: &str) -> AppResult<LedgerTotals>;

    /// 取消pending佣金记录(捐赠退款/拒付)
    async fn cancel_entry(&self, entry_id: &str, reason: &str) -> AppResult<CommissionEntry>;
}

#[derive(Clone)]
pub struct LedgerService {
    ledger: DynLedgerRepository,
}

impl LedgerService {
    pub fn new(ledger: DynLedgerRepository) -> Self {
        Self { ledger }
    }
}

fn parse_status(raw: &str) -> AppResult<CommissionStatus> {
    match raw {
        "pending" => Ok(CommissionStatus::Pending),
        "paid" => Ok(CommissionStatus::Paid),
        "cancelled" => Ok(CommissionStatus::Cancelled),
        other => Err(AppError::BadRequest(format!(
            "unknown status filter '{}', expected pending|paid|cancelled",
            other
        ))),
    }
}

#[async_trait]
impl LedgerServiceTrait for LedgerService {
    async fn list_entries(
        &self,
        beneficiary_id: &str,
        status: Option<String>,
        limit: Option<i64>,
    ) -> AppResult<Vec<CommissionEntry>> {
        let status = status.as_deref().map(parse_status).transpose()?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);

        self.ledger.list_entries(beneficiary_id, status, limit).await
    }

    async fn get_totals(&self, beneficiary_id: &str) -> AppResult<LedgerTotals> {
        self.ledger.get_totals(beneficiary_id).await
    }

    async fn cancel_entry(&self, entry_id: &str, reason: &str) -> AppResult<CommissionEntry> {
        let entry = self.ledger.cancel_entry(entry_id, reason).await?;
        info!("🚫 commission entry {} cancelled: {}", entry_id, reason);

        Ok(entry)
    }
}
