////////////////////////////////////////////////////////////////////////
//
// 1. 每个Domain(Entity)单独一个文件夹
// 2. 每个Domain由两部分组成:
//    - model: 定义Schema
//    - repository: 实际的数据库底层操作
//
//////////////////////////////////////////////////////////////////////

use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Client, Collection, IndexModel};
use std::sync::Arc;
use tracing::info;
use utils::{AppConfig, AppResult};

pub mod donation;
pub mod ledger;
pub mod payout;
pub mod referral;
pub mod token;

pub use donation::model::Donation;
pub use ledger::model::{CommissionEntry, CommissionStatus, LedgerTotals};
pub use payout::model::PayoutBatch;
pub use referral::model::ReferralEdge;
pub use token::model::ReferralToken;

#[derive(Clone)]
pub struct Database {
    /// 结算批次需要多文档事务，仓库层要能开session
    pub client: Client,
    pub referral_edges: Collection<ReferralEdge>,
    pub referral_tokens: Collection<ReferralToken>,
    pub donations: Collection<Donation>,
    pub commission_entries: Collection<CommissionEntry>,
    pub payout_batches: Collection<PayoutBatch>,
}

impl Database {
    pub async fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let db: mongodb::Database = client.database(&config.mongo_db);

        let referral_edges = db.collection("ReferralEdge");
        let referral_tokens = db.collection("ReferralToken");
        let donations = db.collection("Donation");
        let commission_entries = db.collection("CommissionEntry");
        let payout_batches = db.collection("PayoutBatch");

        info!("🧱 database({:#}) connected.", &config.mongo_db);

        Ok(Database {
            client,
            referral_edges,
            referral_tokens,
            donations,
            commission_entries,
            payout_batches,
        })
    }

    /// 建立唯一性约束
    ///
    /// 并发写入的正确性全部依赖这些索引：谁先写入谁赢，
    /// 后到者拿到duplicate key错误并按幂等路径处理。
    pub async fn init_indexes(&self) -> AppResult<()> {
        info!("🔧 初始化数据库唯一索引...");

        // 一个用户最多一条出边(最多一个推荐人)
        self.referral_edges
            .create_index(unique_index(doc! { "child_id": 1 }), None)
            .await?;
        self.referral_edges
            .create_index(plain_index(doc! { "parent_id": 1 }), None)
            .await?;

        // 每个用户一个推荐码，推荐码全局唯一
        self.referral_tokens
            .create_index(unique_index(doc! { "owner_id": 1 }), None)
            .await?;
        self.referral_tokens
            .create_index(unique_index(doc! { "code": 1 }), None)
            .await?;

        // 幂等键：同一笔捐赠只入账一次
        self.donations
            .create_index(unique_index(doc! { "idempotency_key": 1 }), None)
            .await?;
        self.donations
            .create_index(plain_index(doc! { "recipient_id": 1, "created_at": -1 }), None)
            .await?;

        // 每笔捐赠每个层级至多一条佣金记录
        self.commission_entries
            .create_index(unique_index(doc! { "donation_id": 1, "tier": 1 }), None)
            .await?;
        self.commission_entries
            .create_index(unique_index(doc! { "entry_id": 1 }), None)
            .await?;
        self.commission_entries
            .create_index(
                plain_index(doc! { "beneficiary_id": 1, "status": 1, "created_at": 1 }),
                None,
            )
            .await?;

        // 每个受益人每个结算周期至多一个批次(调度器重跑幂等)
        self.payout_batches
            .create_index(unique_index(doc! { "beneficiary_id": 1, "cycle_window": 1 }), None)
            .await?;

        info!("✅ 唯一索引初始化完成");
        Ok(())
    }
}

fn unique_index(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn plain_index(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Mongo duplicate key (E11000) 判定：唯一索引冲突走幂等分支而不是报错
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => write_error.code == 11000,
        ErrorKind::BulkWrite(ref bulk_error) => bulk_error
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == 11000))
            .unwrap_or(false),
        _ => false,
    }
}
