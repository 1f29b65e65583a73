use crate::{donation::model::Donation, is_duplicate_key_error, Database};
use async_trait::async_trait;
use mongodb::bson::doc;
use std::sync::Arc;
use utils::{AppError, AppResult};

pub type DynDonationRepository = Arc<dyn DonationRepositoryTrait + Send + Sync>;

/// create_donation的结果：本次新写入，还是撞上了幂等键
pub enum DonationWrite {
    Created(Donation),
    AlreadyRecorded(Donation),
}

impl DonationWrite {
    pub fn into_donation(self) -> Donation {
        match self {
            DonationWrite::Created(d) | DonationWrite::AlreadyRecorded(d) => d,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, DonationWrite::AlreadyRecorded(_))
    }
}

#[async_trait]
pub trait DonationRepositoryTrait {
    /// 写入捐赠，幂等键唯一索引保证同一笔只落一次
    ///
    /// 撞键时返回已存的记录(AlreadyRecorded)，调用方继续走补账路径——
    /// 网关超时后的重试、部分写入后的重放都靠这条路径收敛。
    async fn create_donation(&self, donation: Donation) -> AppResult<DonationWrite>;

    async fn find_by_idempotency_key(&self, key: &str) -> AppResult<Option<Donation>>;
}

#[async_trait]
impl DonationRepositoryTrait for Database {
    async fn create_donation(&self, donation: Donation) -> AppResult<DonationWrite> {
        match self.donations.insert_one(&donation, None).await {
            Ok(_) => Ok(DonationWrite::Created(donation)),
            Err(err) if is_duplicate_key_error(&err) => {
                let existing = self
                    .find_by_idempotency_key(&donation.idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        AppError::AlreadyPosted(format!(
                            "donation with idempotency key {} exists but could not be read back",
                            donation.idempotency_key
                        ))
                    })?;

                Ok(DonationWrite::AlreadyRecorded(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> AppResult<Option<Donation>> {
        let filter = doc! { "idempotency_key": key };
        let donation = self.donations.find_one(filter, None).await?;

        Ok(donation)
    }
}
