use crate::{is_duplicate_key_error, token::model::ReferralToken, Database};
use async_trait::async_trait;
use chrono::prelude::Utc;
use mongodb::bson::doc;
use std::sync::Arc;
use utils::{AppError, AppResult};
use uuid::Uuid;

pub type DynTokenRepository = Arc<dyn TokenRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait TokenRepositoryTrait {
    /// 返回用户已有的推荐码，没有则签发一个
    ///
    /// owner_id唯一索引吸收并发签发竞争：输掉insert的一方重新读取赢家的码。
    async fn get_or_issue(&self, owner_id: &str) -> AppResult<ReferralToken>;

    /// 按码查找
    async fn find_by_code(&self, code: &str) -> AppResult<Option<ReferralToken>>;

    /// 按所有者查找
    async fn find_by_owner(&self, owner_id: &str) -> AppResult<Option<ReferralToken>>;
}

#[async_trait]
impl TokenRepositoryTrait for Database {
    async fn get_or_issue(&self, owner_id: &str) -> AppResult<ReferralToken> {
        if let Some(existing) = self.find_by_owner(owner_id).await? {
            return Ok(existing);
        }

        let new_token = ReferralToken {
            code: Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now().timestamp() as u64,
        };

        match self.referral_tokens.insert_one(&new_token, None).await {
            Ok(_) => Ok(new_token),
            Err(err) if is_duplicate_key_error(&err) => {
                // 并发签发：别的请求抢先写入，用对方的码
                self.find_by_owner(owner_id)
                    .await?
                    .ok_or_else(|| AppError::Conflict(format!("token for owner {} vanished after conflict", owner_id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<ReferralToken>> {
        let filter = doc! { "code": code };
        let token = self.referral_tokens.find_one(filter, None).await?;

        Ok(token)
    }

    async fn find_by_owner(&self, owner_id: &str) -> AppResult<Option<ReferralToken>> {
        let filter = doc! { "owner_id": owner_id };
        let token = self.referral_tokens.find_one(filter, None).await?;

        Ok(token)
    }
}
