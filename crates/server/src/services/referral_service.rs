use async_trait::async_trait;
use chrono::Utc;
use commission::ReferralChain;
use database::referral::repository::{DynReferralRepository, ReferralRepositoryTrait};
use database::token::model::ReferralToken;
use database::token::repository::{DynTokenRepository, TokenRepositoryTrait};
use std::sync::Arc;
use tracing::{info, warn};
use utils::{AppError, AppResult};

pub type DynReferralService = Arc<dyn ReferralServiceTrait + Send + Sync>;

/// 归因结果：attributed=false + noop_reason 表示安全重试的no-op
#[derive(Debug, Clone)]
pub struct AttributionOutcome {
    pub attributed: bool,
    pub parent_id: Option<String>,
    pub noop_reason: Option<String>,
}

#[async_trait]
pub trait ReferralServiceTrait {
    /// 注册归因：决定新用户是否、归因给谁
    ///
    /// - 没带推荐码: 不归因，成功返回(用户永久无推荐人)
    /// - 码不存在/超窗/自推荐/成环: 对应错误
    /// - 用户已绑定其它推荐人: no-op，不作为失败返回
    ///
    /// 归因成功即写入tier-1边；tier-2关系由get_ancestors惰性推导，不冗余存储。
    async fn resolve_attribution(&self, new_user_id: &str, code: Option<&str>) -> AppResult<AttributionOutcome>;

    /// 用户的上级&上上级(最多2个，由近到远)
    async fn get_ancestors(&self, user_id: &str) -> AppResult<Vec<String>>;

    /// 某个用户(受赠人)的推荐链，供佣金计算使用
    async fn get_chain(&self, user_id: &str) -> AppResult<ReferralChain>;

    /// 取用户的分享码，没有则签发
    async fn get_or_issue_token(&self, user_id: &str) -> AppResult<ReferralToken>;
}

#[derive(Clone)]
pub struct ReferralService {
    referrals: DynReferralRepository,
    tokens: DynTokenRepository,
    /// 归因窗口(秒)
    window_secs: u64,
}

impl ReferralService {
    pub fn new(referrals: DynReferralRepository, tokens: DynTokenRepository, window_secs: u64) -> Self {
        Self {
            referrals,
            tokens,
            window_secs,
        }
    }
}

#[async_trait]
impl ReferralServiceTrait for ReferralService {
    async fn resolve_attribution(&self, new_user_id: &str, code: Option<&str>) -> AppResult<AttributionOutcome> {
        let code = match code {
            Some(code) => code,
            None => {
                // 无推荐码注册，合法且常见
                return Ok(AttributionOutcome {
                    attributed: false,
                    parent_id: None,
                    noop_reason: Some("no referral code presented".to_string()),
                });
            }
        };

        let token = self
            .tokens
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::TokenNotFound(code.to_string()))?;

        let now = Utc::now().timestamp() as u64;
        if !token.is_within_window(now, self.window_secs) {
            // 归因窗口由本层强制执行，不信任调用方的过滤
            return Err(AppError::TokenExpired(code.to_string()));
        }

        if token.owner_id == new_user_id {
            return Err(AppError::SelfReferral(new_user_id.to_string()));
        }

        match self.referrals.create_edge(new_user_id, &token.owner_id).await {
            Ok(edge) => {
                info!("🔗 user {} attributed to {}", new_user_id, edge.parent_id);
                Ok(AttributionOutcome {
                    attributed: true,
                    parent_id: Some(edge.parent_id),
                    noop_reason: None,
                })
            }
            Err(err) if err.is_retry_noop() => {
                // first-write-wins：已有归因保持不变，对外等价于成功
                warn!("⚠️ attribution no-op for user {}: {}", new_user_id, err);
                let existing = self.referrals.get_parent(new_user_id).await?;
                Ok(AttributionOutcome {
                    attributed: false,
                    parent_id: existing,
                    noop_reason: Some(err.to_string()),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn get_ancestors(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.referrals.get_ancestors(user_id).await
    }

    async fn get_chain(&self, user_id: &str) -> AppResult<ReferralChain> {
        let ancestors = self.referrals.get_ancestors(user_id).await?;

        Ok(ReferralChain::from_ancestors(&ancestors))
    }

    async fn get_or_issue_token(&self, user_id: &str) -> AppResult<ReferralToken> {
        self.tokens.get_or_issue(user_id).await
    }
}
