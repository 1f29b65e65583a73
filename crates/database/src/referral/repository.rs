use crate::{is_duplicate_key_error, referral::model::ReferralEdge, Database};
use async_trait::async_trait;
use chrono::prelude::Utc;
use mongodb::bson::doc;
use std::sync::Arc;
use utils::{AppError, AppResult};

pub type DynReferralRepository = Arc<dyn ReferralRepositoryTrait + Send + Sync>;

// 主要用于Service中，表示提供了该Trait功能
#[async_trait]
pub trait ReferralRepositoryTrait {
    /// 写入一条推荐边，first-write-wins
    ///
    /// - child已有相同parent的边: 幂等成功(安全重试)
    /// - child已有不同parent的边: AlreadyAttributed
    /// - child == parent: SelfReferral
    /// - child出现在parent的祖先链上: CycleDetected
    async fn create_edge(&self, child_id: &str, parent_id: &str) -> AppResult<ReferralEdge>;

    /// 获取某个用户的直接推荐人
    async fn get_parent(&self, child_id: &str) -> AppResult<Option<String>>;

    /// 获取某个用户的上级&上上级(缺失的层级直接省略，不报错)
    async fn get_ancestors(&self, child_id: &str) -> AppResult<Vec<String>>;
}

#[async_trait]
impl ReferralRepositoryTrait for Database {
    async fn create_edge(&self, child_id: &str, parent_id: &str) -> AppResult<ReferralEdge> {
        if child_id == parent_id {
            return Err(AppError::SelfReferral(child_id.to_string()));
        }

        // 环检测：沿parent的祖先链一路走到根，child不允许出现在链上。
        // 归因窗口允许已有下级的用户事后绑定推荐人，A→B、B凭A的码
        // 归因这条路径必须在这里拦下，保证图永远是森林。
        let mut current = parent_id.to_string();
        while let Some(ancestor) = self.get_parent(&current).await? {
            if ancestor == child_id {
                return Err(AppError::CycleDetected(child_id.to_string()));
            }
            current = ancestor;
        }

        let new_edge = ReferralEdge {
            child_id: child_id.to_string(),
            parent_id: parent_id.to_string(),
            created_at: Utc::now().timestamp() as u64,
        };

        match self.referral_edges.insert_one(&new_edge, None).await {
            Ok(_) => Ok(new_edge),
            Err(err) if is_duplicate_key_error(&err) => {
                // 唯一索引把并发竞争收敛成确定结果：查出已有的边做裁决
                let existing = self
                    .referral_edges
                    .find_one(doc! { "child_id": child_id }, None)
                    .await?
                    .ok_or_else(|| AppError::AlreadyAttributed(child_id.to_string()))?;

                if existing.parent_id == parent_id {
                    // 同一个parent的重试，视为成功
                    Ok(existing)
                } else {
                    Err(AppError::AlreadyAttributed(child_id.to_string()))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_parent(&self, child_id: &str) -> AppResult<Option<String>> {
        let filter = doc! { "child_id": child_id };
        let edge = self.referral_edges.find_one(filter, None).await?;

        Ok(edge.map(|e| e.parent_id))
    }

    async fn get_ancestors(&self, child_id: &str) -> AppResult<Vec<String>> {
        let mut result = Vec::new();
        let mut current_child = child_id.to_string();

        // 只取上级和上上级(更高的层级不参与分成)
        for _ in 0..2 {
            if let Some(parent) = self.get_parent(&current_child).await? {
                result.push(parent.clone());
                current_child = parent;
            } else {
                break;
            }
        }

        Ok(result)
    }
}
