// PayoutTimer: 按cron表达式定时执行结算周期
// - 到点把过了冻结期、达到门槛的pending佣金打成批次
// - 错过的周期不补跑：批次窗口幂等，下一个周期自然覆盖
use chrono::Utc;
use cron::Schedule;
use server::services::{payout_service::PayoutServiceTrait, Services};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::{task, time::sleep_until};
use tracing::{error, info};

#[derive(Clone)]
pub struct PayoutTimer {
    pub cron: String,
    pub services: Services,
}

impl PayoutTimer {
    // "0 0 0 * * *": 每天UTC 00:00:00执行
    pub fn new(cron: Option<String>, services: Services) -> Self {
        match cron {
            Some(cron) => PayoutTimer { cron, services },
            None => PayoutTimer {
                cron: "0 0 0 * * *".to_string(),
                services,
            },
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("⏳ payout timer scheduled at '{}' (UTC).", self.cron);

        let schedule = match Schedule::from_str(&self.cron) {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("🔴 invalid payout cron '{}': {}, falling back to daily", self.cron, e);
                Schedule::from_str("0 0 0 * * *").expect("builtin cron expression is valid")
            }
        };

        loop {
            let now = Utc::now();
            let next_run_time = match schedule.upcoming(Utc).next() {
                Some(t) => t,
                None => {
                    error!("🔴 payout cron '{}' yields no upcoming runs, timer stopping", self.cron);
                    return;
                }
            };

            let duration_until_next_run = (next_run_time - now).to_std().unwrap_or(Duration::from_secs(0));

            sleep_until(tokio::time::Instant::now() + duration_until_next_run).await;

            let this = Arc::clone(&self);
            let handle = task::spawn(async move {
                this.run_payout_cycle().await;
            });

            if let Err(e) = handle.await {
                error!("🔴 payout cycle task panicked: {}", e);
            }
        }
    }

    async fn run_payout_cycle(&self) {
        let now = Utc::now().timestamp() as u64;

        match self.services.payout.run_cycle(now).await {
            Ok(batches) => {
                let total: u64 = batches.iter().map(|b| b.total).sum();
                info!("💸 scheduled payout cycle done: {} batches, total {}", batches.len(), total);
            }
            Err(e) => {
                // 失败不致命：窗口幂等，下个周期(或手动/payout/run)会重试
                error!("🔴 scheduled payout cycle failed: {}", e);
            }
        }
    }
}
