use clap::Parser;

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
#[clap(rename_all = "lowercase")]
pub enum CargoEnv {
    Development,
    Production,
}

/// 环境配置加载器
pub struct EnvLoader;

impl EnvLoader {
    /// 根据 CARGO_ENV 加载对应的环境配置文件
    pub fn load_env_file() -> Result<(), Box<dyn std::error::Error>> {
        // 1. 获取环境变量 CARGO_ENV development
        let cargo_env = std::env::var("CARGO_ENV").unwrap_or_else(|_| "development".to_string());

        // 2. 构建配置文件路径
        let env_file = match cargo_env.as_str() {
            "production" | "Production" | "prod" => ".env.production",
            "development" | "Development" | "dev" => ".env.development",
            "test" | "Test" => ".env.test",
            _ => {
                println!("⚠️  未知的 CARGO_ENV: {}，使用默认的 .env.development", cargo_env);
                ".env.development"
            }
        };

        // 3. 检查文件是否存在
        if !std::path::Path::new(env_file).exists() {
            eprintln!("⚠️  配置文件 {} 不存在，尝试加载默认的 .env 文件", env_file);
            // 回退到默认的 .env 文件
            if std::path::Path::new(".env").exists() {
                dotenvy::from_filename(".env")?;
                println!("✅ 已加载默认配置文件: .env");
            } else {
                eprintln!("❌ 未找到任何配置文件，使用默认配置");
            }
            return Ok(());
        }

        // 4. 加载指定的环境配置文件
        dotenvy::from_filename(env_file)?;
        println!("✅ 已加载环境配置文件: {} (CARGO_ENV={})", env_file, cargo_env);

        Ok(())
    }
}

#[derive(clap::Parser, Clone)]
pub struct AppConfig {
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    #[clap(long, env, default_value = "0.0.0.0")]
    pub app_host: String,

    #[clap(long, env, default_value = "8000")]
    pub app_port: u16,

    #[clap(long, env, default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    #[clap(long, env)]
    pub mongo_db: String,

    #[clap(long, env, default_value = "info")]
    pub rust_log: String,

    /// 推荐归因窗口(天): Token点击/签发后多少天内的注册可以被归因
    #[clap(long, env, default_value = "90")]
    pub attribution_window_days: u64,

    /// 佣金冻结期(天): 入账后需等待多少天才能进入结算
    #[clap(long, env, default_value = "14")]
    pub hold_period_days: u64,

    /// 最小结算门槛(货币最小单位): 低于此金额的受益人本轮跳过
    #[clap(long, env, default_value = "1000")]
    pub min_payout_threshold: u64,

    /// 结算任务的cron表达式(默认每天UTC 00:00:00)
    #[clap(long, env, default_value = "0 0 0 * * *")]
    pub payout_cron: String,
}

impl AppConfig {
    pub fn attribution_window_secs(&self) -> u64 {
        self.attribution_window_days * 86_400
    }

    pub fn hold_period_secs(&self) -> u64 {
        self.hold_period_days * 86_400
    }
}
