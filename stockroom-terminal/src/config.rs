use std::path::PathBuf;
use std::time::Duration;
use stockroom_client::ClientConfig;

use crate::queue::RetryPolicy;

/// 终端配置 - 扫码终端的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./stockroom-data | 工作目录 (队列数据库、日志) |
/// | BACKEND_URL | http://localhost:8000 | 库存后端地址 |
/// | BACKEND_TOKEN | - | 后端 Bearer token |
/// | CATALOG_URL | https://world.openfoodfacts.org | 商品目录服务地址 |
/// | PRICE_CACHE_PATH | {WORK_DIR}/prices.json | 本地价格缓存 |
/// | REQUEST_TIMEOUT_SECS | 10 | 请求超时(秒) |
/// | RETRY_SCAN_INTERVAL_SECS | 60 | 重试队列扫描间隔(秒) |
/// | SENT_RETENTION_SECS | 604800 | 已发送记录保留时间(秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志格式 |
/// | TENANT_ID | default | 租户 ID (分类表) |
/// | QUICK_COUNT | false | 快速盘点: 扫码即提交 (已有商品数量 +1) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/stockroom BACKEND_URL=https://api.example.com cargo run
/// ```
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// 工作目录
    pub work_dir: PathBuf,
    /// 库存后端 URL
    pub backend_url: String,
    /// 后端认证 token
    pub backend_token: Option<String>,
    /// 商品目录服务 URL
    pub catalog_url: String,
    /// 价格缓存文件
    pub price_cache_path: PathBuf,
    /// 请求超时 (秒)
    pub request_timeout_secs: u64,
    /// 重试扫描间隔 (秒)
    pub retry_scan_interval_secs: u64,
    /// 已发送记录保留时间 (秒)
    pub sent_retention_secs: u64,
    /// 日志级别
    pub log_level: String,
    /// JSON 日志
    pub log_json: bool,
    /// 租户 ID
    pub tenant_id: String,
    /// 快速盘点模式
    pub quick_count: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl TerminalConfig {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let work_dir =
            PathBuf::from(std::env::var("WORK_DIR").unwrap_or_else(|_| "./stockroom-data".into()));
        let price_cache_path = std::env::var("PRICE_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("prices.json"));

        Self {
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            backend_token: std::env::var("BACKEND_TOKEN").ok().filter(|t| !t.is_empty()),
            catalog_url: std::env::var("CATALOG_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org".into()),
            price_cache_path,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 10),
            retry_scan_interval_secs: env_parse("RETRY_SCAN_INTERVAL_SECS", 60),
            sent_retention_secs: env_parse("SENT_RETENTION_SECS", 7 * 24 * 3600),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_parse("LOG_JSON", false),
            tenant_id: std::env::var("TENANT_ID").unwrap_or_else(|_| "default".into()),
            quick_count: env_parse("QUICK_COUNT", false),
            work_dir,
        }
    }

    /// redb 队列数据库路径
    pub fn queue_db_path(&self) -> PathBuf {
        self.work_dir.join("write-queue.redb")
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("logs")
    }

    pub fn backend_client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.backend_url).with_timeout(self.request_timeout_secs);
        match &self.backend_token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }

    pub fn catalog_client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.catalog_url).with_timeout(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            scan_interval: Duration::from_secs(self.retry_scan_interval_secs),
            sent_retention: Duration::from_secs(self.sent_retention_secs),
            ..RetryPolicy::default()
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
