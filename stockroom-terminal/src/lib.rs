//! Stockroom Terminal - 扫码盘点终端
//!
//! # 架构概述
//!
//! - **条码解析** (`resolver`): 本月库存 → 本地价格缓存 → 商品目录 → 空白草稿
//! - **分类/税率推断** (`inference`): 目录标签到分类与税率的有序规则
//! - **离线写入队列** (`queue`): 先写 redb，再投递后端，失败交给重试 worker
//! - **扫码会话** (`scan`): 每次解码只触发一次解析
//!
//! # 模块结构
//!
//! ```text
//! stockroom-terminal/src/
//! ├── config.rs       # 环境变量配置
//! ├── logger.rs       # tracing 日志
//! ├── inference.rs    # 分类/税率推断
//! ├── price_cache.rs  # 本地价格缓存
//! ├── resolver.rs     # 条码解析
//! ├── categories.rs   # 租户分类表
//! ├── inventory.rs    # 当月库存快照
//! ├── quick_count.rs  # 快速盘点 (每次扫码 +1)
//! ├── queue/          # 离线写入队列 + 重试 worker
//! └── scan/           # 解码设备 + 扫码会话
//! ```

pub mod categories;
pub mod config;
pub mod inference;
pub mod inventory;
pub mod logger;
pub mod price_cache;
pub mod queue;
pub mod quick_count;
pub mod resolver;
pub mod scan;

// Re-export 公共类型
pub use categories::{CategoryError, CategoryStore, Confirm};
pub use config::TerminalConfig;
pub use inventory::{InventorySnapshot, SharedInventory};
pub use logger::{cleanup_old_logs, init_logger};
pub use price_cache::{PriceCache, PriceEntry};
pub use queue::{
    QueueStorage, RetryPolicy, RetryScheduler, RetryWorker, SubmitError, SubmitOutcome,
    WriteQueue, retry_channel,
};
pub use quick_count::{CountOutcome, count_scan};
pub use resolver::{BarcodeResolver, ResolverResult};
pub use scan::{DecodeDevice, DecodeEvent, KeyboardWedge, ScanConfig, ScanSession, ScanState};

/// 设置运行环境: dotenv, 配置, 工作目录, 日志
pub fn setup_environment() -> anyhow::Result<TerminalConfig> {
    dotenv::dotenv().ok();

    let config = TerminalConfig::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let log_dir = config.log_dir();
    init_logger(&config.log_level, config.log_json, Some(&log_dir))?;

    Ok(config)
}
