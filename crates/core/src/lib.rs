//! # BulkOps Core
//!
//! 批量操作管道的共享内核：数据模型、错误类型、仓储与外部服务接口、
//! 配置加载和日志初始化。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use errors::*;
pub use logging::init_logging;
