// crates/ln_config/src/lib.rs

//! LatNet Config Layer
//!
//! 训练域的 JSON 配置。
//!
//! # 模块概览
//!
//! - [`domain_config`]: `DomainConfig` 及数据来源、生成参数
//! - [`network_config`]: 网络几何参数
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain_config;
pub mod error;
pub mod network_config;

// 重导出核心类型
pub use domain_config::{
    BackendConfig, DomainConfig, GenerationConfig, LocalSolverConfig, RemoteDatasetConfig,
};
pub use error::ConfigError;
pub use network_config::NetworkConfig;
