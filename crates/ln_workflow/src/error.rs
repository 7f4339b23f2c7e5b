// crates/ln_workflow/src/error.rs

//! 工作流错误类型

use ln_config::ConfigError;
use ln_foundation::LnError;
use ln_io::IoError;
use thiserror::Error;

/// 工作流结果类型
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// 工作流错误
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// 窗口几何错误
    #[error("Geometry error: {0}")]
    Geometry(#[from] LnError),

    /// 数据读写错误
    #[error("Storage error: {0}")]
    Io(#[from] IoError),

    /// 文件系统错误
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// 求解器无法启动
    #[error("Failed to launch solver `{command}`: {source}")]
    SolverSpawn {
        /// 命令行
        command: String,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 求解器异常退出
    #[error("Solver `{command}` exited with {status}")]
    SolverFailed {
        /// 命令行
        command: String,
        /// 退出状态
        status: String,
    },

    /// 求解器运行后仍缺少检查点
    #[error("Solver produced no checkpoint for iteration {iteration}")]
    MissingCheckpoint {
        /// 迭代步
        iteration: u64,
    },

    /// 编码器错误
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// 压缩数据点需要编码器
    #[error("Compressed data points require a state encoder")]
    MissingEncoder,

    /// 工作线程池错误
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// 索引为空，无法抽样
    #[error("No {0} data points available")]
    EmptyIndex(&'static str),
}

impl WorkflowError {
    /// 是否为配置类错误
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Geometry(e) => e.is_config(),
            _ => false,
        }
    }
}
