// crates/ln_io/src/error.rs
//! IO 错误类型定义
//!
//! 提供 IO 层的统一错误枚举，通过 thiserror 自动转换底层错误。

use std::path::PathBuf;

use ln_foundation::LnError;
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 底层文件系统错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// NPY/NPZ 读写失败
    #[error("数组文件读写失败: {path}, {message}")]
    Npy {
        /// 文件路径
        path: PathBuf,
        /// 错误信息
        message: String,
    },

    /// 数据尚未生成
    #[error("数据文件不存在: {path}")]
    MissingArtifact {
        /// 期望的文件路径
        path: PathBuf,
    },

    /// 索引文件损坏
    #[error("索引文件损坏: {path}:{line} - {message}")]
    IndexCorruption {
        /// 索引文件路径
        path: PathBuf,
        /// 行号（从 1 开始）
        line: usize,
        /// 错误信息
        message: String,
    },

    /// 远程下载失败（达到最大尝试次数）
    #[error("下载失败: {url} 尝试 {attempts} 次, 最后错误: {message}")]
    Fetch {
        /// 请求地址
        url: String,
        /// 尝试次数
        attempts: u32,
        /// 最后一次错误
        message: String,
    },

    /// 基础层错误转换
    #[error("基础层错误: {0}")]
    Foundation(#[from] LnError),
}

impl IoError {
    /// NPY 错误
    pub fn npy(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Npy {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// 是否表示数据尚未生成
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = IoError::IndexCorruption {
            path: PathBuf::from("data_points.txt"),
            line: 3,
            message: "bad field".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data_points.txt:3"));
        assert!(msg.contains("bad field"));
    }

    #[test]
    fn test_missing() {
        let err = IoError::MissingArtifact {
            path: PathBuf::from("x.npy"),
        };
        assert!(err.is_missing());
        assert!(!IoError::npy("x.npy", "truncated").is_missing());
    }
}
