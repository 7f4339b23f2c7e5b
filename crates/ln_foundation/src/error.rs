// crates/ln_foundation/src/error.rs

//! 错误处理模块，定义基础层统一错误类型
//!
//! 提供 `LnError` 枚举和 `LnResult` 类型别名。上层 crate（`ln_io`、
//! `ln_workflow`）定义各自的错误类型，并通过 `#[from]` 包装本类型。
//!
//! # 示例
//!
//! ```
//! use ln_foundation::error::{LnError, LnResult};
//!
//! fn check_stride(stride: u32) -> LnResult<()> {
//!     ln_foundation::ensure!(stride == 1 || stride == 2, LnError::config("步长只能为 1 或 2"));
//!     Ok(())
//! }
//!
//! assert!(check_stride(2).is_ok());
//! assert!(check_stride(3).is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type LnResult<T> = Result<T, LnError>;

/// LatNet 基础错误类型
#[derive(Error, Debug)]
pub enum LnError {
    // ========================================================================
    // 数据相关错误
    // ========================================================================

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小或维数不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 子域尺寸非正
    #[error("子域尺寸无效: 第{axis}轴 size={size}")]
    NonPositiveSize {
        /// 出错的轴
        axis: usize,
        /// 实际尺寸
        size: i64,
    },

    // ========================================================================
    // 配置相关错误
    // ========================================================================

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl LnError {
    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 是否属于配置类错误（不可重试）
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::NonPositiveSize { .. }
        )
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl LnError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> LnResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }
}

/// 条件不满足时提前返回错误
///
/// 等价于 `if !cond { return Err(err.into()); }`。
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LnError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
        assert!(err.is_config());
    }

    #[test]
    fn test_non_positive_size_display() {
        let err = LnError::NonPositiveSize { axis: 1, size: -2 };
        let msg = err.to_string();
        assert!(msg.contains("第1轴"));
        assert!(msg.contains("-2"));
    }

    #[test]
    fn test_check_size() {
        assert!(LnError::check_size("rank", 3, 3).is_ok());
        assert!(matches!(
            LnError::check_size("rank", 3, 2),
            Err(LnError::SizeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_config_classification() {
        assert!(LnError::invalid_config("stride", "3", "must be 1 or 2").is_config());
        assert!(LnError::NonPositiveSize { axis: 0, size: 0 }.is_config());
        assert!(!LnError::invalid_input("empty").is_config());
        assert!(!LnError::size_mismatch("rank", 2, 3).is_config());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i64) -> LnResult<()> {
            ensure!(value > 0, LnError::invalid_input("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }
}
