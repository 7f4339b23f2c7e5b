// crates/ln_foundation/src/lib.rs

//! LatNet Foundation Layer
//!
//! 数据管线的基础抽象，不依赖数组库。
//!
//! # 模块概览
//!
//! - [`subdomain`]: 轴对齐窗口 `SubDomain`
//! - [`padding`]: 各轴边界填充策略
//! - [`error`]: 统一错误类型与 `ensure!` 宏
//!
//! # 示例
//!
//! ```
//! use ln_foundation::prelude::*;
//!
//! let sub = SubDomain::new(&[-3], &[10]);
//! assert!(sub.validate().is_ok());
//! assert_eq!(sub.end().as_slice(), &[7]);
//!
//! let policies = policies_from_flags(&[true]);
//! assert_eq!(policies[0], PaddingPolicy::Periodic);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod padding;
pub mod subdomain;

// 重导出常用类型
pub use error::{LnError, LnResult};
pub use padding::{policies_from_flags, AxisPolicies, PaddingPolicy};
pub use subdomain::{Coord, SubDomain};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{LnError, LnResult};
    pub use crate::padding::{policies_from_flags, AxisPolicies, PaddingPolicy};
    pub use crate::subdomain::{Coord, SubDomain};
    pub use crate::ensure;
}
