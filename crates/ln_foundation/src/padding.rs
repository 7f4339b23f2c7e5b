// crates/ln_foundation/src/padding.rs

//! 边界填充策略
//!
//! 每个轴在 Domain 构造时根据模拟的周期性标志确定一次策略：
//! 周期轴按取模回绕，非周期轴越界部分补零并在填充掩码中标记为 1。

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// 单轴填充策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// 周期回绕
    Periodic,
    /// 越界补零
    #[default]
    Zero,
}

impl PaddingPolicy {
    /// 由周期性标志确定策略
    #[inline]
    pub fn from_periodic(periodic: bool) -> Self {
        if periodic {
            Self::Periodic
        } else {
            Self::Zero
        }
    }

    /// 是否为周期轴
    #[inline]
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Periodic)
    }
}

impl fmt::Display for PaddingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Periodic => write!(f, "periodic"),
            Self::Zero => write!(f, "zero"),
        }
    }
}

/// 各轴策略向量
pub type AxisPolicies = SmallVec<[PaddingPolicy; 3]>;

/// 由各轴周期性标志生成策略向量
pub fn policies_from_flags(periodic: &[bool]) -> AxisPolicies {
    periodic.iter().copied().map(PaddingPolicy::from_periodic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        let policies = policies_from_flags(&[true, false, true]);
        assert_eq!(
            policies.as_slice(),
            &[PaddingPolicy::Periodic, PaddingPolicy::Zero, PaddingPolicy::Periodic]
        );
        assert!(policies[0].is_periodic());
        assert!(!policies[1].is_periodic());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PaddingPolicy::Periodic).unwrap();
        assert_eq!(json, "\"periodic\"");
        let back: PaddingPolicy = serde_json::from_str("\"zero\"").unwrap();
        assert_eq!(back, PaddingPolicy::Zero);
        assert_eq!(PaddingPolicy::default().to_string(), "zero");
    }
}
