// crates/ln_foundation/src/subdomain.rs

//! 子域（SubDomain）
//!
//! 描述模拟数组中的一个轴对齐矩形窗口：起点 `pos` 与尺寸 `size`。
//! `pos` 可以为负，也可以超出数组范围，越界部分由提取器按各轴的
//! [`PaddingPolicy`](crate::padding::PaddingPolicy) 处理。
//!
//! 子域是不可变值类型：构造永不失败，尺寸合法性由使用方调用
//! [`SubDomain::validate`] 检查。

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::error::{LnError, LnResult};

/// 整数坐标向量，三维以内不分配堆内存
pub type Coord = SmallVec<[i64; 3]>;

/// 轴对齐矩形窗口
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubDomain {
    pos: Coord,
    size: Coord,
}

impl SubDomain {
    /// 由起点和尺寸创建子域
    pub fn new(pos: &[i64], size: &[i64]) -> Self {
        Self {
            pos: Coord::from_slice(pos),
            size: Coord::from_slice(size),
        }
    }

    /// 起点
    #[inline]
    pub fn pos(&self) -> &[i64] {
        &self.pos
    }

    /// 尺寸
    #[inline]
    pub fn size(&self) -> &[i64] {
        &self.size
    }

    /// 维数
    #[inline]
    pub fn rank(&self) -> usize {
        self.pos.len()
    }

    /// 上角点（不含）
    pub fn end(&self) -> Coord {
        self.pos.iter().zip(&self.size).map(|(p, s)| p + s).collect()
    }

    /// 格点总数
    pub fn volume(&self) -> i64 {
        self.size.iter().product()
    }

    /// 点是否落在窗口内
    pub fn contains(&self, point: &[i64]) -> bool {
        point.len() == self.rank()
            && point
                .iter()
                .zip(self.pos.iter().zip(&self.size))
                .all(|(x, (p, s))| *x >= *p && *x < p + s)
    }

    /// 平移后的新子域
    ///
    /// `delta` 的长度必须等于 [`rank`](Self::rank)。
    pub fn translate(&self, delta: &[i64]) -> Self {
        debug_assert_eq!(
            delta.len(),
            self.rank(),
            "平移向量维数 {} 与子域维数 {} 不一致",
            delta.len(),
            self.rank()
        );
        Self {
            pos: self.pos.iter().zip(delta).map(|(p, d)| p + d).collect(),
            size: self.size.clone(),
        }
    }

    /// 检查秩一致且每个轴尺寸为正
    pub fn validate(&self) -> LnResult<()> {
        LnError::check_size("subdomain size rank", self.pos.len(), self.size.len())?;
        crate::ensure!(!self.pos.is_empty(), LnError::invalid_input("子域维数为 0"));
        for (axis, &size) in self.size.iter().enumerate() {
            crate::ensure!(size > 0, LnError::NonPositiveSize { axis, size });
        }
        Ok(())
    }

    /// 尺寸转为 `usize` 形状（先做 [`validate`](Self::validate)）
    pub fn shape(&self) -> LnResult<Vec<usize>> {
        self.validate()?;
        Ok(self.size.iter().map(|&s| s as usize).collect())
    }
}

impl fmt::Display for SubDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos={:?} size={:?}", self.pos.as_slice(), self.size.as_slice())
    }
}
