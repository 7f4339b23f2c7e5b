// crates/ln_core/src/extract.rs

//! 周期（莫比乌斯）子域提取
//!
//! 从模拟数组中按 [`SubDomain`] 取出窗口，越界部分按各轴策略处理：
//!
//! - 周期轴：`rem_euclid` 回绕，可绕任意圈，掩码为 0
//! - 补零轴：越界格点填 0，掩码为 1
//!
//! 数组的维数为子域维数 `r`（纯空间）或 `r + 1`（末尾为通道轴）。
//! 填充掩码只覆盖空间维，形状恒为 `size`，对所有通道共用。

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use num_traits::Zero;

use ln_foundation::{ensure, LnError, LnResult, PaddingPolicy, SubDomain};

/// 提取结果
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<A> {
    /// 窗口数据，形状为 `size`（加通道维）
    pub window: ArrayD<A>,
    /// 填充掩码，形状为 `size`，补零格点为 1
    pub pad_mask: ArrayD<f32>,
}

impl<A> Extracted<A> {
    /// 窗口中被补零的格点数
    pub fn padded_cells(&self) -> usize {
        self.pad_mask.iter().filter(|&&m| m > 0.0).count()
    }
}

/// 按固定的各轴策略提取子域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicExtractor {
    policies: Vec<PaddingPolicy>,
}

impl PeriodicExtractor {
    /// 由各轴策略创建
    pub fn new(policies: &[PaddingPolicy]) -> Self {
        Self {
            policies: policies.to_vec(),
        }
    }

    /// 各轴策略
    pub fn policies(&self) -> &[PaddingPolicy] {
        &self.policies
    }

    /// 提取子域
    pub fn extract<A: Clone + Zero>(
        &self,
        array: ArrayViewD<'_, A>,
        subdomain: &SubDomain,
    ) -> LnResult<Extracted<A>> {
        mobius_extract(array, subdomain, &self.policies)
    }
}

/// 提取 `subdomain` 覆盖的窗口及填充掩码
pub fn mobius_extract<A: Clone + Zero>(
    array: ArrayViewD<'_, A>,
    subdomain: &SubDomain,
    policies: &[PaddingPolicy],
) -> LnResult<Extracted<A>> {
    let size = subdomain.shape()?;
    let rank = subdomain.rank();
    LnError::check_size("padding policies", rank, policies.len())?;
    ensure!(
        array.ndim() == rank || array.ndim() == rank + 1,
        LnError::invalid_input(format!(
            "array rank {} does not match subdomain rank {} (optionally plus one channel axis)",
            array.ndim(),
            rank
        ))
    );

    let sources = (0..rank)
        .map(|axis| {
            axis_sources(
                subdomain.pos()[axis],
                subdomain.size()[axis],
                array.shape()[axis],
                policies[axis],
                axis,
            )
        })
        .collect::<LnResult<Vec<_>>>()?;

    let is_padded = |idx: &IxDyn| (0..rank).any(|axis| sources[axis][idx[axis]].is_none());
    let pad_mask = ArrayD::from_shape_fn(IxDyn(&size), |idx| {
        if is_padded(&idx) {
            1.0
        } else {
            0.0
        }
    });

    let mut window_shape = size.clone();
    if array.ndim() == rank + 1 {
        window_shape.push(array.shape()[rank]);
    }

    // 空轴只能出现在补零策略下，整个窗口都是填充
    if array.shape()[..rank].contains(&0) {
        return Ok(Extracted {
            window: ArrayD::zeros(IxDyn(&window_shape)),
            pad_mask,
        });
    }

    let gather = |source: &[Option<usize>]| -> Vec<usize> {
        source.iter().map(|s| s.unwrap_or(0)).collect()
    };
    let mut window = array.select(Axis(0), &gather(&sources[0]));
    for (axis, source) in sources.iter().enumerate().skip(1) {
        window = window.select(Axis(axis), &gather(source));
    }

    if pad_mask.iter().any(|&m| m > 0.0) {
        for (idx, value) in window.indexed_iter_mut() {
            if is_padded(&idx) {
                *value = A::zero();
            }
        }
    }

    Ok(Extracted { window, pad_mask })
}

/// 单轴上窗口各格点对应的源下标，`None` 表示补零
fn axis_sources(
    pos: i64,
    size: i64,
    extent: usize,
    policy: PaddingPolicy,
    axis: usize,
) -> LnResult<Vec<Option<usize>>> {
    let extent = extent as i64;
    match policy {
        PaddingPolicy::Periodic => {
            ensure!(
                extent > 0,
                LnError::invalid_input(format!("periodic extraction over empty axis {}", axis))
            );
            Ok((pos..pos + size)
                .map(|i| Some(i.rem_euclid(extent) as usize))
                .collect())
        }
        PaddingPolicy::Zero => Ok((pos..pos + size)
            .map(|i| (0..extent).contains(&i).then_some(i as usize))
            .collect()),
    }
}

/// 在最前面加一个长度为 1 的批次维
pub fn add_batch_axis<A>(array: ArrayD<A>) -> ArrayD<A> {
    array.insert_axis(Axis(0))
}
