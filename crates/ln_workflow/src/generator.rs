// crates/ln_workflow/src/generator.rs

//! 数据点抽样
//!
//! 在生产方用带种子的随机数发生器抽取数据点：
//!
//! 1. 起始步均匀取自 `[step_margin, num_steps - sequence_length - step_margin)`；
//! 2. 压缩窗口位置逐轴均匀抽取，使换算出的状态窗口与序列窗口都落在
//!    `[boundary_margin, sim_shape - boundary_margin)` 内；
//! 3. 由压缩窗口推出两个状态窗口。
//!
//! 范围为空属于配置错误，在构造时报告。

use std::ops::{Range, RangeInclusive};

use rand::Rng;

use ln_config::DomainConfig;
use ln_core::{DataPoint, PointGeometry};
use ln_foundation::{ensure, LnError, LnResult, SubDomain};

/// 数据点抽样器
#[derive(Debug, Clone)]
pub struct DataPointGenerator {
    geometry: PointGeometry,
    sequence_length: usize,
    cshape: Vec<i64>,
    index_range: Range<u64>,
    position_ranges: Vec<RangeInclusive<i64>>,
}

impl DataPointGenerator {
    /// 创建抽样器并预先计算抽样范围
    pub fn new(
        geometry: PointGeometry,
        sim_shape: &[i64],
        cshape: &[i64],
        sequence_length: usize,
        step_margin: u64,
        boundary_margin: i64,
        num_steps: u64,
    ) -> LnResult<Self> {
        LnError::check_size("compressed shape rank", sim_shape.len(), cshape.len())?;
        ensure!(
            sequence_length >= 1,
            LnError::invalid_config("sequence_length", "0", "must be at least 1")
        );

        let index_end =
            num_steps.saturating_sub((sequence_length as u64).saturating_add(step_margin));
        ensure!(
            step_margin < index_end,
            LnError::config(format!(
                "no valid start step: {} steps, sequence length {}, step margin {}",
                num_steps, sequence_length, step_margin
            ))
        );

        let position_ranges = (0..sim_shape.len())
            .map(|axis| {
                axis_range(
                    &geometry,
                    cshape,
                    axis,
                    boundary_margin,
                    sim_shape[axis] - boundary_margin,
                )
            })
            .collect::<LnResult<Vec<_>>>()?;

        Ok(Self {
            geometry,
            sequence_length,
            cshape: cshape.to_vec(),
            index_range: step_margin..index_end,
            position_ranges,
        })
    }

    /// 由域配置创建
    pub fn from_config(
        config: &DomainConfig,
        geometry: PointGeometry,
        num_steps: u64,
    ) -> LnResult<Self> {
        Self::new(
            geometry,
            &config.sim_shape,
            &config.network.input_cshape,
            config.sequence_length,
            config.step_margin,
            config.boundary_margin,
            num_steps,
        )
    }

    /// 起始步范围
    pub fn index_range(&self) -> Range<u64> {
        self.index_range.clone()
    }

    /// 第 `axis` 轴压缩窗口起点的取值范围（闭区间）
    pub fn position_range(&self, axis: usize) -> Option<RangeInclusive<i64>> {
        self.position_ranges.get(axis).cloned()
    }

    /// 抽取一个数据点
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> LnResult<DataPoint> {
        let index = rng.gen_range(self.index_range.clone());
        let pos: Vec<i64> = self
            .position_ranges
            .iter()
            .map(|range| rng.gen_range(range.clone()))
            .collect();
        let compressed = SubDomain::new(&pos, &self.cshape);
        self.geometry.derive(index, self.sequence_length, compressed)
    }
}

/// 单轴起点范围：仿射估计后用实际换算收紧
fn axis_range(
    geometry: &PointGeometry,
    cshape: &[i64],
    axis: usize,
    lo_bound: i64,
    hi_bound: i64,
) -> LnResult<RangeInclusive<i64>> {
    let probe = |p: i64| -> LnResult<(i64, i64)> {
        let mut pos = vec![0; cshape.len()];
        pos[axis] = p;
        let compressed = SubDomain::new(&pos, cshape);
        let full = geometry.state_converter().expand(&compressed)?;
        let seq = geometry.sequence_converter().expand(&compressed)?;
        Ok((
            full.pos()[axis].min(seq.pos()[axis]),
            full.end()[axis].max(seq.end()[axis]),
        ))
    };

    let (start0, end0) = probe(0)?;
    let (start1, _) = probe(1)?;
    let step = (start1 - start0).max(1);

    let mut lo = -((start0 - lo_bound).div_euclid(step));
    let mut hi = (hi_bound - end0).div_euclid(step);
    while lo <= hi && probe(lo)?.0 < lo_bound {
        lo += 1;
    }
    while lo <= hi && probe(hi)?.1 > hi_bound {
        hi -= 1;
    }

    ensure!(
        lo <= hi,
        LnError::config(format!(
            "axis {}: windows of compressed size {} do not fit in [{}, {})",
            axis, cshape[axis], lo_bound, hi_bound
        ))
    );
    Ok(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ln_core::{LayerSpec, NetworkGeometry, ShapeConverter};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn default_geometry() -> PointGeometry {
        PointGeometry::from_network(&NetworkGeometry::default()).unwrap()
    }

    #[test]
    fn test_selected_points_stay_inside() {
        let generator =
            DataPointGenerator::new(default_geometry(), &[160, 200], &[8, 8], 4, 2, 3, 50).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let dp = generator.select(&mut rng).unwrap();
            assert!(generator.index_range().contains(&dp.index()));
            assert!(dp.index() + 4 + 2 <= 50);
            for window in [dp.full_state_subdomain(), dp.sequence_subdomain()] {
                for (axis, extent) in [160i64, 200].into_iter().enumerate() {
                    assert!(window.pos()[axis] >= 3, "{}", window);
                    assert!(window.end()[axis] <= extent - 3, "{}", window);
                }
            }
        }
    }

    #[test]
    fn test_ranges_are_tight() {
        let conv = ShapeConverter::new(vec![LayerSpec::conv(3, 1)]).unwrap();
        let geometry = PointGeometry::new(conv.clone(), conv);
        // 压缩窗口 [p, p+4) 对应状态窗口 [p-1, p+5)，需落在 [0, 20)
        let generator = DataPointGenerator::new(geometry, &[20], &[4], 1, 0, 0, 10).unwrap();
        assert_eq!(generator.position_range(0), Some(1..=15));
        assert_eq!(generator.index_range(), 0..9);
    }

    #[test]
    fn test_same_seed_same_points() {
        let generator =
            DataPointGenerator::new(default_geometry(), &[128, 128], &[4, 4], 2, 0, 0, 30).unwrap();
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(3);
            (0..10).map(|_| generator.select(&mut rng).unwrap()).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(3);
            (0..10).map(|_| generator.select(&mut rng).unwrap()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_ranges_are_config_errors() {
        let err = DataPointGenerator::new(default_geometry(), &[64, 64], &[8, 8], 1, 0, 0, 10)
            .unwrap_err();
        assert!(err.is_config());

        let err = DataPointGenerator::new(default_geometry(), &[256, 256], &[8, 8], 5, 3, 0, 10)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_huge_step_margin_is_config_error() {
        let err = DataPointGenerator::new(
            default_geometry(),
            &[256, 256],
            &[8, 8],
            4,
            u64::MAX,
            0,
            100,
        )
        .unwrap_err();
        assert!(err.is_config());
    }
}
