// crates/ln_core/src/shape.rs

//! 形状换算器
//!
//! 记录一串卷积层（核大小、步长、是否转置），在"网络输入窗口"与
//! "网络输出窗口"之间换算子域：
//!
//! - [`ShapeConverter::contract`]：输入窗口 → 该窗口能算出的输出窗口
//! - [`ShapeConverter::expand`]：输出窗口 → 计算它所需的最小输入窗口
//!
//! 设 `e = (k - 1) / 2`，`s` 为步长：
//!
//! | 层 | contract | expand |
//! |---|---|---|
//! | 普通卷积 | `pos' = ⌊(pos+e)/s⌋`, `size' = ⌊(size-2e)/s⌋` | `pos = pos'·s - e`, `size = size'·s + 2e` |
//! | 转置卷积 | `pos' = pos·s + e`, `size' = size·s - 2e` | `pos = ⌊(pos'-e)/s⌋`, `size = ⌈(pos'+size'+e)/s⌉ - pos` |
//!
//! 仅含普通卷积时 `contract(expand(x)) == x` 对任意 `x` 成立；含转置卷积时
//! 对步长对齐的窗口成立。任何中间尺寸非正都返回配置错误，不做截断。

use serde::{Deserialize, Serialize};

use ln_foundation::{ensure, LnError, LnResult, SubDomain};

/// 单层卷积描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerSpec {
    /// 卷积核大小
    pub kernel_size: u32,
    /// 步长，只允许 1 或 2
    pub stride: u32,
    /// 是否为转置卷积
    #[serde(default)]
    pub transposed: bool,
}

impl LayerSpec {
    /// 普通卷积
    pub const fn conv(kernel_size: u32, stride: u32) -> Self {
        Self {
            kernel_size,
            stride,
            transposed: false,
        }
    }

    /// 转置卷积
    pub const fn trans_conv(kernel_size: u32, stride: u32) -> Self {
        Self {
            kernel_size,
            stride,
            transposed: true,
        }
    }

    /// 单侧边缘宽度 `(k - 1) / 2`
    #[inline]
    pub fn edge(&self) -> i64 {
        (i64::from(self.kernel_size) - 1) / 2
    }

    /// 检查核大小与步长
    pub fn validate(&self) -> LnResult<()> {
        ensure!(
            self.kernel_size > 0,
            LnError::invalid_config("kernel_size", "0", "kernel size must be positive")
        );
        ensure!(
            self.stride == 1 || self.stride == 2,
            LnError::invalid_config("stride", self.stride.to_string(), "stride must be 1 or 2")
        );
        Ok(())
    }

    fn contract_axis(&self, pos: i64, size: i64) -> (i64, i64) {
        let (e, s) = (self.edge(), i64::from(self.stride));
        if self.transposed {
            (pos * s + e, size * s - 2 * e)
        } else {
            ((pos + e).div_euclid(s), (size - 2 * e).div_euclid(s))
        }
    }

    fn expand_axis(&self, pos: i64, size: i64) -> (i64, i64) {
        let (e, s) = (self.edge(), i64::from(self.stride));
        if self.transposed {
            let start = (pos - e).div_euclid(s);
            let end = ceil_div(pos + size + e, s);
            (start, end - start)
        } else {
            (pos * s - e, size * s + 2 * e)
        }
    }
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
    -((-a).div_euclid(b))
}

/// 换算方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Contract,
    Expand,
}

/// 层序列形状换算器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeConverter {
    layers: Vec<LayerSpec>,
}

impl ShapeConverter {
    /// 由层序列创建（按网络前向顺序）
    pub fn new(layers: Vec<LayerSpec>) -> LnResult<Self> {
        for layer in &layers {
            layer.validate()?;
        }
        Ok(Self { layers })
    }

    /// 不含任何层的恒等换算器
    pub fn identity() -> Self {
        Self::default()
    }

    /// 层序列
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// 层数
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// 是否含转置卷积
    pub fn has_transposed(&self) -> bool {
        self.layers.iter().any(|l| l.transposed)
    }

    /// 先经过 `self` 再经过 `next` 的复合换算器
    pub fn then(&self, next: &ShapeConverter) -> Self {
        let mut layers = self.layers.clone();
        layers.extend_from_slice(&next.layers);
        Self { layers }
    }

    /// 总下采样倍数（普通卷积步长之积）
    pub fn total_stride(&self) -> i64 {
        self.layers
            .iter()
            .filter(|l| !l.transposed)
            .map(|l| i64::from(l.stride))
            .product()
    }

    /// 总上采样倍数（转置卷积步长之积）
    pub fn total_upsample(&self) -> i64 {
        self.layers
            .iter()
            .filter(|l| l.transposed)
            .map(|l| i64::from(l.stride))
            .product()
    }

    /// 输入窗口 → 输出窗口
    pub fn contract(&self, input: &SubDomain) -> LnResult<SubDomain> {
        self.apply(input, Direction::Contract)
    }

    /// 输出窗口 → 所需输入窗口
    pub fn expand(&self, output: &SubDomain) -> LnResult<SubDomain> {
        self.apply(output, Direction::Expand)
    }

    fn apply(&self, sub: &SubDomain, direction: Direction) -> LnResult<SubDomain> {
        sub.validate()?;
        let rank = sub.rank();
        let mut pos = sub.pos().to_vec();
        let mut size = sub.size().to_vec();

        let order: Box<dyn Iterator<Item = (usize, &LayerSpec)>> = match direction {
            Direction::Contract => Box::new(self.layers.iter().enumerate()),
            Direction::Expand => Box::new(self.layers.iter().enumerate().rev()),
        };

        for (index, layer) in order {
            for axis in 0..rank {
                let (p, s) = match direction {
                    Direction::Contract => layer.contract_axis(pos[axis], size[axis]),
                    Direction::Expand => layer.expand_axis(pos[axis], size[axis]),
                };
                ensure!(
                    s > 0,
                    LnError::config(format!(
                        "layer {} (k={}, s={}{}) yields size {} on axis {} for {}",
                        index,
                        layer.kernel_size,
                        layer.stride,
                        if layer.transposed { ", transposed" } else { "" },
                        s,
                        axis,
                        sub
                    ))
                );
                pos[axis] = p;
                size[axis] = s;
            }
        }

        Ok(SubDomain::new(&pos, &size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> ShapeConverter {
        ShapeConverter::new(vec![
            LayerSpec::conv(4, 2),
            LayerSpec::conv(3, 1),
            LayerSpec::conv(3, 1),
            LayerSpec::conv(4, 2),
            LayerSpec::conv(3, 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_layer_arithmetic() {
        let conv = ShapeConverter::new(vec![LayerSpec::conv(3, 1)]).unwrap();
        let out = SubDomain::new(&[5], &[8]);
        let input = conv.expand(&out).unwrap();
        assert_eq!(input, SubDomain::new(&[4], &[10]));
        assert_eq!(conv.contract(&input).unwrap(), out);

        let down = ShapeConverter::new(vec![LayerSpec::conv(4, 2)]).unwrap();
        let input = down.expand(&SubDomain::new(&[3], &[4])).unwrap();
        assert_eq!(input, SubDomain::new(&[5], &[10]));
    }

    #[test]
    fn test_forward_stack_roundtrip() {
        let conv = encoder();
        for pos in [-7, -1, 0, 3, 11] {
            for size in [1, 2, 5, 8] {
                let sub = SubDomain::new(&[pos, pos + 1], &[size, size + 2]);
                let full = conv.expand(&sub).unwrap();
                assert_eq!(conv.contract(&full).unwrap(), sub, "sub = {}", sub);
            }
        }
        assert_eq!(conv.total_stride(), 4);
        assert_eq!(conv.total_upsample(), 1);
    }

    #[test]
    fn test_transposed_aligned_roundtrip() {
        let decoder = ShapeConverter::new(vec![
            LayerSpec::conv(3, 1),
            LayerSpec::trans_conv(4, 2),
            LayerSpec::conv(3, 1),
        ])
        .unwrap();
        assert!(decoder.has_transposed());

        // 对齐窗口：由某个输入窗口 contract 得到
        for pos in [-4, 0, 2, 9] {
            let source = SubDomain::new(&[pos], &[6]);
            let aligned = decoder.contract(&source).unwrap();
            let input = decoder.expand(&aligned).unwrap();
            assert_eq!(input, source);
            assert_eq!(decoder.contract(&input).unwrap(), aligned);
        }
    }

    #[test]
    fn test_transposed_expand_covers_unaligned() {
        let up = ShapeConverter::new(vec![LayerSpec::trans_conv(4, 2)]).unwrap();
        let target = SubDomain::new(&[4], &[5]);
        let input = up.expand(&target).unwrap();
        let covered = up.contract(&input).unwrap();
        assert!(covered.pos()[0] <= target.pos()[0]);
        assert!(covered.end()[0] >= target.end()[0]);
    }

    #[test]
    fn test_non_positive_size_is_error() {
        let conv = encoder();
        let err = conv.contract(&SubDomain::new(&[0], &[6])).unwrap_err();
        assert!(err.is_config());
        assert!(conv.expand(&SubDomain::new(&[0], &[0])).is_err());
    }

    #[test]
    fn test_invalid_layers() {
        assert!(ShapeConverter::new(vec![LayerSpec::conv(3, 3)]).is_err());
        assert!(ShapeConverter::new(vec![LayerSpec::conv(0, 1)]).is_err());
        assert!(ShapeConverter::new(vec![LayerSpec::trans_conv(4, 2)]).is_ok());
    }

    #[test]
    fn test_then_and_identity() {
        let a = ShapeConverter::new(vec![LayerSpec::conv(3, 1)]).unwrap();
        let b = ShapeConverter::new(vec![LayerSpec::conv(4, 2)]).unwrap();
        let ab = a.then(&b);
        assert_eq!(ab.len(), 2);
        let sub = SubDomain::new(&[1, 1], &[2, 2]);
        assert_eq!(ab.expand(&sub).unwrap(), a.expand(&b.expand(&sub).unwrap()).unwrap());

        let id = ShapeConverter::identity();
        assert!(id.is_empty());
        assert_eq!(id.expand(&sub).unwrap(), sub);
    }
}
