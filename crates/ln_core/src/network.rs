// crates/ln_core/src/network.rs

//! 网络几何
//!
//! 由残差网络的超参数推出各段的卷积层序列，供 [`ShapeConverter`] 换算窗口。
//! 只描述几何（核大小与步长），不涉及网络权重。

use serde::{Deserialize, Serialize};

use ln_foundation::LnResult;

use crate::shape::{LayerSpec, ShapeConverter};

/// 残差网络超参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGeometry {
    /// 编码器下采样次数
    pub nr_downsamples: u32,
    /// 每个尺度的编码器残差块数
    pub nr_residual_encoder: u32,
    /// 压缩映射残差块数
    pub nr_residual_compression: u32,
}

impl NetworkGeometry {
    /// 步长 2 残差块：k4s2 卷积 + k3 卷积；步长 1 残差块：两个 k3 卷积
    fn res_block(stride: u32) -> [LayerSpec; 2] {
        if stride == 2 {
            [LayerSpec::conv(4, 2), LayerSpec::conv(3, 1)]
        } else {
            [LayerSpec::conv(3, 1), LayerSpec::conv(3, 1)]
        }
    }

    fn encoder_layers(&self) -> Vec<LayerSpec> {
        let mut layers = Vec::new();
        for _ in 0..self.nr_downsamples {
            layers.extend(Self::res_block(2));
            for _ in 1..self.nr_residual_encoder {
                layers.extend(Self::res_block(1));
            }
        }
        layers.extend(Self::res_block(1));
        layers
    }

    /// 状态编码器：原始状态 → 压缩状态
    pub fn state_encoder(&self) -> LnResult<ShapeConverter> {
        ShapeConverter::new(self.encoder_layers())
    }

    /// 边界编码器，几何与状态编码器相同
    pub fn boundary_encoder(&self) -> LnResult<ShapeConverter> {
        ShapeConverter::new(self.encoder_layers())
    }

    /// 压缩映射：压缩状态 → 下一步压缩状态
    pub fn compression_mapping(&self) -> LnResult<ShapeConverter> {
        let layers = (0..self.nr_residual_compression)
            .flat_map(|_| Self::res_block(1))
            .collect();
        ShapeConverter::new(layers)
    }

    /// 状态解码器：压缩状态 → 原始状态
    pub fn state_decoder(&self) -> LnResult<ShapeConverter> {
        let mut layers = Vec::new();
        for _ in 1..self.nr_downsamples {
            layers.push(LayerSpec::trans_conv(4, 2));
            for _ in 0..self.nr_residual_encoder {
                layers.extend(Self::res_block(1));
            }
        }
        if self.nr_downsamples > 0 {
            layers.push(LayerSpec::trans_conv(4, 2));
        }
        ShapeConverter::new(layers)
    }

    /// 序列路径：状态编码器后接一次压缩映射
    pub fn sequence_path(&self) -> LnResult<ShapeConverter> {
        Ok(self.state_encoder()?.then(&self.compression_mapping()?))
    }
}

impl Default for NetworkGeometry {
    fn default() -> Self {
        Self {
            nr_downsamples: 2,
            nr_residual_encoder: 1,
            nr_residual_compression: 3,
        }
    }
}
