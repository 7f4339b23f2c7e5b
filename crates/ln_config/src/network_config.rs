// crates/ln_config/src/network_config.rs

//! 网络几何配置

use serde::{Deserialize, Serialize};

use ln_core::{NetworkGeometry, PointGeometry};
use ln_foundation::LnResult;

/// 网络超参数与压缩窗口尺寸
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 编码器下采样次数
    #[serde(default = "default_nr_downsamples")]
    pub nr_downsamples: u32,
    /// 每个尺度的编码器残差块数
    #[serde(default = "default_nr_residual_encoder")]
    pub nr_residual_encoder: u32,
    /// 压缩映射残差块数
    #[serde(default = "default_nr_residual_compression")]
    pub nr_residual_compression: u32,
    /// 训练时压缩窗口尺寸
    #[serde(default = "default_input_cshape")]
    pub input_cshape: Vec<i64>,
}

fn default_nr_downsamples() -> u32 { 2 }
fn default_nr_residual_encoder() -> u32 { 1 }
fn default_nr_residual_compression() -> u32 { 3 }
fn default_input_cshape() -> Vec<i64> { vec![8, 8] }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nr_downsamples: default_nr_downsamples(),
            nr_residual_encoder: default_nr_residual_encoder(),
            nr_residual_compression: default_nr_residual_compression(),
            input_cshape: default_input_cshape(),
        }
    }
}

impl NetworkConfig {
    /// 网络几何
    pub fn geometry(&self) -> NetworkGeometry {
        NetworkGeometry {
            nr_downsamples: self.nr_downsamples,
            nr_residual_encoder: self.nr_residual_encoder,
            nr_residual_compression: self.nr_residual_compression,
        }
    }

    /// 数据点几何（状态换算器与序列换算器）
    pub fn point_geometry(&self) -> LnResult<PointGeometry> {
        PointGeometry::from_network(&self.geometry())
    }
}
