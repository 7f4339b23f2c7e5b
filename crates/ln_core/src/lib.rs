// crates/ln_core/src/lib.rs

//! LatNet Core
//!
//! 子域几何与数组提取：
//!
//! - [`shape`]: 卷积层序列的窗口换算 `ShapeConverter`
//! - [`network`]: 由残差网络超参数推出层序列
//! - [`extract`]: 周期/补零子域提取
//! - [`datapoint`]: 训练数据点与索引行格式

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datapoint;
pub mod extract;
pub mod network;
pub mod shape;

pub use datapoint::{DataPoint, IndexRecord, PointGeometry};
pub use extract::{add_batch_axis, mobius_extract, Extracted, PeriodicExtractor};
pub use network::NetworkGeometry;
pub use shape::{LayerSpec, ShapeConverter};

/// Prelude 模块
pub mod prelude {
    pub use crate::datapoint::{DataPoint, IndexRecord, PointGeometry};
    pub use crate::extract::{mobius_extract, Extracted, PeriodicExtractor};
    pub use crate::network::NetworkGeometry;
    pub use crate::shape::{LayerSpec, ShapeConverter};
    pub use ln_foundation::prelude::*;
}
