// crates/ln_io/src/index.rs

//! 数据点索引文件
//!
//! 每个 Domain 有两个索引：`data_points.txt`（原始状态数据点）与
//! `cdata_points.txt`（压缩数据点）。格式见 [`DataPoint::to_index_line`]。
//! 加载时不检查数据文件是否存在。

use std::io::Write;
use std::path::Path;

use tracing::debug;

use ln_core::{DataPoint, IndexRecord, PointGeometry};

use crate::atomic::write_atomic;
use crate::error::{IoError, IoResult};

/// 原始状态数据点索引文件名
pub const STATE_INDEX_FILE: &str = "data_points.txt";
/// 压缩数据点索引文件名
pub const CSTATE_INDEX_FILE: &str = "cdata_points.txt";

/// 原子写入索引文件，按给定顺序每个数据点一行
pub fn save_index(path: &Path, points: &[DataPoint]) -> IoResult<()> {
    write_atomic(path, |w| {
        for point in points {
            w.write_all(point.to_index_line().as_bytes())?;
        }
        Ok(())
    })?;
    debug!("saved {} data points to {}", points.len(), path.display());
    Ok(())
}

/// 读取索引文件；文件不存在时返回空列表
///
/// 空行被跳过，其余任何无法解析或与当前几何不符的行都报
/// [`IoError::IndexCorruption`]。
pub fn load_index(path: &Path, geometry: &PointGeometry) -> IoResult<Vec<DataPoint>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;

    let mut points = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let corruption = |message: String| IoError::IndexCorruption {
            path: path.to_path_buf(),
            line: number + 1,
            message,
        };
        let record = IndexRecord::parse(line).map_err(|e| corruption(e.to_string()))?;
        let point = geometry.restore(record).map_err(|e| corruption(e.to_string()))?;
        points.push(point);
    }

    debug!("loaded {} data points from {}", points.len(), path.display());
    Ok(points)
}
