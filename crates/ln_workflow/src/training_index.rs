// crates/ln_workflow/src/training_index.rs

//! 训练索引
//!
//! 一个 Domain 持有两份索引：原始状态数据点与压缩数据点。追加在互斥锁下
//! 进行，顺序即完成顺序；保存只在队列排空后由生产方调用。

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::Rng;

use ln_core::{DataPoint, PointGeometry};
use ln_io::{load_index, save_index, CSTATE_INDEX_FILE, STATE_INDEX_FILE};

use crate::error::WorkflowResult;

/// 数据点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// 原始状态数据点
    State,
    /// 压缩数据点
    Compressed,
}

impl PointKind {
    /// 索引文件名
    pub fn index_file(self) -> &'static str {
        match self {
            Self::State => STATE_INDEX_FILE,
            Self::Compressed => CSTATE_INDEX_FILE,
        }
    }

    /// 名称
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Compressed => "compressed",
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 一份数据点索引
#[derive(Debug)]
pub struct TrainingIndex {
    kind: PointKind,
    path: PathBuf,
    points: Mutex<Vec<DataPoint>>,
}

impl TrainingIndex {
    /// 在 `save_dir` 下创建空索引
    pub fn new(kind: PointKind, save_dir: &Path) -> Self {
        Self {
            kind,
            path: save_dir.join(kind.index_file()),
            points: Mutex::new(Vec::new()),
        }
    }

    /// 种类
    pub fn kind(&self) -> PointKind {
        self.kind
    }

    /// 索引文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 数据点数
    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }

    /// 追加一个数据点，返回追加后的总数
    pub fn append(&self, point: DataPoint) -> usize {
        let mut points = self.points.lock();
        points.push(point);
        points.len()
    }

    /// 按位置取数据点
    pub fn get(&self, i: usize) -> Option<DataPoint> {
        self.points.lock().get(i).cloned()
    }

    /// 当前全部数据点的副本
    pub fn snapshot(&self) -> Vec<DataPoint> {
        self.points.lock().clone()
    }

    /// 均匀随机取一个数据点
    pub fn select_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<DataPoint> {
        let points = self.points.lock();
        if points.is_empty() {
            return None;
        }
        Some(points[rng.gen_range(0..points.len())].clone())
    }

    /// 保存到索引文件
    pub fn save(&self) -> WorkflowResult<()> {
        let points = self.snapshot();
        save_index(&self.path, &points)?;
        Ok(())
    }

    /// 从索引文件加载并替换当前内容，返回加载数
    pub fn load(&self, geometry: &PointGeometry) -> WorkflowResult<usize> {
        let loaded = load_index(&self.path, geometry)?;
        let count = loaded.len();
        *self.points.lock() = loaded;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ln_core::ShapeConverter;
    use ln_foundation::SubDomain;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn geometry() -> PointGeometry {
        PointGeometry::new(ShapeConverter::identity(), ShapeConverter::identity())
    }

    #[test]
    fn test_append_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrainingIndex::new(PointKind::Compressed, dir.path());
        assert!(index.path().ends_with(CSTATE_INDEX_FILE));

        let geometry = geometry();
        for i in 0..3 {
            let dp = geometry.derive(i, 2, SubDomain::new(&[i as i64, 0], &[4, 4])).unwrap();
            assert_eq!(index.append(dp), i as usize + 1);
        }
        index.save().unwrap();

        let reloaded = TrainingIndex::new(PointKind::Compressed, dir.path());
        assert_eq!(reloaded.load(&geometry).unwrap(), 3);
        assert_eq!(reloaded.snapshot(), index.snapshot());
        assert_eq!(reloaded.get(2).unwrap().index(), 2);
    }

    #[test]
    fn test_select_random() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrainingIndex::new(PointKind::State, dir.path());
        let mut rng = StdRng::seed_from_u64(7);
        assert!(index.select_random(&mut rng).is_none());

        let dp = geometry().derive(5, 1, SubDomain::new(&[0], &[3])).unwrap();
        index.append(dp.clone());
        assert_eq!(index.select_random(&mut rng), Some(dp));
        assert_eq!(PointKind::State.to_string(), "state");
    }
}
