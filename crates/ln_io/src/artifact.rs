// crates/ln_io/src/artifact.rs

//! 数据文件仓库
//!
//! 所有物化数据（原始状态窗口、压缩状态、边界）都以 `.npy` 文件存放在
//! 保存目录下，键为 `(种类, 迭代步, 子域)`。磁盘上是否存在是唯一的事实来源：
//! 不维护任何内存中的"已生成"标记。
//!
//! 写入一律原子化（临时文件 + 重命名），同键并发写入时后写者覆盖前写者，
//! 内容相同所以结果幂等。进程内的重复物化由 [`ArtifactStore::ensure_with`]
//! 借助在途键登记合并为一次。

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use tracing::trace;

use ln_foundation::SubDomain;

use crate::atomic::write_atomic;
use crate::error::{IoError, IoResult};
use crate::inflight::InFlightKeys;

/// 边界文件名
pub const BOUNDARY_FILE: &str = "flow_geometry.npy";
/// 压缩边界文件名
pub const CBOUNDARY_FILE: &str = "flow_cgeometry.npy";

/// 数据文件键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// 原始状态；`subdomain` 为 `None` 表示整个模拟域
    State {
        /// 迭代步
        iteration: u64,
        /// 窗口
        subdomain: Option<SubDomain>,
    },
    /// 压缩状态；`subdomain` 为对应原始状态的窗口
    CState {
        /// 迭代步
        iteration: u64,
        /// 原始状态窗口
        subdomain: Option<SubDomain>,
    },
    /// 边界
    Boundary,
    /// 压缩边界
    CBoundary,
}

impl ArtifactKey {
    /// 窗口原始状态
    pub fn state(iteration: u64, subdomain: &SubDomain) -> Self {
        Self::State {
            iteration,
            subdomain: Some(subdomain.clone()),
        }
    }

    /// 窗口压缩状态
    pub fn cstate(iteration: u64, subdomain: &SubDomain) -> Self {
        Self::CState {
            iteration,
            subdomain: Some(subdomain.clone()),
        }
    }

    /// 整域压缩状态
    pub fn whole_cstate(iteration: u64) -> Self {
        Self::CState {
            iteration,
            subdomain: None,
        }
    }

    /// 文件名
    pub fn file_name(&self) -> String {
        match self {
            Self::State { iteration, subdomain } => window_name("state", *iteration, subdomain.as_ref()),
            Self::CState { iteration, subdomain } => window_name("cstate", *iteration, subdomain.as_ref()),
            Self::Boundary => BOUNDARY_FILE.to_string(),
            Self::CBoundary => CBOUNDARY_FILE.to_string(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

fn window_name(prefix: &str, iteration: u64, subdomain: Option<&SubDomain>) -> String {
    let mut name = format!("{}_{:06}", prefix, iteration);
    if let Some(sub) = subdomain {
        name.push_str("_pos");
        for p in sub.pos() {
            name.push_str(&format!("_{}", p));
        }
        name.push_str("_size");
        for s in sub.size() {
            name.push_str(&format!("_{}", s));
        }
    }
    name.push_str(".npy");
    name
}

/// 数据文件仓库
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    in_flight: InFlightKeys<ArtifactKey>,
}

impl ArtifactStore {
    /// 以 `root` 为保存目录创建仓库
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_flight: InFlightKeys::new(),
        }
    }

    /// 保存目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 键对应的文件路径
    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// 文件是否存在
    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path(key).is_file()
    }

    /// 读取数组
    pub fn read(&self, key: &ArtifactKey) -> IoResult<ArrayD<f32>> {
        read_array(&self.path(key))
    }

    /// 原子写入数组
    pub fn write(&self, key: &ArtifactKey, array: &ArrayD<f32>) -> IoResult<()> {
        let path = self.path(key);
        trace!("writing {}", path.display());
        write_atomic(&path, |w| {
            array.write_npy(w).map_err(|e| IoError::npy(&path, e))
        })
    }

    /// 原子写入原始字节（须为 `.npy` 内容）
    pub fn write_bytes(&self, key: &ArtifactKey, bytes: &[u8]) -> IoResult<()> {
        let path = self.path(key);
        trace!("writing {} bytes to {}", bytes.len(), path.display());
        write_atomic(&path, |w| Ok(std::io::Write::write_all(w, bytes)?))
    }

    /// 删除文件，返回是否确实删除
    pub fn remove(&self, key: &ArtifactKey) -> IoResult<bool> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 若文件不存在则调用 `produce` 生成，返回是否确实生成
    ///
    /// 同一进程内同键的调用被串行化；后到者在先到者完成后看到文件已存在，
    /// 直接返回 `false`。`produce` 负责写入该键。
    pub fn ensure_with<E, F>(&self, key: &ArtifactKey, produce: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let _guard = self.in_flight.claim(key.clone());
        if self.exists(key) {
            return Ok(false);
        }
        produce()?;
        Ok(true)
    }
}

/// 读取 `.npy` 文件为 `f32` 数组，`f64` 文件自动转换
pub fn read_array(path: &Path) -> IoResult<ArrayD<f32>> {
    if !path.is_file() {
        return Err(IoError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    decode_npy(&bytes).map_err(|message| IoError::npy(path, message))
}

/// 原子写入 `.npy` 文件
pub fn write_array(path: &Path, array: &ArrayD<f32>) -> IoResult<()> {
    write_atomic(path, |w| array.write_npy(w).map_err(|e| IoError::npy(path, e)))
}

/// 解码 `.npy` 字节为 `f32` 数组
pub fn decode_npy(bytes: &[u8]) -> Result<ArrayD<f32>, String> {
    match ArrayD::<f32>::read_npy(Cursor::new(bytes)) {
        Ok(array) => Ok(array),
        Err(first) => ArrayD::<f64>::read_npy(Cursor::new(bytes))
            .map(|array| array.mapv(|v| v as f32))
            .map_err(|_| first.to_string()),
    }
}
