// crates/ln_io/src/sim_saver.rs

//! 网络模拟帧保存
//!
//! 把代理网络逐步生成的模拟帧保存为 `<dir>/<iter:06>.cpoint.npz`，
//! 内含 `vel`、`rho` 以及可选的 `cstate`。

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use tracing::debug;

use crate::atomic::temp_path;
use crate::error::{IoError, IoResult};

const FRAME_SUFFIX: &str = ".cpoint.npz";

/// 一帧模拟结果
#[derive(Debug, Clone, PartialEq)]
pub struct SimFrame {
    /// 速度场
    pub vel: ArrayD<f32>,
    /// 密度场
    pub rho: ArrayD<f32>,
    /// 压缩状态
    pub cstate: Option<ArrayD<f32>>,
}

/// 模拟帧保存器
#[derive(Debug, Clone)]
pub struct SimSaver {
    dir: PathBuf,
}

impl SimSaver {
    /// 以 `dir` 为输出目录创建，目录不存在时创建之
    pub fn new(dir: impl Into<PathBuf>) -> IoResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// 输出目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 第 `iteration` 帧的文件路径
    pub fn frame_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{:06}{}", iteration, FRAME_SUFFIX))
    }

    /// 保存一帧
    pub fn save(&self, iteration: u64, frame: &SimFrame) -> IoResult<PathBuf> {
        let path = self.frame_path(iteration);
        let temp = temp_path(&path);

        let result: IoResult<()> = (|| {
            let mut npz = NpzWriter::new(File::create(&temp)?);
            npz.add_array("vel", &frame.vel).map_err(|e| IoError::npy(&path, e))?;
            npz.add_array("rho", &frame.rho).map_err(|e| IoError::npy(&path, e))?;
            if let Some(cstate) = &frame.cstate {
                npz.add_array("cstate", cstate).map_err(|e| IoError::npy(&path, e))?;
            }
            npz.finish().map_err(|e| IoError::npy(&path, e))?;
            std::fs::rename(&temp, &path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }
        result?;

        debug!("saved frame {} to {}", iteration, path.display());
        Ok(path)
    }

    /// 读取一帧
    pub fn load(&self, iteration: u64) -> IoResult<SimFrame> {
        let path = self.frame_path(iteration);
        if !path.is_file() {
            return Err(IoError::MissingArtifact { path });
        }
        let mut npz = NpzReader::new(File::open(&path)?).map_err(|e| IoError::npy(&path, e))?;
        let names = npz.names().map_err(|e| IoError::npy(&path, e))?;

        let vel = read_entry(&mut npz, &path, "vel")?;
        let rho = read_entry(&mut npz, &path, "rho")?;
        let cstate = if names.iter().any(|n| n == "cstate" || n == "cstate.npy") {
            Some(read_entry(&mut npz, &path, "cstate")?)
        } else {
            None
        };
        Ok(SimFrame { vel, rho, cstate })
    }

    /// 只读取速度与密度
    pub fn read_vel_rho(&self, iteration: u64) -> IoResult<(ArrayD<f32>, ArrayD<f32>)> {
        let frame = self.load(iteration)?;
        Ok((frame.vel, frame.rho))
    }

    /// 已保存的帧号，升序
    pub fn list_frames(&self) -> IoResult<Vec<u64>> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(iteration) = name
                .strip_suffix(FRAME_SUFFIX)
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                frames.push(iteration);
            }
        }
        frames.sort_unstable();
        Ok(frames)
    }
}

fn read_entry(npz: &mut NpzReader<File>, path: &Path, key: &str) -> IoResult<ArrayD<f32>> {
    npz.by_name::<OwnedRepr<f32>, IxDyn>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<f32>, IxDyn>(key))
        .map_err(|e| IoError::npy(path, format!("entry '{}': {}", key, e)))
}
