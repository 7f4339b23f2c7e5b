// crates/ln_config/src/domain_config.rs

//! Domain 配置
//!
//! 一个 JSON 文件描述一个训练域：模拟尺寸与周期性、数据来源（本地求解器
//! 或远程数据集）、网络几何以及数据点生成参数。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ln_core::PointGeometry;
use ln_foundation::{policies_from_flags, AxisPolicies, SubDomain};

use crate::error::ConfigError;
use crate::network_config::NetworkConfig;

/// 训练域配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// 域名称，同时作为求解器的 `--domain_name`
    pub name: String,
    /// 保存目录（索引文件与数据文件）
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// 模拟网格尺寸
    pub sim_shape: Vec<i64>,
    /// 各轴周期性，留空表示全部非周期
    #[serde(default)]
    pub periodic: Vec<bool>,
    /// 训练序列长度
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    /// 起始步两端保留的步数
    #[serde(default)]
    pub step_margin: u64,
    /// 窗口与模拟边界的最小距离（原始状态格点）
    #[serde(default)]
    pub boundary_margin: i64,
    /// 可用的模拟步数
    #[serde(default = "default_num_sim_steps")]
    pub num_sim_steps: u64,
    /// 数据来源
    pub backend: BackendConfig,
    /// 网络几何
    #[serde(default)]
    pub network: NetworkConfig,
    /// 生成参数
    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_save_dir() -> PathBuf { PathBuf::from("data") }
fn default_sequence_length() -> usize { 5 }
fn default_num_sim_steps() -> u64 { 1000 }

/// 数据来源配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// 本地求解器生成
    LocalSolver(LocalSolverConfig),
    /// 远程数据集下载
    RemoteDataset(RemoteDatasetConfig),
}

/// 本地求解器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSolverConfig {
    /// 求解器脚本路径
    pub script: PathBuf,
    /// 每个训练步对应的求解器步数
    #[serde(default = "default_lb_to_ln")]
    pub lb_to_ln: u64,
    /// `CUDA_VISIBLE_DEVICES` 的取值
    #[serde(default = "default_gpu_device")]
    pub gpu_device: String,
    /// 调试模式（附加 `--mode=visualization`）
    #[serde(default)]
    pub debug: bool,
}

fn default_lb_to_ln() -> u64 { 60 }
fn default_gpu_device() -> String { "0".to_string() }

/// 远程数据集配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDatasetConfig {
    /// 服务根地址
    pub base_url: String,
    /// 每个训练步对应的数据集步数
    #[serde(default = "default_step_ratio")]
    pub step_ratio: u64,
    /// URL 末段（数据格式）
    #[serde(default = "default_url_suffix")]
    pub url_suffix: String,
    /// 重试间隔（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// 最大尝试次数，缺省为无限重试
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 压缩时不保留专为压缩下载的原始窗口（已存盘的原始窗口始终保留）
    #[serde(default = "default_delete_after_compress")]
    pub delete_after_compress: bool,
}

fn default_step_ratio() -> u64 { 1 }
fn default_url_suffix() -> String { "npy".to_string() }
fn default_retry_delay_ms() -> u64 { 2000 }
fn default_timeout_secs() -> u64 { 60 }
fn default_delete_after_compress() -> bool { true }

/// 数据点生成参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// 每个索引生成的数据点数
    #[serde(default = "default_num_points")]
    pub num_points: usize,
    /// 工作线程数
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// 任务队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 随机种子，缺省时取系统熵
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_points() -> usize { 1000 }
fn default_num_workers() -> usize { 4 }
fn default_queue_capacity() -> usize { 64 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_points: default_num_points(),
            num_workers: default_num_workers(),
            queue_capacity: default_queue_capacity(),
            seed: None,
        }
    }
}

impl DomainConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: DomainConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 维数
    pub fn rank(&self) -> usize {
        self.sim_shape.len()
    }

    /// 各轴填充策略
    pub fn padding_policies(&self) -> AxisPolicies {
        if self.periodic.is_empty() {
            policies_from_flags(&vec![false; self.rank()])
        } else {
            policies_from_flags(&self.periodic)
        }
    }

    /// 数据点几何
    pub fn point_geometry(&self) -> Result<PointGeometry, ConfigError> {
        Ok(self.network.point_geometry()?)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "\"\"", "域名称不能为空"));
        }

        let rank = self.rank();
        if rank != 2 && rank != 3 {
            return Err(ConfigError::invalid(
                "sim_shape",
                format!("{:?}", self.sim_shape),
                "只支持二维或三维",
            ));
        }
        if self.sim_shape.iter().any(|&n| n <= 0) {
            return Err(ConfigError::invalid(
                "sim_shape",
                format!("{:?}", self.sim_shape),
                "各轴尺寸必须为正",
            ));
        }
        if !self.periodic.is_empty() && self.periodic.len() != rank {
            return Err(ConfigError::invalid(
                "periodic",
                format!("{:?}", self.periodic),
                format!("长度必须为 {}", rank),
            ));
        }
        if self.network.input_cshape.len() != rank
            || self.network.input_cshape.iter().any(|&n| n <= 0)
        {
            return Err(ConfigError::invalid(
                "network.input_cshape",
                format!("{:?}", self.network.input_cshape),
                format!("必须为 {} 个正整数", rank),
            ));
        }

        if self.sequence_length < 1 {
            return Err(ConfigError::invalid("sequence_length", 0, "必须至少为 1"));
        }
        if self.boundary_margin < 0 {
            return Err(ConfigError::invalid("boundary_margin", self.boundary_margin, "不能为负"));
        }
        let min_steps = self.sequence_length as u64 + 2 * self.step_margin;
        if self.num_sim_steps <= min_steps {
            return Err(ConfigError::invalid(
                "num_sim_steps",
                self.num_sim_steps,
                format!("必须大于 sequence_length + 2*step_margin = {}", min_steps),
            ));
        }

        match &self.backend {
            BackendConfig::LocalSolver(local) => {
                if local.lb_to_ln < 1 {
                    return Err(ConfigError::invalid("backend.lb_to_ln", local.lb_to_ln, "必须至少为 1"));
                }
            }
            BackendConfig::RemoteDataset(remote) => {
                if remote.base_url.trim().is_empty() {
                    return Err(ConfigError::invalid("backend.base_url", "\"\"", "地址不能为空"));
                }
                if remote.step_ratio < 1 {
                    return Err(ConfigError::invalid(
                        "backend.step_ratio",
                        remote.step_ratio,
                        "必须至少为 1",
                    ));
                }
                if remote.max_attempts == Some(0) {
                    return Err(ConfigError::invalid("backend.max_attempts", 0, "必须至少为 1"));
                }
            }
        }

        if self.generation.num_workers < 1 {
            return Err(ConfigError::invalid("generation.num_workers", 0, "必须至少为 1"));
        }
        if self.generation.queue_capacity < 1 {
            return Err(ConfigError::invalid("generation.queue_capacity", 0, "必须至少为 1"));
        }

        self.validate_geometry()
    }

    /// 压缩窗口换算出的状态窗口必须能放进去掉边距后的模拟域
    fn validate_geometry(&self) -> Result<(), ConfigError> {
        let geometry = self.point_geometry()?;
        let origin = SubDomain::new(&vec![0; self.rank()], &self.network.input_cshape);
        let point = geometry.derive(0, self.sequence_length, origin)?;
        for window in [point.full_state_subdomain(), point.sequence_subdomain()] {
            for (axis, (&size, &extent)) in window.size().iter().zip(&self.sim_shape).enumerate() {
                let room = extent - 2 * self.boundary_margin;
                if size > room {
                    return Err(ConfigError::invalid(
                        format!("network.input_cshape[{}]", axis),
                        self.network.input_cshape[axis],
                        format!("换算出的状态窗口 {} 超出可用范围 {}", size, room),
                    ));
                }
            }
        }
        Ok(())
    }
}
