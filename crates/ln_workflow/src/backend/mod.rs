// crates/ln_workflow/src/backend/mod.rs

//! 数据来源
//!
//! 训练域的原始状态可以由本地求解器生成，也可以从远程数据集按窗口下载。
//! 两者通过 [`Backend`] 统一成"确保存在 / 读取"两类操作。

mod local;
mod remote;

pub use local::LocalSolverBackend;
pub use remote::RemoteDatasetBackend;

use std::sync::Arc;
use std::time::Duration;

use ln_config::{BackendConfig, DomainConfig};
use ln_core::{Extracted, PeriodicExtractor};
use ln_foundation::SubDomain;
use ln_io::{Fetcher, HttpFetcher};

use crate::encoder::StateEncoder;
use crate::error::WorkflowResult;
use crate::events::EventDispatcher;
use crate::solver::{ProcessSolver, SolverRunner};

/// 数据来源
#[derive(Debug)]
pub enum Backend {
    /// 本地求解器
    LocalSolver(LocalSolverBackend),
    /// 远程数据集
    RemoteDataset(RemoteDatasetBackend),
}

impl Backend {
    /// 按配置创建，使用默认的子进程求解器或 HTTP 下载器
    pub fn from_config(config: &DomainConfig, events: Arc<EventDispatcher>) -> Self {
        match &config.backend {
            BackendConfig::LocalSolver(_) => Self::local(config, Arc::new(ProcessSolver), events),
            BackendConfig::RemoteDataset(remote) => {
                let fetcher = HttpFetcher::new(Duration::from_secs(remote.timeout_secs));
                Self::remote(config, Arc::new(fetcher), events)
            }
        }
    }

    /// 以指定求解器创建；配置不是本地求解器时退回 [`Backend::from_config`]
    pub fn local(
        config: &DomainConfig,
        runner: Arc<dyn SolverRunner>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        match &config.backend {
            BackendConfig::LocalSolver(local) => Self::LocalSolver(LocalSolverBackend::new(
                config.name.clone(),
                &config.save_dir,
                local.clone(),
                config.num_sim_steps,
                runner,
                events,
            )),
            BackendConfig::RemoteDataset(_) => Self::from_config(config, events),
        }
    }

    /// 以指定下载器创建；配置不是远程数据集时退回 [`Backend::from_config`]
    pub fn remote(
        config: &DomainConfig,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        match &config.backend {
            BackendConfig::RemoteDataset(remote) => Self::RemoteDataset(RemoteDatasetBackend::new(
                &config.save_dir,
                remote,
                fetcher,
                events,
            )),
            BackendConfig::LocalSolver(_) => Self::from_config(config, events),
        }
    }

    /// 名称
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocalSolver(_) => "local_solver",
            Self::RemoteDataset(_) => "remote_dataset",
        }
    }

    /// 是否还需运行求解器
    pub fn need_to_generate(&self) -> WorkflowResult<bool> {
        match self {
            Self::LocalSolver(local) => local.need_to_generate(),
            Self::RemoteDataset(_) => Ok(false),
        }
    }

    /// 预先生成训练数据
    pub fn generate_train_data(&self) -> WorkflowResult<()> {
        match self {
            Self::LocalSolver(local) => local.generate_train_data(),
            Self::RemoteDataset(_) => Ok(()),
        }
    }

    /// 确保原始状态存在
    pub fn ensure_state(&self, iteration: u64, subdomain: &SubDomain) -> WorkflowResult<()> {
        match self {
            Self::LocalSolver(local) => local.ensure_state(iteration),
            Self::RemoteDataset(remote) => remote.ensure_state(iteration, subdomain),
        }
    }

    /// 读取原始状态窗口
    pub fn read_state(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        match self {
            Self::LocalSolver(local) => local.read_state(iteration, subdomain, extractor),
            Self::RemoteDataset(remote) => remote.read_state(iteration, subdomain),
        }
    }

    /// 读取边界窗口，远程数据集返回 `None`
    pub fn read_boundary(
        &self,
        subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Option<Extracted<f32>>> {
        match self {
            Self::LocalSolver(local) => local.read_boundary(subdomain, extractor).map(Some),
            Self::RemoteDataset(_) => Ok(None),
        }
    }

    /// 确保压缩状态存在；`subdomain` 为原始状态窗口
    pub fn ensure_cstate(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        encoder: &dyn StateEncoder,
    ) -> WorkflowResult<()> {
        match self {
            Self::LocalSolver(local) => local.ensure_cstate(iteration, encoder),
            Self::RemoteDataset(remote) => remote.ensure_cstate(iteration, subdomain, encoder),
        }
    }

    /// 读取压缩状态窗口
    pub fn read_cstate(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        compressed_subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        match self {
            Self::LocalSolver(local) => local.read_cstate(iteration, compressed_subdomain, extractor),
            Self::RemoteDataset(remote) => remote.read_cstate(iteration, subdomain, compressed_subdomain),
        }
    }

    /// 确保压缩边界存在
    pub fn ensure_cboundary(&self, encoder: &dyn StateEncoder) -> WorkflowResult<()> {
        match self {
            Self::LocalSolver(local) => local.ensure_cboundary(encoder),
            Self::RemoteDataset(_) => Ok(()),
        }
    }

    /// 读取压缩边界窗口，远程数据集返回 `None`
    pub fn read_cboundary(
        &self,
        compressed_subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Option<Extracted<f32>>> {
        match self {
            Self::LocalSolver(local) => local.read_cboundary(compressed_subdomain, extractor).map(Some),
            Self::RemoteDataset(_) => Ok(None),
        }
    }
}
