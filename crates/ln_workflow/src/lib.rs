// crates/ln_workflow/src/lib.rs

//! LatNet 数据管线工作流
//!
//! 在训练域上抽样数据点、按需物化数据并维护训练索引。
//!
//! # 模块结构
//!
//! - [`domain`]: 训练域，组合数据来源与索引
//! - [`backend`]: 本地求解器 / 远程数据集两种数据来源
//! - [`solver`]: 外部求解器调用与检查点目录
//! - [`generator`]: 数据点抽样
//! - [`pool`]: 有界队列工作线程池
//! - [`training_index`]: 数据点索引
//! - [`encoder`]: 状态编码器接口
//! - [`events`]: 事件系统
//!
//! # 示例
//!
//! ```rust,ignore
//! use ln_config::DomainConfig;
//! use ln_workflow::{Domain, WorkerPool};
//!
//! let config = DomainConfig::from_file("channel.json")?;
//! let domain = Domain::from_config(config)?;
//! domain.prepare()?;
//!
//! let pool = WorkerPool::with_config(domain.pool_config())?;
//! let mut rng = domain.rng();
//! domain.create_data_points(&pool, &mut rng)?;
//!
//! let point = domain.select_rand_dp(&mut rng)?;
//! let sample = domain.read_dp(&point)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod domain;
pub mod encoder;
pub mod error;
pub mod events;
pub mod generator;
pub mod pool;
pub mod solver;
pub mod training_index;

// 重导出核心类型
pub use backend::{Backend, LocalSolverBackend, RemoteDatasetBackend};
pub use domain::{Domain, StateSample};
pub use encoder::StateEncoder;
pub use error::{WorkflowError, WorkflowResult};
pub use events::{BatchId, EventDispatcher, EventListener, FnListener, GenerationEvent, LoggingListener};
pub use generator::DataPointGenerator;
pub use pool::{Job, JobGroup, PoolConfig, PoolStats, WorkerPool};
pub use solver::{Checkpoint, CheckpointDir, ProcessSolver, SolverInvocation, SolverRunner};
pub use training_index::{PointKind, TrainingIndex};
