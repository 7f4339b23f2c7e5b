// crates/ln_workflow/src/backend/local.rs

//! 本地求解器数据来源
//!
//! 原始状态是整个模拟域的检查点，按需运行求解器补齐；窗口在读取时
//! 用周期提取取出。压缩状态同样按整域存放，在压缩坐标中提取。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use ln_config::LocalSolverConfig;
use ln_core::{Extracted, PeriodicExtractor};
use ln_foundation::SubDomain;
use ln_io::{read_array, ArtifactKey, ArtifactStore};

use crate::encoder::{encode_one, EncodeTarget, StateEncoder};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventDispatcher, GenerationEvent};
use crate::solver::{Checkpoint, CheckpointDir, SolverInvocation, SolverRunner};

/// 本地求解器数据来源
pub struct LocalSolverBackend {
    domain_name: String,
    config: LocalSolverConfig,
    num_sim_steps: u64,
    cpoints: CheckpointDir,
    store: ArtifactStore,
    runner: Arc<dyn SolverRunner>,
    events: Arc<EventDispatcher>,
    solver_lock: Mutex<()>,
}

impl LocalSolverBackend {
    /// 创建
    pub fn new(
        domain_name: impl Into<String>,
        save_dir: impl Into<PathBuf>,
        config: LocalSolverConfig,
        num_sim_steps: u64,
        runner: Arc<dyn SolverRunner>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        let save_dir = save_dir.into();
        Self {
            domain_name: domain_name.into(),
            cpoints: CheckpointDir::new(&save_dir, config.lb_to_ln),
            store: ArtifactStore::new(save_dir),
            config,
            num_sim_steps,
            runner,
            events,
            solver_lock: Mutex::new(()),
        }
    }

    /// 检查点目录
    pub fn checkpoints(&self) -> &CheckpointDir {
        &self.cpoints
    }

    /// 数据文件仓库
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// 已有检查点是否不足
    pub fn need_to_generate(&self) -> WorkflowResult<bool> {
        if !self.cpoints.is_restorable()? {
            return Ok(true);
        }
        let have = self
            .cpoints
            .last_cpoint()?
            .map(|c| c.iteration + 1)
            .unwrap_or(0);
        Ok(have < self.num_sim_steps)
    }

    /// 补齐到配置的步数
    pub fn generate_train_data(&self) -> WorkflowResult<()> {
        let _solver = self.solver_lock.lock();
        if !self.need_to_generate()? {
            return Ok(());
        }
        self.extend_to(self.num_sim_steps)
    }

    /// 从头运行求解器 `num_iters` 个训练步
    ///
    /// 旧的检查点、边界与压缩边界都会被删除；索引文件保留。
    pub fn new_sim(&self, num_iters: u64) -> WorkflowResult<()> {
        let removed = self.cpoints.remove_outputs()?;
        self.store.remove(&ArtifactKey::CBoundary)?;
        if removed > 0 {
            debug!("removed {} stale checkpoints", removed);
        }
        self.run_solver(num_iters, None)
    }

    /// 从最新检查点续算到 `num_iters` 个训练步
    pub fn restart_sim(&self, num_iters: u64) -> WorkflowResult<()> {
        let last = self
            .cpoints
            .last_cpoint()?
            .ok_or(WorkflowError::MissingCheckpoint { iteration: 0 })?;
        self.run_solver(num_iters, Some(&last))
    }

    fn extend_to(&self, num_iters: u64) -> WorkflowResult<()> {
        if self.cpoints.is_restorable()? {
            self.restart_sim(num_iters)
        } else {
            self.new_sim(num_iters)
        }
    }

    /// 构造求解器调用
    pub fn invocation(&self, num_iters: u64, restore_from: Option<&Checkpoint>) -> SolverInvocation {
        let store_dir = self.cpoints.store_dir();
        let mut args = vec![
            "--run_mode=generate_data".to_string(),
            format!("--domain_name={}", self.domain_name),
            format!("--max_sim_iters={}", self.cpoints.to_solver_iter(num_iters) + 1),
            format!("--train_sim_dir={}", store_dir.join("flow").display()),
        ];
        if let Some(cpoint) = restore_from {
            args.push("--restore_geometry=True".to_string());
            args.push(format!("--restore_from={}", cpoint.restore_stem()));
        }
        if self.config.debug {
            args.push("--mode=visualization".to_string());
        }
        SolverInvocation {
            program: self.config.script.clone(),
            args,
            envs: vec![("CUDA_VISIBLE_DEVICES".to_string(), self.config.gpu_device.clone())],
            store_dir,
        }
    }

    fn run_solver(&self, num_iters: u64, restore_from: Option<&Checkpoint>) -> WorkflowResult<()> {
        self.cpoints.clean_store()?;
        let invocation = self.invocation(num_iters, restore_from);
        let command = invocation.command_line();
        info!("running solver: {}", command);
        self.events.emit(GenerationEvent::SolverStarted {
            command: command.clone(),
        });

        let start = Instant::now();
        self.runner.run(&invocation)?;
        let moved = self.cpoints.collect_store()?;
        let duration_secs = start.elapsed().as_secs_f64();
        info!("solver finished in {:.1}s, {} files collected", duration_secs, moved);
        self.events.emit(GenerationEvent::SolverFinished {
            command,
            duration_secs,
        });
        Ok(())
    }

    /// 确保第 `iteration` 步的检查点存在，必要时延长模拟
    pub fn ensure_state(&self, iteration: u64) -> WorkflowResult<()> {
        if self.cpoints.cpoint_path(iteration)?.is_some() {
            return Ok(());
        }
        let _solver = self.solver_lock.lock();
        if self.cpoints.cpoint_path(iteration)?.is_some() {
            return Ok(());
        }
        self.extend_to((iteration + 1).max(self.num_sim_steps))?;
        if self.cpoints.cpoint_path(iteration)?.is_none() {
            return Err(WorkflowError::MissingCheckpoint { iteration });
        }
        Ok(())
    }

    /// 读取原始状态窗口
    pub fn read_state(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        let path = self
            .cpoints
            .cpoint_path(iteration)?
            .ok_or(WorkflowError::MissingCheckpoint { iteration })?;
        let state = read_array(&path)?;
        Ok(extractor.extract(state.view(), subdomain)?)
    }

    /// 读取边界窗口
    pub fn read_boundary(
        &self,
        subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        let boundary = self.store.read(&ArtifactKey::Boundary)?;
        Ok(extractor.extract(boundary.view(), subdomain)?)
    }

    /// 确保第 `iteration` 步的整域压缩状态存在
    pub fn ensure_cstate(&self, iteration: u64, encoder: &dyn StateEncoder) -> WorkflowResult<()> {
        let key = ArtifactKey::whole_cstate(iteration);
        self.store.ensure_with(&key, || {
            self.ensure_state(iteration)?;
            let path = self
                .cpoints
                .cpoint_path(iteration)?
                .ok_or(WorkflowError::MissingCheckpoint { iteration })?;
            let state = read_array(&path)?;
            let cstate = encode_one(encoder, &state, EncodeTarget::State)?;
            self.store.write(&key, &cstate)?;
            Ok::<(), WorkflowError>(())
        })?;
        Ok(())
    }

    /// 读取压缩状态窗口（压缩坐标）
    pub fn read_cstate(
        &self,
        iteration: u64,
        compressed_subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        let cstate = self.store.read(&ArtifactKey::whole_cstate(iteration))?;
        Ok(extractor.extract(cstate.view(), compressed_subdomain)?)
    }

    /// 确保压缩边界存在
    pub fn ensure_cboundary(&self, encoder: &dyn StateEncoder) -> WorkflowResult<()> {
        self.store.ensure_with(&ArtifactKey::CBoundary, || {
            if !self.store.exists(&ArtifactKey::Boundary) {
                self.ensure_state(0)?;
            }
            let boundary = self.store.read(&ArtifactKey::Boundary)?;
            let cboundary = encode_one(encoder, &boundary, EncodeTarget::Boundary)?;
            self.store.write(&ArtifactKey::CBoundary, &cboundary)?;
            Ok::<(), WorkflowError>(())
        })?;
        Ok(())
    }

    /// 读取压缩边界窗口
    pub fn read_cboundary(
        &self,
        compressed_subdomain: &SubDomain,
        extractor: &PeriodicExtractor,
    ) -> WorkflowResult<Extracted<f32>> {
        let cboundary = self.store.read(&ArtifactKey::CBoundary)?;
        Ok(extractor.extract(cboundary.view(), compressed_subdomain)?)
    }
}

impl std::fmt::Debug for LocalSolverBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSolverBackend")
            .field("domain_name", &self.domain_name)
            .field("save_dir", &self.cpoints.dir())
            .field("lb_to_ln", &self.config.lb_to_ln)
            .finish()
    }
}
