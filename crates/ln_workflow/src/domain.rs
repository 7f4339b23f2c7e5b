// crates/ln_workflow/src/domain.rs

//! 训练域
//!
//! [`Domain`] 组合数据来源、抽样器与两份训练索引：
//!
//! ```text
//! 生产方 (select) ──► 有界队列 ──► 工作线程 (materialize) ──► 索引追加
//!                                                         │
//!                                       join 之后 ──► 保存索引
//! ```
//!
//! 抽样在生产方完成，工作线程只负责让数据落盘并提交。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use ln_config::DomainConfig;
use ln_core::{DataPoint, Extracted, PeriodicExtractor, PointGeometry};

use crate::backend::Backend;
use crate::encoder::StateEncoder;
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{BatchId, EventDispatcher, GenerationEvent};
use crate::generator::DataPointGenerator;
use crate::pool::{JobGroup, PoolConfig, WorkerPool};
use crate::training_index::{PointKind, TrainingIndex};

/// 一个数据点读出的训练样本
#[derive(Debug, Clone)]
pub struct StateSample {
    /// 起始步的状态（完整状态窗口）
    pub state: Extracted<f32>,
    /// 边界，数据来源不提供时为 `None`
    pub boundary: Option<Extracted<f32>>,
    /// 序列各步的状态（序列窗口）
    pub sequence: Vec<Extracted<f32>>,
}

/// 训练域
pub struct Domain {
    config: DomainConfig,
    geometry: PointGeometry,
    extractor: PeriodicExtractor,
    generator: DataPointGenerator,
    backend: Arc<Backend>,
    state_points: Arc<TrainingIndex>,
    cstate_points: Arc<TrainingIndex>,
    encoder: Option<Arc<dyn StateEncoder>>,
    events: Arc<EventDispatcher>,
}

impl Domain {
    /// 由配置与数据来源创建；`events` 应与创建数据来源时使用的分发器相同
    pub fn new(
        config: DomainConfig,
        backend: Backend,
        events: Arc<EventDispatcher>,
    ) -> WorkflowResult<Self> {
        config.validate()?;
        let geometry = config.point_geometry()?;
        let generator =
            DataPointGenerator::from_config(&config, geometry.clone(), config.num_sim_steps)?;
        let extractor = PeriodicExtractor::new(&config.padding_policies());
        let state_points = Arc::new(TrainingIndex::new(PointKind::State, &config.save_dir));
        let cstate_points = Arc::new(TrainingIndex::new(PointKind::Compressed, &config.save_dir));

        info!(
            "domain '{}': {} backend, sim shape {:?}, policies {:?}",
            config.name,
            backend.kind(),
            config.sim_shape,
            extractor.policies()
        );

        Ok(Self {
            config,
            geometry,
            extractor,
            generator,
            backend: Arc::new(backend),
            state_points,
            cstate_points,
            encoder: None,
            events,
        })
    }

    /// 按配置创建默认数据来源
    pub fn from_config(config: DomainConfig) -> WorkflowResult<Self> {
        let events = Arc::new(EventDispatcher::new());
        let backend = Backend::from_config(&config, events.clone());
        Self::new(config, backend, events)
    }

    /// 设置状态编码器（压缩数据点需要）
    pub fn with_encoder(mut self, encoder: Arc<dyn StateEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// 配置
    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// 名称
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 数据点几何
    pub fn geometry(&self) -> &PointGeometry {
        &self.geometry
    }

    /// 提取器
    pub fn extractor(&self) -> &PeriodicExtractor {
        &self.extractor
    }

    /// 抽样器
    pub fn generator(&self) -> &DataPointGenerator {
        &self.generator
    }

    /// 数据来源
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// 事件分发器
    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// 某种数据点的索引
    pub fn index(&self, kind: PointKind) -> &Arc<TrainingIndex> {
        match kind {
            PointKind::State => &self.state_points,
            PointKind::Compressed => &self.cstate_points,
        }
    }

    /// 按生成参数创建线程池配置
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            num_workers: self.config.generation.num_workers,
            queue_capacity: self.config.generation.queue_capacity,
            ..PoolConfig::default()
        }
    }

    /// 按配置的种子创建随机数发生器
    pub fn rng(&self) -> StdRng {
        match self.config.generation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// 创建保存目录；本地求解器在检查点不足时先运行模拟
    pub fn prepare(&self) -> WorkflowResult<()> {
        std::fs::create_dir_all(&self.config.save_dir)?;
        if self.backend.need_to_generate()? {
            info!("domain '{}': generating simulation data", self.config.name);
            self.backend.generate_train_data()?;
        }
        Ok(())
    }

    /// 从磁盘加载两份索引，返回 (状态数据点数, 压缩数据点数)
    pub fn load_points(&self) -> WorkflowResult<(usize, usize)> {
        let states = self.state_points.load(&self.geometry)?;
        let cstates = self.cstate_points.load(&self.geometry)?;
        debug!(
            "domain '{}': loaded {} state and {} compressed points",
            self.config.name, states, cstates
        );
        Ok((states, cstates))
    }

    /// 抽取 `count` 个状态数据点并物化，返回提交数
    pub fn add_rand_dps<R: Rng + ?Sized>(
        &self,
        count: usize,
        pool: &WorkerPool,
        rng: &mut R,
    ) -> WorkflowResult<usize> {
        let points = self.select_points(count, rng)?;
        self.materialize_points(points, PointKind::State, pool)
    }

    /// 抽取 `count` 个压缩数据点并物化，返回提交数
    pub fn add_rand_cdps<R: Rng + ?Sized>(
        &self,
        count: usize,
        pool: &WorkerPool,
        rng: &mut R,
    ) -> WorkflowResult<usize> {
        let points = self.select_points(count, rng)?;
        self.materialize_points(points, PointKind::Compressed, pool)
    }

    fn select_points<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> WorkflowResult<Vec<DataPoint>> {
        (0..count)
            .map(|_| self.generator.select(rng).map_err(WorkflowError::from))
            .collect()
    }

    /// 把给定数据点提交到线程池物化，排空后保存索引
    ///
    /// 每个数据点在其全部数据落盘后才追加到索引。任一任务失败时批次中止，
    /// 索引不保存，返回第一个错误。批次任务自成一个 [`JobGroup`]，
    /// 共用线程池的其他批次失败不影响本批次。
    pub fn materialize_points(
        &self,
        points: Vec<DataPoint>,
        kind: PointKind,
        pool: &WorkerPool,
    ) -> WorkflowResult<usize> {
        if kind == PointKind::Compressed && self.encoder.is_none() {
            return Err(WorkflowError::MissingEncoder);
        }

        let batch = BatchId::new();
        let total = points.len();
        let start = Instant::now();
        info!("[{}] queueing {} {} points for '{}'", batch, total, kind, self.config.name);
        self.events.emit(GenerationEvent::BatchQueued {
            batch,
            domain: self.config.name.clone(),
            kind,
            count: total,
        });

        let group = JobGroup::new();
        let committed = Arc::new(AtomicUsize::new(0));
        let submitted = points.into_iter().try_for_each(|point| {
            let backend = self.backend.clone();
            let index = self.index(kind).clone();
            let encoder = self.encoder.clone();
            let events = self.events.clone();
            let committed = committed.clone();
            pool.submit_to(&group, Box::new(move || {
                materialize(&backend, &point, kind, encoder.as_deref())?;
                let start_step = point.index();
                index.append(point);
                let done = committed.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("[{}] committed {} point at step {} ({}/{})", batch, kind, start_step, done, total);
                events.emit(GenerationEvent::PointCommitted {
                    batch,
                    kind,
                    index: start_step,
                    committed: done,
                    total,
                });
                Ok(())
            }))
        });

        let result = group.join().and(submitted);
        if let Err(err) = result {
            warn!("[{}] batch failed: {}", batch, err);
            self.events.emit(GenerationEvent::BatchFailed {
                batch,
                domain: self.config.name.clone(),
                error: err.to_string(),
            });
            return Err(err);
        }

        self.index(kind).save()?;
        let committed = committed.load(Ordering::SeqCst);
        let duration_secs = start.elapsed().as_secs_f64();
        info!("[{}] {} {} points committed in {:.1}s", batch, committed, kind, duration_secs);
        self.events.emit(GenerationEvent::BatchCompleted {
            batch,
            domain: self.config.name.clone(),
            kind,
            committed,
            duration_secs,
        });
        Ok(committed)
    }

    /// 状态数据点：索引已有内容则沿用，否则生成 `num_points` 个
    pub fn create_data_points<R: Rng + ?Sized>(&self, pool: &WorkerPool, rng: &mut R) -> WorkflowResult<usize> {
        self.create_points(PointKind::State, pool, rng)
    }

    /// 压缩数据点：索引已有内容则沿用，否则生成 `num_points` 个
    pub fn create_cdata_points<R: Rng + ?Sized>(&self, pool: &WorkerPool, rng: &mut R) -> WorkflowResult<usize> {
        self.create_points(PointKind::Compressed, pool, rng)
    }

    fn create_points<R: Rng + ?Sized>(
        &self,
        kind: PointKind,
        pool: &WorkerPool,
        rng: &mut R,
    ) -> WorkflowResult<usize> {
        let index = self.index(kind);
        let loaded = index.load(&self.geometry)?;
        if loaded > 0 {
            info!(
                "domain '{}': resuming with {} {} points from {}",
                self.config.name,
                loaded,
                kind,
                index.path().display()
            );
            return Ok(loaded);
        }
        let points = self.select_points(self.config.generation.num_points, rng)?;
        self.materialize_points(points, kind, pool)?;
        Ok(index.len())
    }

    /// 读取状态数据点
    pub fn read_dp(&self, point: &DataPoint) -> WorkflowResult<StateSample> {
        let full = point.full_state_subdomain();
        let sequence_window = point.sequence_subdomain();
        let state = self.backend.read_state(point.index(), full, &self.extractor)?;
        let boundary = self.backend.read_boundary(full, &self.extractor)?;
        let sequence = point
            .steps()
            .map(|step| self.backend.read_state(step, sequence_window, &self.extractor))
            .collect::<WorkflowResult<Vec<_>>>()?;
        Ok(StateSample {
            state,
            boundary,
            sequence,
        })
    }

    /// 读取压缩数据点，窗口在压缩坐标中
    pub fn read_cdp(&self, point: &DataPoint) -> WorkflowResult<StateSample> {
        let compressed = point.compressed_subdomain();
        let sequence_compressed = self.geometry.sequence_compressed_subdomain(point)?;
        let state = self.backend.read_cstate(
            point.index(),
            point.full_state_subdomain(),
            compressed,
            &self.extractor,
        )?;
        let boundary = self.backend.read_cboundary(compressed, &self.extractor)?;
        let sequence = point
            .steps()
            .map(|step| {
                self.backend.read_cstate(
                    step,
                    point.sequence_subdomain(),
                    &sequence_compressed,
                    &self.extractor,
                )
            })
            .collect::<WorkflowResult<Vec<_>>>()?;
        Ok(StateSample {
            state,
            boundary,
            sequence,
        })
    }

    /// 均匀抽取一个状态数据点
    pub fn select_rand_dp<R: Rng + ?Sized>(&self, rng: &mut R) -> WorkflowResult<DataPoint> {
        self.state_points
            .select_random(rng)
            .ok_or(WorkflowError::EmptyIndex(PointKind::State.label()))
    }

    /// 均匀抽取一个压缩数据点
    pub fn select_rand_cdp<R: Rng + ?Sized>(&self, rng: &mut R) -> WorkflowResult<DataPoint> {
        self.cstate_points
            .select_random(rng)
            .ok_or(WorkflowError::EmptyIndex(PointKind::Compressed.label()))
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.config.name)
            .field("backend", &self.backend.kind())
            .field("state_points", &self.state_points.len())
            .field("cstate_points", &self.cstate_points.len())
            .field("has_encoder", &self.encoder.is_some())
            .finish()
    }
}

/// 物化一个数据点的全部数据
fn materialize(
    backend: &Backend,
    point: &DataPoint,
    kind: PointKind,
    encoder: Option<&dyn StateEncoder>,
) -> WorkflowResult<()> {
    match kind {
        PointKind::State => {
            backend.ensure_state(point.index(), point.full_state_subdomain())?;
            for step in point.steps() {
                backend.ensure_state(step, point.sequence_subdomain())?;
            }
        }
        PointKind::Compressed => {
            let encoder = encoder.ok_or(WorkflowError::MissingEncoder)?;
            backend.ensure_cstate(point.index(), point.full_state_subdomain(), encoder)?;
            for step in point.steps() {
                backend.ensure_cstate(step, point.sequence_subdomain(), encoder)?;
            }
            backend.ensure_cboundary(encoder)?;
        }
    }
    Ok(())
}
