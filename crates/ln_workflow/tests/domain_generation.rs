// crates/ln_workflow/tests/domain_generation.rs

//! 训练域数据点生成的端到端测试
//!
//! 远程下载器、求解器与编码器都用进程内的假实现替代。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use ndarray_npy::WriteNpyExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ln_config::{
    BackendConfig, DomainConfig, GenerationConfig, LocalSolverConfig, NetworkConfig,
    RemoteDatasetConfig,
};
use ln_core::ShapeConverter;
use ln_foundation::SubDomain;
use ln_io::{write_array, ArtifactKey, FetchError, Fetcher, BOUNDARY_FILE, CBOUNDARY_FILE};
use ln_workflow::solver::cpoint_name;
use ln_workflow::{
    Backend, Domain, EventDispatcher, GenerationEvent, PointKind, PoolConfig, SolverInvocation,
    SolverRunner, StateEncoder, WorkerPool, WorkflowError, WorkflowResult,
};

const CHANNELS: usize = 3;
const SIM: i64 = 40;

/// 按 URL 中的窗口尺寸返回数组，并统计每个 URL 的下载次数
#[derive(Default)]
struct FakeFetcher {
    hits: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    fn total(&self) -> usize {
        self.hits.lock().values().sum()
    }

    fn max_per_url(&self) -> usize {
        self.hits.lock().values().copied().max().unwrap_or(0)
    }

    fn distinct(&self) -> usize {
        self.hits.lock().len()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        // 第一个含逗号的段是 "<iter>,1"，其余为 "<pos>,<size>"
        let mut shape: Vec<usize> = url
            .split('/')
            .filter(|segment| segment.contains(','))
            .skip(1)
            .map(|segment| segment.split(',').nth(1).unwrap().parse().unwrap())
            .collect();
        shape.push(CHANNELS);
        let mut bytes = Vec::new();
        ArrayD::from_elem(IxDyn(&shape), 1.0f32)
            .write_npy(&mut bytes)
            .unwrap();
        Ok(bytes)
    }
}

/// 输出尺寸按状态换算器收缩的编码器
struct FakeEncoder {
    converter: ShapeConverter,
}

impl FakeEncoder {
    fn encode(&self, batch: ArrayViewD<'_, f32>, channels: usize) -> WorkflowResult<ArrayD<f32>> {
        let spatial: Vec<i64> = batch.shape()[1..batch.ndim() - 1]
            .iter()
            .map(|&n| n as i64)
            .collect();
        let contracted = self
            .converter
            .contract(&SubDomain::new(&vec![0; spatial.len()], &spatial))?;
        let mut shape = vec![batch.shape()[0]];
        shape.extend(contracted.shape()?);
        shape.push(channels);
        Ok(ArrayD::from_elem(IxDyn(&shape), 0.5))
    }
}

impl StateEncoder for FakeEncoder {
    fn encode_state(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>> {
        self.encode(batch, 4)
    }

    fn encode_boundary(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>> {
        self.encode(batch, 2)
    }
}

/// 整域编码器：空间尺寸按总步长缩小，输出值取输入首元素，并统计调用
#[derive(Default)]
struct SamePaddedEncoder {
    states: Mutex<HashMap<i64, usize>>,
    boundaries: AtomicUsize,
}

impl SamePaddedEncoder {
    fn encode(batch: ArrayViewD<'_, f32>, channels: usize) -> ArrayD<f32> {
        let ndim = batch.ndim();
        let mut shape = vec![batch.shape()[0]];
        shape.extend(batch.shape()[1..ndim - 1].iter().map(|&n| n / 2));
        shape.push(channels);
        let value = batch.iter().next().copied().unwrap_or(0.0);
        ArrayD::from_elem(IxDyn(&shape), value)
    }
}

impl StateEncoder for SamePaddedEncoder {
    fn encode_state(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>> {
        let encoded = Self::encode(batch, 4);
        let step = encoded.iter().next().copied().unwrap_or(-1.0) as i64;
        *self.states.lock().entry(step).or_insert(0) += 1;
        Ok(encoded)
    }

    fn encode_boundary(&self, batch: ArrayViewD<'_, f32>) -> WorkflowResult<ArrayD<f32>> {
        self.boundaries.fetch_add(1, Ordering::SeqCst);
        Ok(Self::encode(batch, 1))
    }
}

/// 把检查点写进暂存目录的求解器；`fail` 时直接报错
struct FakeSolver {
    runs: AtomicUsize,
    fail: bool,
}

impl SolverRunner for FakeSolver {
    fn run(&self, invocation: &SolverInvocation) -> WorkflowResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WorkflowError::SolverFailed {
                command: invocation.command_line(),
                status: "exit status: 1".to_string(),
            });
        }
        let max_iters: u64 = invocation
            .args
            .iter()
            .find_map(|a| a.strip_prefix("--max_sim_iters="))
            .and_then(|v| v.parse().ok())
            .unwrap();
        let sim = SIM as usize;
        for solver_iter in 0..max_iters {
            let state = ArrayD::from_elem(IxDyn(&[sim, sim, CHANNELS]), solver_iter as f32);
            write_array(&invocation.store_dir.join(cpoint_name(solver_iter)), &state).unwrap();
        }
        write_array(
            &invocation.store_dir.join(BOUNDARY_FILE),
            &ArrayD::zeros(IxDyn(&[sim, sim, 1])),
        )
        .unwrap();
        Ok(())
    }
}

fn small_network() -> NetworkConfig {
    NetworkConfig {
        nr_downsamples: 1,
        nr_residual_encoder: 1,
        nr_residual_compression: 1,
        input_cshape: vec![2, 2],
    }
}

fn config(save_dir: &Path, backend: BackendConfig) -> DomainConfig {
    DomainConfig {
        name: "channel".to_string(),
        save_dir: save_dir.to_path_buf(),
        sim_shape: vec![SIM, SIM],
        periodic: vec![true, false],
        sequence_length: 3,
        step_margin: 1,
        boundary_margin: 1,
        num_sim_steps: 12,
        backend,
        network: small_network(),
        generation: GenerationConfig {
            num_points: 6,
            num_workers: 4,
            queue_capacity: 2,
            seed: Some(7),
        },
    }
}

fn remote_config(save_dir: &Path) -> DomainConfig {
    config(
        save_dir,
        BackendConfig::RemoteDataset(RemoteDatasetConfig {
            base_url: "http://fake.dataset/channel".to_string(),
            step_ratio: 1,
            url_suffix: "npy".to_string(),
            retry_delay_ms: 1,
            max_attempts: Some(3),
            timeout_secs: 1,
            delete_after_compress: true,
        }),
    )
}

fn local_config(save_dir: &Path) -> DomainConfig {
    config(
        save_dir,
        BackendConfig::LocalSolver(LocalSolverConfig {
            script: PathBuf::from("./channel.py"),
            lb_to_ln: 1,
            gpu_device: "0".to_string(),
            debug: false,
        }),
    )
}

fn remote_domain(save_dir: &Path) -> (Domain, Arc<FakeFetcher>) {
    let config = remote_config(save_dir);
    let fetcher = Arc::new(FakeFetcher::default());
    let events = Arc::new(EventDispatcher::new());
    let backend = Backend::remote(&config, fetcher.clone(), events.clone());
    let domain = Domain::new(config, backend, events).unwrap();
    domain.prepare().unwrap();
    (domain, fetcher)
}

fn local_domain(save_dir: &Path, fail: bool) -> (Domain, Arc<FakeSolver>) {
    let config = local_config(save_dir);
    let solver = Arc::new(FakeSolver {
        runs: AtomicUsize::new(0),
        fail,
    });
    let events = Arc::new(EventDispatcher::new());
    let backend = Backend::local(&config, solver.clone(), events.clone());
    (Domain::new(config, backend, events).unwrap(), solver)
}

fn pool() -> WorkerPool {
    WorkerPool::with_config(PoolConfig {
        num_workers: 4,
        queue_capacity: 2,
        ..PoolConfig::default()
    })
    .unwrap()
}

#[test]
fn test_every_request_is_committed() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, fetcher) = remote_domain(dir.path());
    let pool = pool();
    let mut rng = StdRng::seed_from_u64(1);

    let committed = domain.add_rand_dps(12, &pool, &mut rng).unwrap();
    assert_eq!(committed, 12);
    assert_eq!(domain.index(PointKind::State).len(), 12);
    assert_eq!(fetcher.max_per_url(), 1);
    assert_eq!(fetcher.total(), fetcher.distinct());
    assert!(domain.index(PointKind::State).path().is_file());
}

#[test]
fn test_colliding_points_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, fetcher) = remote_domain(dir.path());
    let pool = pool();
    let mut rng = StdRng::seed_from_u64(2);

    let point = domain.generator().select(&mut rng).unwrap();
    let points = vec![point.clone(), point.clone(), point];
    assert_eq!(domain.materialize_points(points, PointKind::State, &pool).unwrap(), 3);

    // 起始步的完整窗口加上每步一个序列窗口
    assert_eq!(fetcher.distinct(), 1 + 3);
    assert_eq!(fetcher.total(), 1 + 3);
    assert_eq!(domain.index(PointKind::State).len(), 3);
}

#[test]
fn test_index_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, _) = remote_domain(dir.path());
    let pool = pool();
    let mut rng = domain.rng();
    assert_eq!(domain.create_data_points(&pool, &mut rng).unwrap(), 6);
    let saved = domain.index(PointKind::State).snapshot();

    let (reloaded, fetcher) = remote_domain(dir.path());
    assert_eq!(reloaded.load_points().unwrap(), (6, 0));
    assert_eq!(reloaded.index(PointKind::State).snapshot(), saved);

    // 已有索引时直接沿用，不再下载
    assert_eq!(reloaded.create_data_points(&pool, &mut rng).unwrap(), 6);
    assert_eq!(fetcher.total(), 0);
}

#[test]
fn test_read_state_point() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, _) = remote_domain(dir.path());
    let pool = pool();
    let mut rng = StdRng::seed_from_u64(3);
    domain.add_rand_dps(2, &pool, &mut rng).unwrap();

    let point = domain.select_rand_dp(&mut rng).unwrap();
    let sample = domain.read_dp(&point).unwrap();
    assert_eq!(sample.state.window.shape(), &[18, 18, CHANNELS]);
    assert!(sample.boundary.is_none());
    assert_eq!(sample.sequence.len(), 3);
    for step in &sample.sequence {
        assert_eq!(step.window.shape(), &[26, 26, CHANNELS]);
        assert_eq!(step.padded_cells(), 0);
    }
}

#[test]
fn test_compressed_points() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, _) = remote_domain(dir.path());
    let pool = pool();
    let mut rng = StdRng::seed_from_u64(4);

    let err = domain.add_rand_cdps(1, &pool, &mut rng).unwrap_err();
    assert!(matches!(err, WorkflowError::MissingEncoder));

    let converter = domain.geometry().state_converter().clone();
    let domain = domain.with_encoder(Arc::new(FakeEncoder { converter }));
    assert_eq!(domain.add_rand_cdps(4, &pool, &mut rng).unwrap(), 4);
    assert!(domain.index(PointKind::State).is_empty());

    let point = domain.select_rand_cdp(&mut rng).unwrap();
    let sample = domain.read_cdp(&point).unwrap();
    assert_eq!(sample.state.window.shape(), &[2, 2, 4]);
    assert_eq!(sample.sequence.len(), 3);
    assert_eq!(sample.sequence[0].window.shape(), &[6, 6, 4]);
    assert_eq!(sample.sequence[0].pad_mask.shape(), &[6, 6]);

    // 只为压缩下载的原始窗口不落盘
    let leftover = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("state_"))
        .count();
    assert_eq!(leftover, 0);
}

#[test]
fn test_empty_index_cannot_be_sampled() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, _) = remote_domain(dir.path());
    let mut rng = StdRng::seed_from_u64(5);
    assert!(matches!(
        domain.select_rand_dp(&mut rng),
        Err(WorkflowError::EmptyIndex("state"))
    ));
}

#[test]
fn test_local_solver_points() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, solver) = local_domain(dir.path(), false);
    domain.prepare().unwrap();
    assert_eq!(solver.runs.load(Ordering::SeqCst), 1);

    let pool = pool();
    let mut rng = StdRng::seed_from_u64(6);
    assert_eq!(domain.add_rand_dps(5, &pool, &mut rng).unwrap(), 5);
    assert_eq!(solver.runs.load(Ordering::SeqCst), 1);

    let point = domain.select_rand_dp(&mut rng).unwrap();
    let sample = domain.read_dp(&point).unwrap();
    assert_eq!(sample.state.window.shape(), &[18, 18, CHANNELS]);
    assert!(sample.state.window.iter().all(|&v| v == point.index() as f32));
    let boundary = sample.boundary.unwrap();
    assert_eq!(boundary.window.shape(), &[18, 18, 1]);
    assert_eq!(sample.sequence.len(), 3);
}

#[test]
fn test_solver_failure_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, solver) = local_domain(dir.path(), true);
    let failed = Arc::new(AtomicUsize::new(0));
    let counter = failed.clone();
    domain.events().add_fn_listener("failures", move |event| {
        if let GenerationEvent::BatchFailed { .. } = event {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let pool = pool();
    let mut rng = StdRng::seed_from_u64(8);
    let err = domain.add_rand_dps(4, &pool, &mut rng).unwrap_err();
    assert!(matches!(err, WorkflowError::SolverFailed { .. }));
    assert!(solver.runs.load(Ordering::SeqCst) >= 1);
    assert!(domain.index(PointKind::State).is_empty());
    assert!(!domain.index(PointKind::State).path().exists());
    assert_eq!(failed.load(Ordering::SeqCst), 1);

    // 池在失败后仍可使用
    pool.join().unwrap();
}

#[test]
fn test_compression_keeps_state_points_readable() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, _) = remote_domain(dir.path());
    let converter = domain.geometry().state_converter().clone();
    let domain = domain.with_encoder(Arc::new(FakeEncoder { converter }));
    let pool = pool();

    // 同一种子使两种数据点完全重合
    assert_eq!(domain.create_data_points(&pool, &mut domain.rng()).unwrap(), 6);
    let points = domain.index(PointKind::State).snapshot();
    for point in &points {
        domain.read_dp(point).unwrap();
    }

    assert_eq!(domain.create_cdata_points(&pool, &mut domain.rng()).unwrap(), 6);
    let compressed = domain.index(PointKind::Compressed).snapshot();
    assert!(points.iter().all(|point| compressed.contains(point)));
    for point in &points {
        let sample = domain.read_dp(point).unwrap();
        assert_eq!(sample.state.window.shape(), &[18, 18, CHANNELS]);
        domain.read_cdp(point).unwrap();
    }
}

#[test]
fn test_local_compressed_points() {
    let dir = tempfile::tempdir().unwrap();
    let (domain, solver) = local_domain(dir.path(), false);
    let encoder = Arc::new(SamePaddedEncoder::default());
    let domain = domain.with_encoder(encoder.clone());
    domain.prepare().unwrap();

    let pool = pool();
    let mut rng = StdRng::seed_from_u64(9);
    assert_eq!(domain.add_rand_cdps(5, &pool, &mut rng).unwrap(), 5);
    assert_eq!(solver.runs.load(Ordering::SeqCst), 1);

    // 每个用到的步只做一次整域编码
    let points = domain.index(PointKind::Compressed).snapshot();
    let mut steps: Vec<u64> = points.iter().flat_map(|p| p.steps()).collect();
    steps.sort_unstable();
    steps.dedup();
    let states = encoder.states.lock().clone();
    assert_eq!(states.len(), steps.len());
    for step in &steps {
        assert_eq!(states.get(&(*step as i64)), Some(&1));
        assert!(dir.path().join(ArtifactKey::whole_cstate(*step).file_name()).is_file());
    }
    assert_eq!(encoder.boundaries.load(Ordering::SeqCst), 1);
    assert!(dir.path().join(CBOUNDARY_FILE).is_file());

    let point = domain.select_rand_cdp(&mut rng).unwrap();
    let sample = domain.read_cdp(&point).unwrap();
    assert_eq!(sample.state.window.shape(), &[2, 2, 4]);
    assert!(sample.state.window.iter().all(|&v| v == point.index() as f32));
    assert_eq!(sample.boundary.unwrap().window.shape(), &[2, 2, 1]);
    assert_eq!(sample.sequence.len(), 3);
    for (offset, step) in sample.sequence.iter().enumerate() {
        assert_eq!(step.window.shape(), &[6, 6, 4]);
        assert_eq!(step.window[[3, 3, 0]], (point.index() + offset as u64) as f32);
    }
}

#[test]
fn test_shared_pool_isolates_domains() {
    let failing_dir = tempfile::tempdir().unwrap();
    let healthy_dir = tempfile::tempdir().unwrap();
    let (failing, _) = local_domain(failing_dir.path(), true);
    let (healthy, _) = remote_domain(healthy_dir.path());
    let pool = WorkerPool::with_config(PoolConfig {
        num_workers: 1,
        queue_capacity: 8,
        ..PoolConfig::default()
    })
    .unwrap();

    let (failed, committed) = std::thread::scope(|scope| {
        let failed = scope.spawn(|| failing.add_rand_dps(4, &pool, &mut StdRng::seed_from_u64(10)));
        let committed = scope.spawn(|| healthy.add_rand_dps(4, &pool, &mut StdRng::seed_from_u64(11)));
        (failed.join().unwrap(), committed.join().unwrap())
    });

    assert!(matches!(failed, Err(WorkflowError::SolverFailed { .. })));
    assert!(failing.index(PointKind::State).is_empty());
    assert_eq!(committed.unwrap(), 4);
    assert_eq!(healthy.index(PointKind::State).len(), 4);
    assert!(healthy.index(PointKind::State).path().is_file());
    assert_eq!(pool.pending(), 0);
}
