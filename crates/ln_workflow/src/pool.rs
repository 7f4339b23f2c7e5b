// crates/ln_workflow/src/pool.rs

//! 物化工作线程池
//!
//! 生产方把任务提交到有界 FIFO 队列（队列满时阻塞），一组常驻工作线程
//! 依次取出执行。
//!
//! 每个任务属于一个 [`JobGroup`]。任务一旦出队便不会取消；某个任务返回
//! 错误后只有它所在的组进入中止状态：该组仍在队列中的任务被跳过，
//! [`JobGroup::join`] 返回该组第一个错误，随后组恢复可用。其他组照常执行。
//! [`WorkerPool::submit`]/[`WorkerPool::join`] 使用池自带的默认组。

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{WorkflowError, WorkflowResult};

/// 池任务
pub type Job = Box<dyn FnOnce() -> WorkflowResult<()> + Send + 'static>;

/// 线程池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 工作线程数
    pub num_workers: usize,
    /// 队列容量
    pub queue_capacity: usize,
    /// 工作线程名前缀
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_capacity: 64,
            thread_name: "ln-worker".to_string(),
        }
    }
}

/// 线程池统计信息
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// 提交任务数
    pub submitted: u64,
    /// 成功任务数
    pub completed: u64,
    /// 失败任务数
    pub failed: u64,
    /// 因中止而跳过的任务数
    pub skipped: u64,
    /// 平均任务耗时（毫秒）
    pub average_job_time_ms: f64,
}

struct GroupState {
    pending: Mutex<usize>,
    drained: Condvar,
    aborted: AtomicBool,
    failure: Mutex<Option<WorkflowError>>,
}

/// 任务组，拥有独立的未完成计数与失败状态
///
/// 克隆得到同一个组的句柄。
#[derive(Clone)]
pub struct JobGroup {
    state: Arc<GroupState>,
}

impl JobGroup {
    /// 创建空组
    pub fn new() -> Self {
        Self {
            state: Arc::new(GroupState {
                pending: Mutex::new(0),
                drained: Condvar::new(),
                aborted: AtomicBool::new(false),
                failure: Mutex::new(None),
            }),
        }
    }

    /// 阻塞到本组已提交任务全部结束；返回本组第一个错误
    pub fn join(&self) -> WorkflowResult<()> {
        {
            let mut pending = self.state.pending.lock();
            while *pending > 0 {
                self.state.drained.wait(&mut pending);
            }
        }
        self.state.aborted.store(false, Ordering::SeqCst);
        match self.state.failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 本组未结束的任务数
    pub fn pending(&self) -> usize {
        *self.state.pending.lock()
    }

    fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    fn fail(&self, err: WorkflowError) {
        self.state.aborted.store(true, Ordering::SeqCst);
        self.state.failure.lock().get_or_insert(err);
    }

    fn start_one(&self) {
        *self.state.pending.lock() += 1;
    }

    fn finish_one(&self) {
        let mut pending = self.state.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.state.drained.notify_all();
        }
    }
}

impl Default for JobGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobGroup")
            .field("pending", &self.pending())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

struct Shared {
    in_flight: AtomicUsize,
    stats: Mutex<PoolStats>,
}

type Queued = (JobGroup, Job);

/// 工作线程池
pub struct WorkerPool {
    sender: Option<SyncSender<Queued>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    default_group: JobGroup,
    config: PoolConfig,
}

impl WorkerPool {
    /// 以默认配置创建
    pub fn new() -> WorkflowResult<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// 以指定配置创建
    pub fn with_config(config: PoolConfig) -> WorkflowResult<Self> {
        if config.num_workers == 0 {
            return Err(WorkflowError::Pool("at least one worker is required".into()));
        }
        let (sender, receiver) = sync_channel::<Queued>(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared {
            in_flight: AtomicUsize::new(0),
            stats: Mutex::new(PoolStats::default()),
        });

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.num_workers),
            shared,
            default_group: JobGroup::new(),
            config,
        };

        for i in 0..pool.config.num_workers {
            let receiver = receiver.clone();
            let shared = pool.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", pool.config.thread_name, i))
                .spawn(move || Self::worker_loop(receiver, shared))
                .map_err(|e| WorkflowError::Pool(format!("failed to spawn worker: {}", e)))?;
            pool.workers.push(handle);
        }

        debug!(
            "worker pool started: {} workers, queue capacity {}",
            pool.config.num_workers, pool.config.queue_capacity
        );
        Ok(pool)
    }

    /// 配置
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 提交任务到默认组，队列满时阻塞
    pub fn submit(&self, job: Job) -> WorkflowResult<()> {
        self.submit_to(&self.default_group, job)
    }

    /// 提交任务到指定组，队列满时阻塞
    pub fn submit_to(&self, group: &JobGroup, job: Job) -> WorkflowResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| WorkflowError::Pool("pool is shut down".into()))?;

        group.start_one();
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.lock().submitted += 1;

        if sender.send((group.clone(), job)).is_err() {
            Self::finish(&self.shared, group);
            return Err(WorkflowError::Pool("all workers have exited".into()));
        }
        Ok(())
    }

    /// 阻塞到默认组的任务全部结束；返回默认组第一个错误
    pub fn join(&self) -> WorkflowResult<()> {
        self.default_group.join()
    }

    /// 全池未结束的任务数
    pub fn pending(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// 获取统计信息
    pub fn stats(&self) -> PoolStats {
        self.shared.stats.lock().clone()
    }

    /// 关闭队列并等待工作线程退出
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool shut down");
    }

    fn finish(shared: &Shared, group: &JobGroup) {
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        group.finish_one();
    }

    fn worker_loop(receiver: Arc<Mutex<Receiver<Queued>>>, shared: Arc<Shared>) {
        loop {
            let queued = {
                let receiver = receiver.lock();
                receiver.recv()
            };
            let Ok((group, job)) = queued else { break };

            if group.is_aborted() {
                shared.stats.lock().skipped += 1;
                Self::finish(&shared, &group);
                continue;
            }

            let start = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .unwrap_or_else(|_| Err(WorkflowError::Pool("worker job panicked".into())));
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            {
                let mut stats = shared.stats.lock();
                match &result {
                    Ok(()) => stats.completed += 1,
                    Err(_) => stats.failed += 1,
                }
                let total = (stats.completed + stats.failed) as f64;
                stats.average_job_time_ms =
                    (stats.average_job_time_ms * (total - 1.0) + elapsed_ms) / total;
            }

            if let Err(err) = result {
                error!("worker job failed: {}", err);
                group.fail(err);
            }

            Self::finish(&shared, &group);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_workers", &self.workers.len())
            .field("pending", &self.pending())
            .finish()
    }
}
