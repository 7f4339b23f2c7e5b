// crates/ln_workflow/src/events.rs

//! 事件系统模块
//!
//! 数据点生成过程中的进度事件及其分发。

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::training_index::PointKind;

/// 批次ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    /// 创建新的批次ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 日志里取前 8 位即可区分
        let text = self.0.simple().to_string();
        write!(f, "{}", &text[..8])
    }
}

/// 生成事件
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// 批次已入队
    BatchQueued {
        /// 批次ID
        batch: BatchId,
        /// 域名称
        domain: String,
        /// 数据点种类
        kind: PointKind,
        /// 数据点数
        count: usize,
    },
    /// 一个数据点已提交
    PointCommitted {
        /// 批次ID
        batch: BatchId,
        /// 数据点种类
        kind: PointKind,
        /// 起始步
        index: u64,
        /// 本批已提交数
        committed: usize,
        /// 本批总数
        total: usize,
    },
    /// 批次完成，索引已保存
    BatchCompleted {
        /// 批次ID
        batch: BatchId,
        /// 域名称
        domain: String,
        /// 数据点种类
        kind: PointKind,
        /// 提交数
        committed: usize,
        /// 耗时 (秒)
        duration_secs: f64,
    },
    /// 批次失败
    BatchFailed {
        /// 批次ID
        batch: BatchId,
        /// 域名称
        domain: String,
        /// 错误信息
        error: String,
    },
    /// 下载失败，即将重试
    FetchRetry {
        /// 请求地址
        url: String,
        /// 第几次尝试
        attempt: u32,
        /// 错误信息
        error: String,
    },
    /// 求解器已启动
    SolverStarted {
        /// 命令行
        command: String,
    },
    /// 求解器已结束
    SolverFinished {
        /// 命令行
        command: String,
        /// 耗时 (秒)
        duration_secs: f64,
    },
}

impl GenerationEvent {
    /// 获取事件名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::BatchQueued { .. } => "BatchQueued",
            Self::PointCommitted { .. } => "PointCommitted",
            Self::BatchCompleted { .. } => "BatchCompleted",
            Self::BatchFailed { .. } => "BatchFailed",
            Self::FetchRetry { .. } => "FetchRetry",
            Self::SolverStarted { .. } => "SolverStarted",
            Self::SolverFinished { .. } => "SolverFinished",
        }
    }
}

/// 事件监听器trait
pub trait EventListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &GenerationEvent);

    /// 获取监听器名称 (用于调试)
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 函数式事件监听器
pub struct FnListener<F>
where
    F: Fn(&GenerationEvent) + Send + Sync,
{
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&GenerationEvent) + Send + Sync,
{
    /// 创建函数式监听器
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&GenerationEvent) + Send + Sync,
{
    fn on_event(&self, event: &GenerationEvent) {
        (self.handler)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 日志事件监听器
///
/// 进度每 `progress_every` 个数据点输出一次。
pub struct LoggingListener {
    prefix: String,
    progress_every: usize,
}

impl LoggingListener {
    /// 创建日志监听器
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            progress_every: 100,
        }
    }

    /// 设置进度输出间隔
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }
}

impl EventListener for LoggingListener {
    fn on_event(&self, event: &GenerationEvent) {
        let msg = match event {
            GenerationEvent::BatchQueued {
                batch,
                domain,
                kind,
                count,
            } => {
                format!("batch {} queued {} {} points for '{}'", batch, count, kind, domain)
            }
            GenerationEvent::PointCommitted {
                batch,
                committed,
                total,
                ..
            } => {
                if committed % self.progress_every != 0 && committed != total {
                    return;
                }
                format!("batch {} progress: [{}/{}]", batch, committed, total)
            }
            GenerationEvent::BatchCompleted {
                batch,
                committed,
                duration_secs,
                ..
            } => {
                format!(
                    "batch {} completed: {} points in {:.2}s",
                    batch, committed, duration_secs
                )
            }
            GenerationEvent::BatchFailed { batch, error, .. } => {
                tracing::error!("{}: batch {} failed: {}", self.prefix, batch, error);
                return;
            }
            GenerationEvent::SolverStarted { command } => format!("running solver: {}", command),
            GenerationEvent::SolverFinished { duration_secs, .. } => {
                format!("solver finished in {:.1}s", duration_secs)
            }
            // 重试由下载方直接以 warn 级别记录
            GenerationEvent::FetchRetry { .. } => return,
        };

        tracing::info!("{}: {}", self.prefix, msg);
    }

    fn name(&self) -> &str {
        "LoggingListener"
    }
}

/// 事件分发器
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    /// 创建新的事件分发器
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// 添加监听器
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        let name = listener.name().to_string();
        self.listeners.write().push(listener);
        tracing::debug!("Added event listener: {}", name);
    }

    /// 添加函数式监听器
    pub fn add_fn_listener<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&GenerationEvent) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener::new(name, handler)));
    }

    /// 分发事件
    pub fn emit(&self, event: GenerationEvent) {
        let listeners = self.listeners.read();

        tracing::trace!("Emitting event: {}", event.name());

        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    /// 获取监听器数量
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_dispatcher() {
        let dispatcher = EventDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        dispatcher.add_fn_listener("test", move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        dispatcher.add_listener(Arc::new(LoggingListener::new("test").with_progress_every(1)));
        assert_eq!(dispatcher.listener_count(), 2);

        let batch = BatchId::new();
        dispatcher.emit(GenerationEvent::BatchQueued {
            batch,
            domain: "toy".into(),
            kind: PointKind::State,
            count: 2,
        });
        dispatcher.emit(GenerationEvent::BatchCompleted {
            batch,
            domain: "toy".into(),
            kind: PointKind::State,
            committed: 2,
            duration_secs: 0.5,
        });

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_name() {
        let event = GenerationEvent::FetchRetry {
            url: "http://x".into(),
            attempt: 1,
            error: "HTTP 500".into(),
        };
        assert_eq!(event.name(), "FetchRetry");
        assert_eq!(BatchId::new().to_string().len(), 8);
    }
}
