// crates/ln_io/src/remote.rs

//! 远程数据集下载
//!
//! 远程服务按 `(迭代步, 子域)` 返回一个 `.npy` 数组。地址格式：
//!
//! ```text
//! <base_url>/<iteration*step_ratio>,1/<p0>,<s0>/<p1>,<s1>/<p2>,<s2>/<suffix>/
//! ```
//!
//! 任何失败（非 2xx 状态、传输错误）都按固定间隔重试，默认不限次数。

use std::io::Read;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use ln_foundation::SubDomain;

use crate::error::{IoError, IoResult};

/// 单次下载错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 服务返回非 2xx 状态
    #[error("HTTP 状态 {code}")]
    Status {
        /// 状态码
        code: u16,
    },
    /// 连接、超时或读取失败
    #[error("传输失败: {0}")]
    Transport(String),
}

/// 下载接口
pub trait Fetcher: Send + Sync {
    /// 取回 `url` 的完整响应体
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// 基于 ureq 的 HTTP 下载器
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// 以给定超时创建
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status { code },
            ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(body)
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 两次尝试之间的固定间隔
    pub delay: Duration,
    /// 最大尝试次数，`None` 为无限
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

/// 带重试的下载；每次失败后先调用 `on_retry(第几次, 错误)` 再等待
pub fn fetch_with_retry<F>(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: RetryPolicy,
    mut on_retry: F,
) -> IoResult<Vec<u8>>
where
    F: FnMut(u32, &FetchError),
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match fetcher.fetch(url) {
            Ok(bytes) => {
                debug!("fetched {} bytes from {} (attempt {})", bytes.len(), url, attempt);
                return Ok(bytes);
            }
            Err(err) => {
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(IoError::Fetch {
                        url: url.to_string(),
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                on_retry(attempt, &err);
                thread::sleep(policy.delay);
            }
        }
    }
}

/// 远程地址模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    base_url: String,
    step_ratio: u64,
    suffix: String,
}

impl RemoteUrl {
    /// 创建地址模板
    pub fn new(base_url: impl Into<String>, step_ratio: u64, suffix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            step_ratio,
            suffix: suffix.into(),
        }
    }

    /// 某迭代步某窗口的地址
    pub fn url(&self, iteration: u64, subdomain: &SubDomain) -> String {
        let mut url = format!("{}/{},1", self.base_url, iteration * self.step_ratio);
        for (p, s) in subdomain.pos().iter().zip(subdomain.size()) {
            url.push_str(&format!("/{},{}", p, s));
        }
        url.push_str(&format!("/{}/", self.suffix));
        url
    }
}
