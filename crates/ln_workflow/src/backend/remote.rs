// crates/ln_workflow/src/backend/remote.rs

//! 远程数据集数据来源
//!
//! 每个 `(迭代步, 窗口)` 单独下载并以窗口键存盘。数据集不提供边界。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ndarray::{ArrayD, IxDyn};
use tracing::warn;

use ln_config::RemoteDatasetConfig;
use ln_core::Extracted;
use ln_foundation::SubDomain;
use ln_io::artifact::decode_npy;
use ln_io::{fetch_with_retry, ArtifactKey, ArtifactStore, Fetcher, IoError, RemoteUrl, RetryPolicy};

use crate::encoder::{encode_one, EncodeTarget, StateEncoder};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventDispatcher, GenerationEvent};

/// 远程数据集数据来源
pub struct RemoteDatasetBackend {
    url: RemoteUrl,
    retry: RetryPolicy,
    delete_after_compress: bool,
    store: ArtifactStore,
    fetcher: Arc<dyn Fetcher>,
    events: Arc<EventDispatcher>,
}

impl RemoteDatasetBackend {
    /// 创建
    pub fn new(
        save_dir: impl Into<PathBuf>,
        config: &RemoteDatasetConfig,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            url: RemoteUrl::new(&config.base_url, config.step_ratio, &config.url_suffix),
            retry: RetryPolicy {
                delay: Duration::from_millis(config.retry_delay_ms),
                max_attempts: config.max_attempts,
            },
            delete_after_compress: config.delete_after_compress,
            store: ArtifactStore::new(save_dir),
            fetcher,
            events,
        }
    }

    /// 数据文件仓库
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// 地址模板
    pub fn url(&self) -> &RemoteUrl {
        &self.url
    }

    /// 确保窗口原始状态已下载
    pub fn ensure_state(&self, iteration: u64, subdomain: &SubDomain) -> WorkflowResult<()> {
        let key = ArtifactKey::state(iteration, subdomain);
        self.store.ensure_with(&key, || {
            let (bytes, _) = self.fetch_window(iteration, subdomain, &key)?;
            self.store.write_bytes(&key, &bytes)?;
            Ok::<(), WorkflowError>(())
        })?;
        Ok(())
    }

    /// 下载一个窗口并检查形状，返回原始字节和解码后的数组
    fn fetch_window(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        key: &ArtifactKey,
    ) -> WorkflowResult<(Vec<u8>, ArrayD<f32>)> {
        let url = self.url.url(iteration, subdomain);
        let bytes = fetch_with_retry(self.fetcher.as_ref(), &url, self.retry, |attempt, err| {
            warn!("fetch {} failed (attempt {}): {}, retrying", url, attempt, err);
            self.events.emit(GenerationEvent::FetchRetry {
                url: url.clone(),
                attempt,
                error: err.to_string(),
            });
        })?;
        let array = decode_npy(&bytes).map_err(|message| IoError::npy(self.store.path(key), message))?;
        check_window(&array, subdomain, key, &self.store)?;
        Ok((bytes, array))
    }

    /// 读取原始状态窗口；下载的窗口没有填充，掩码全 0
    pub fn read_state(&self, iteration: u64, subdomain: &SubDomain) -> WorkflowResult<Extracted<f32>> {
        let window = self.store.read(&ArtifactKey::state(iteration, subdomain))?;
        unpadded(window, subdomain)
    }

    /// 确保窗口压缩状态存在
    ///
    /// 原始窗口已在盘上时直接读取，且不会删除。否则重新下载；
    /// `delete_after_compress` 为真时下载的原始窗口只在内存中使用，不落盘。
    pub fn ensure_cstate(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        encoder: &dyn StateEncoder,
    ) -> WorkflowResult<()> {
        let key = ArtifactKey::cstate(iteration, subdomain);
        self.store.ensure_with(&key, || {
            let state_key = ArtifactKey::state(iteration, subdomain);
            let state = if self.delete_after_compress && !self.store.exists(&state_key) {
                self.fetch_window(iteration, subdomain, &state_key)?.1
            } else {
                self.ensure_state(iteration, subdomain)?;
                self.store.read(&state_key)?
            };
            let cstate = encode_one(encoder, &state, EncodeTarget::State)?;
            self.store.write(&key, &cstate)?;
            Ok::<(), WorkflowError>(())
        })?;
        Ok(())
    }

    /// 读取压缩状态窗口；`subdomain` 为原始状态窗口，`compressed_subdomain` 为其压缩坐标
    pub fn read_cstate(
        &self,
        iteration: u64,
        subdomain: &SubDomain,
        compressed_subdomain: &SubDomain,
    ) -> WorkflowResult<Extracted<f32>> {
        let window = self.store.read(&ArtifactKey::cstate(iteration, subdomain))?;
        unpadded(window, compressed_subdomain)
    }
}

fn check_window(
    array: &ArrayD<f32>,
    subdomain: &SubDomain,
    key: &ArtifactKey,
    store: &ArtifactStore,
) -> WorkflowResult<()> {
    let expected = subdomain.shape()?;
    if array.ndim() < expected.len() || array.shape()[..expected.len()] != expected[..] {
        return Err(IoError::npy(
            store.path(key),
            format!("downloaded shape {:?} does not cover window {}", array.shape(), subdomain),
        )
        .into());
    }
    Ok(())
}

fn unpadded(window: ArrayD<f32>, subdomain: &SubDomain) -> WorkflowResult<Extracted<f32>> {
    let shape = subdomain.shape()?;
    Ok(Extracted {
        window,
        pad_mask: ArrayD::zeros(IxDyn(&shape)),
    })
}

impl std::fmt::Debug for RemoteDatasetBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDatasetBackend")
            .field("url", &self.url)
            .field("retry", &self.retry)
            .field("save_dir", &self.store.root())
            .finish()
    }
}
