// crates/ln_io/src/lib.rs

//! LatNet IO 层
//!
//! 负责磁盘与网络上的数据：
//!
//! - [`artifact`]: 以 `.npy` 文件存放的物化数据，原子写入与去重
//! - [`index`]: 数据点索引文件的保存与加载
//! - [`remote`]: 远程数据集下载与固定间隔重试
//! - [`sim_saver`]: 网络模拟帧的 `.npz` 保存
//! - [`inflight`]: 进程内同键操作的串行化
//! - [`error`]: IO 错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

mod atomic;

pub mod artifact;
pub mod error;
pub mod index;
pub mod inflight;
pub mod remote;
pub mod sim_saver;

pub use artifact::{read_array, write_array, ArtifactKey, ArtifactStore, BOUNDARY_FILE, CBOUNDARY_FILE};
pub use error::{IoError, IoResult};
pub use index::{load_index, save_index, CSTATE_INDEX_FILE, STATE_INDEX_FILE};
pub use inflight::{InFlightGuard, InFlightKeys};
pub use remote::{fetch_with_retry, FetchError, Fetcher, HttpFetcher, RemoteUrl, RetryPolicy};
pub use sim_saver::{SimFrame, SimSaver};
