// crates/ln_io/src/inflight.rs

//! 在途键登记
//!
//! 同一个键同一时刻只允许一个持有者。两个工作线程请求同一份数据时，
//! 后到者阻塞到先到者释放，再检查磁盘上是否已存在。

use std::collections::HashSet;
use std::hash::Hash;

use parking_lot::{Condvar, Mutex};

/// 在途键集合
#[derive(Debug)]
pub struct InFlightKeys<K> {
    keys: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K> Default for InFlightKeys<K> {
    fn default() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlightKeys<K> {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 占用键，若已被占用则等待
    pub fn claim(&self, key: K) -> InFlightGuard<'_, K> {
        let mut keys = self.keys.lock();
        while keys.contains(&key) {
            self.released.wait(&mut keys);
        }
        keys.insert(key.clone());
        InFlightGuard { owner: self, key }
    }

    /// 当前在途键数
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// 是否没有在途键
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// 占用凭证，释放时唤醒等待者
pub struct InFlightGuard<'a, K: Eq + Hash> {
    owner: &'a InFlightKeys<K>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlightGuard<'_, K> {
    fn drop(&mut self) {
        self.owner.keys.lock().remove(&self.key);
        self.owner.released.notify_all();
    }
}
