//! 进度事件节流器
//!
//! 控制进度事件的发布频率，避免大批量上传时的事件风暴。
//! 终态事件不走节流器，保证 done/error 一定送达。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 默认节流间隔（毫秒）
pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 200;

/// 进度事件节流器
///
/// 线程安全，用原子 CAS 代替锁；每个任务持有一个实例，
/// 每次进度回调先问 `should_emit()`，为 true 才发布事件
#[derive(Debug)]
pub struct ProgressThrottler {
    /// 实例创建时刻，作为单调时钟的零点
    origin: Instant,
    /// 上次发布事件的时刻（相对 origin 的毫秒数）
    last_emit_ms: AtomicU64,
    /// 节流间隔（毫秒）
    interval_ms: u64,
}

impl ProgressThrottler {
    /// 创建指定间隔的节流器
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            // 0 表示从未发布过，首次调用必然放行
            last_emit_ms: AtomicU64::new(0),
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// 使用指定毫秒间隔创建节流器
    pub fn with_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// 检查是否应该发布事件
    ///
    /// 距上次发布已超过间隔时返回 true 并推进时间戳；
    /// CAS 失败说明被并发回调抢先，本次不发布
    pub fn should_emit(&self) -> bool {
        let now = self.elapsed_ms();
        let last = self.last_emit_ms.load(Ordering::Relaxed);

        if last != 0 && now.saturating_sub(last) < self.interval_ms {
            return false;
        }

        self.last_emit_ms
            .compare_exchange(last, now.max(1), Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// 强制推进时间戳（完成前的最后一次进度用）
    pub fn force_emit(&self) {
        self.last_emit_ms
            .store(self.elapsed_ms().max(1), Ordering::Relaxed);
    }

    /// 重置节流器状态
    pub fn reset(&self) {
        self.last_emit_ms.store(0, Ordering::Relaxed);
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::with_millis(DEFAULT_THROTTLE_INTERVAL_MS)
    }
}
