//! 运行指标
//!
//! 原子计数器，任何线程都可以无锁读取，用于观察总线健康状态。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// ```rust
/// use crane_driver::CraneMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = CraneMetrics::new();
/// metrics.telemetry_ticks.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().telemetry_ticks, 1);
/// ```
#[derive(Debug, Default)]
pub struct CraneMetrics {
    /// 遥测循环完成的周期数
    pub telemetry_ticks: AtomicU64,

    /// 遥测读取失败次数（该字段沿用上一周期的值）
    pub read_failures: AtomicU64,

    /// 寄存器写入次数
    pub writes_total: AtomicU64,

    /// 寄存器写入失败次数
    pub write_failures: AtomicU64,

    /// 成功执行的命令数
    pub commands_executed: AtomicU64,

    /// 被拒绝的命令数（未打开、暂停、越界、参数无效）
    pub commands_rejected: AtomicU64,

    /// 同步等待超时次数
    pub wait_timeouts: AtomicU64,
}

impl CraneMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器的当前值
    ///
    /// 各计数器分别原子读取，计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            telemetry_ticks: self.telemetry_ticks.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            writes_total: self.writes_total.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.telemetry_ticks.store(0, Ordering::Relaxed);
        self.read_failures.store(0, Ordering::Relaxed);
        self.writes_total.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.commands_executed.store(0, Ordering::Relaxed);
        self.commands_rejected.store(0, Ordering::Relaxed);
        self.wait_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub telemetry_ticks: u64,
    pub read_failures: u64,
    pub writes_total: u64,
    pub write_failures: u64,
    pub commands_executed: u64,
    pub commands_rejected: u64,
    pub wait_timeouts: u64,
}

impl MetricsSnapshot {
    /// 写入失败率（百分比），无写入时为 0
    pub fn write_failure_rate(&self) -> f64 {
        if self.writes_total == 0 {
            return 0.0;
        }
        (self.write_failures as f64 / self.writes_total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = CraneMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = CraneMetrics::new();
        metrics.writes_total.fetch_add(50, Ordering::Relaxed);
        metrics.wait_timeouts.fetch_add(2, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().writes_total, 50);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_updates() {
        let metrics = Arc::new(CraneMetrics::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.read_failures.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().read_failures, 1000);
    }

    #[test]
    fn test_write_failure_rate() {
        let snapshot = MetricsSnapshot {
            writes_total: 40,
            write_failures: 10,
            ..Default::default()
        };
        assert_eq!(snapshot.write_failure_rate(), 25.0);
        assert_eq!(MetricsSnapshot::default().write_failure_rate(), 0.0);
    }
}
