//! 集成测试公共工具

#![allow(dead_code)]

use std::time::{Duration, Instant};

use crane_sdk::driver::WaitBudgets;
use crane_sdk::link::SimulatedBus;
use crane_sdk::{Crane, CraneBuilder, CraneConfig, DispatchMode};

/// 测试配置：预算放宽，避免调度抖动导致误超时
pub fn test_config(dispatch: DispatchMode) -> CraneConfig {
    CraneConfig {
        budgets: WaitBudgets {
            joints: 200,
            home: 200,
            gripper_open: 200,
            gripper_close: 200,
            gripper_move: 200,
        },
        dispatch,
        ..CraneConfig::default()
    }
}

/// 模拟总线 + 已打开的驱动
pub fn open_crane(dispatch: DispatchMode) -> (SimulatedBus, Crane) {
    let bus = SimulatedBus::crane_x7();
    let crane = CraneBuilder::new()
        .link(bus.clone())
        .config(test_config(dispatch))
        .build()
        .expect("Failed to build crane");
    crane.open().expect("Failed to open crane");
    (bus, crane)
}

/// 轮询直到条件满足或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// 所有关节均在目标附近
pub fn near(actual: &[f64], goal: &[f64], threshold: f64) -> bool {
    actual
        .iter()
        .zip(goal.iter())
        .all(|(a, g)| (a - g).abs() < threshold)
}
