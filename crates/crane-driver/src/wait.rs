//! 到位等待
//!
//! 纯轮询：执行器没有"运动完成"中断，到位只能由位置接近程度推断。
//! 卡死或过载的执行器永远到不了阈值内，表现为超时，而不是单独的错误。

use std::sync::Arc;
use std::time::Duration;

use crane_protocol::{JOINT_COUNT, MOVE_THRESHOLD_DEG};
use tracing::{info, warn};

use crate::error::DriverError;
use crate::state::PositionSource;

/// 运动目标（°）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionGoal {
    /// 7 个关节的目标角度
    Joints([f64; JOINT_COUNT]),
    /// 夹爪目标角度
    Gripper(f64),
}

/// 等待策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    /// 到位阈值（°，严格小于）
    pub threshold_deg: f64,
    /// 两次轮询之间的间隔，0 表示忙轮询
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            threshold_deg: MOVE_THRESHOLD_DEG,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// 到位等待器
///
/// 对照最新快照中的角度逐项判断，所有关节同时进入阈值即视为到位。
pub struct MotionWaiter {
    source: Arc<dyn PositionSource>,
    policy: WaitPolicy,
}

impl MotionWaiter {
    pub fn new(source: Arc<dyn PositionSource>, policy: WaitPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    fn within(&self, goal: f64, actual: f64) -> bool {
        (goal - actual).abs() < self.policy.threshold_deg
    }

    /// 当前是否已到位（单次判断）
    pub fn reached(&self, goal: &MotionGoal) -> bool {
        match goal {
            MotionGoal::Joints(goals) => {
                let actual = self.source.joint_positions_deg();
                goals.iter().zip(actual.iter()).all(|(g, a)| self.within(*g, *a))
            },
            MotionGoal::Gripper(goal) => self.within(*goal, self.source.gripper_position_deg()),
        }
    }

    /// 轮询直到到位或用完迭代预算
    ///
    /// 成功时返回实际轮询次数。最后一次轮询之后不再休眠。
    pub fn wait(&self, goal: &MotionGoal, max_iterations: u32) -> Result<u32, DriverError> {
        for i in 0..max_iterations {
            if self.reached(goal) {
                info!("Reach goal position");
                return Ok(i + 1);
            }
            if i + 1 < max_iterations && !self.policy.poll_interval.is_zero() {
                spin_sleep::sleep(self.policy.poll_interval);
            }
        }

        match goal {
            MotionGoal::Joints(_) => warn!(
                "timeout: not yet reach goal position {:?}",
                self.source.joint_positions_deg()
            ),
            MotionGoal::Gripper(_) => warn!(
                "timeout: not yet reach goal position {}",
                self.source.gripper_position_deg()
            ),
        }
        Err(DriverError::Timeout {
            iterations: max_iterations,
        })
    }

    pub fn wait_for_joints(
        &self,
        goals: &[f64; JOINT_COUNT],
        max_iterations: u32,
    ) -> Result<u32, DriverError> {
        self.wait(&MotionGoal::Joints(*goals), max_iterations)
    }

    pub fn wait_for_gripper(&self, goal: f64, max_iterations: u32) -> Result<u32, DriverError> {
        self.wait(&MotionGoal::Gripper(goal), max_iterations)
    }
}
