//! 命令分发器
//!
//! 所有改变执行器状态的操作都遵循同一形式：
//!
//! 1. 接纳检查：关节运动在暂停时被拒绝；目标角度与百分比参数先整体校验，任何一项
//!    不合法都不会发出写入
//! 2. 持有命令锁完成全部寄存器写入，命令之间不会交错；遥测循环的单字段读取可以穿插
//! 3. 同步模式下，释放命令锁之后再进入到位等待

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crane_protocol::{
    GRIPPER_RATIO_MAX, JOINT_COUNT, ProtocolError, VELOCITY_SCALE_MAX, VELOCITY_SCALE_MIN,
};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::command::ArmCommand;
use crate::config::WaitBudgets;
use crate::error::DriverError;
use crate::gate::ControlGate;
use crate::joint::Actuators;
use crate::metrics::CraneMetrics;
use crate::wait::{MotionGoal, MotionWaiter};

/// 命令分发器
pub struct Dispatcher {
    actuators: Arc<Actuators>,
    gate: Arc<ControlGate>,
    home: Arc<RwLock<[f64; JOINT_COUNT]>>,
    waiter: MotionWaiter,
    budgets: WaitBudgets,
    gripper_margin_deg: i32,
    metrics: Arc<CraneMetrics>,
    command_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        actuators: Arc<Actuators>,
        gate: Arc<ControlGate>,
        home: Arc<RwLock<[f64; JOINT_COUNT]>>,
        waiter: MotionWaiter,
        budgets: WaitBudgets,
        gripper_margin_deg: i32,
        metrics: Arc<CraneMetrics>,
    ) -> Self {
        Self {
            actuators,
            gate,
            home,
            waiter,
            budgets,
            gripper_margin_deg,
            metrics,
            command_lock: Mutex::new(()),
        }
    }

    /// 接纳检查（闸门）
    pub fn admit(&self, command: &ArmCommand) -> Result<(), DriverError> {
        if command.is_gated() && !self.gate.admits_motion() {
            error!("{}: rejected while paused", command.name());
            self.metrics.commands_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::Paused);
        }
        Ok(())
    }

    /// 执行一条命令
    pub fn execute(&self, command: ArmCommand) -> Result<(), DriverError> {
        self.admit(&command)?;

        let result = match command {
            ArmCommand::Home { sync } => self.home(sync),
            ArmCommand::MoveJoints { goal, sync } => self.move_joints(&goal, sync),
            ArmCommand::OpenGripper { sync } => self.open_gripper(sync),
            ArmCommand::CloseGripper { sync } => self.close_gripper(sync),
            ArmCommand::MoveGripper { ratio, sync } => self.move_gripper(ratio, sync),
            ArmCommand::ServoOn => self.servo(true),
            ArmCommand::ServoOff => self.servo(false),
            ArmCommand::SetVelocityScale { ratio } => self.set_velocity_scale(ratio),
        };

        match &result {
            Ok(()) => {
                self.metrics.commands_executed.fetch_add(1, Ordering::Relaxed);
            },
            Err(DriverError::Timeout { .. }) => {
                self.metrics.wait_timeouts.fetch_add(1, Ordering::Relaxed);
            },
            Err(DriverError::OutOfRange { .. } | DriverError::Protocol(_)) => {
                self.metrics.commands_rejected.fetch_add(1, Ordering::Relaxed);
            },
            Err(_) => {},
        }
        result
    }

    // === 关节 ===

    fn home(&self, sync: bool) -> Result<(), DriverError> {
        let goal = *self.home.read();
        info!("move home: {:?}", goal);
        self.write_joint_goal(&goal, false)?;
        if sync {
            self.waiter.wait_for_joints(&goal, self.budgets.home)?;
        }
        Ok(())
    }

    fn move_joints(&self, goal: &[f64; JOINT_COUNT], sync: bool) -> Result<(), DriverError> {
        info!("movej [deg]: {:?}", goal);
        self.write_joint_goal(goal, true)?;
        if sync {
            self.waiter.wait_for_joints(goal, self.budgets.joints)?;
        }
        Ok(())
    }

    /// 校验全部目标后在命令锁内逐关节写入
    ///
    /// `gated` 为真时，取得命令锁后再检查一次闸门：接纳检查与加锁之间到达的暂停同样生效。
    fn write_joint_goal(&self, goal: &[f64; JOINT_COUNT], gated: bool) -> Result<(), DriverError> {
        for (i, (proxy, deg)) in self.actuators.arm.iter().zip(goal.iter()).enumerate() {
            if let Err(e) = proxy.check_goal(*deg) {
                error!("move j[{}]: cannot move", i);
                return Err(e);
            }
        }

        let _guard = self.command_lock.lock();
        if gated && !self.gate.admits_motion() {
            error!("movej: paused before the goal was written");
            self.metrics.commands_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::Paused);
        }
        for (i, (proxy, deg)) in self.actuators.arm.iter().zip(goal.iter()).enumerate() {
            if let Err(e) = proxy.move_to(*deg) {
                error!("move j[{}]: cannot move", i);
                return Err(e);
            }
        }
        Ok(())
    }

    // === 夹爪 ===

    /// 张开目标（°）：软限位上界减余量
    pub fn gripper_open_deg(&self) -> f64 {
        f64::from(self.actuators.gripper.max_deg() - self.gripper_margin_deg)
    }

    /// 闭合目标（°）：软限位下界加余量
    pub fn gripper_close_deg(&self) -> f64 {
        f64::from(self.actuators.gripper.min_deg() + self.gripper_margin_deg)
    }

    /// 开度百分比对应的目标（°）
    pub fn gripper_ratio_deg(&self, ratio: u32) -> Result<f64, DriverError> {
        if ratio > GRIPPER_RATIO_MAX {
            return Err(ProtocolError::RatioOutOfRange {
                ratio,
                min: 0,
                max: GRIPPER_RATIO_MAX,
            }
            .into());
        }
        let close = self.gripper_close_deg();
        let open = self.gripper_open_deg();
        Ok(close + (open - close) * f64::from(ratio) / f64::from(GRIPPER_RATIO_MAX))
    }

    fn open_gripper(&self, sync: bool) -> Result<(), DriverError> {
        info!("open gripper: sync={}", sync);
        let target = self.gripper_open_deg();
        self.move_gripper_to(target, sync, self.budgets.gripper_open)
    }

    fn close_gripper(&self, sync: bool) -> Result<(), DriverError> {
        info!("close gripper: sync={}", sync);
        let target = self.gripper_close_deg();
        self.move_gripper_to(target, sync, self.budgets.gripper_close)
    }

    fn move_gripper(&self, ratio: u32, sync: bool) -> Result<(), DriverError> {
        info!("move gripper: ratio={}% sync={}", ratio, sync);
        let target = self.gripper_ratio_deg(ratio).inspect_err(|e| error!("gripper: {}", e))?;
        self.move_gripper_to(target, sync, self.budgets.gripper_move)
    }

    fn move_gripper_to(&self, target: f64, sync: bool, budget: u32) -> Result<(), DriverError> {
        {
            let _guard = self.command_lock.lock();
            self.actuators.gripper.move_to(target)?;
        }
        if sync {
            self.waiter.wait_for_gripper(target, budget)?;
        }
        Ok(())
    }

    // === 伺服与速度 ===

    fn servo(&self, on: bool) -> Result<(), DriverError> {
        info!("servo {}", if on { "on" } else { "off" });
        let _guard = self.command_lock.lock();
        self.actuators.for_each_actuator(|proxy| proxy.torque(on))
    }

    fn set_velocity_scale(&self, ratio: u32) -> Result<(), DriverError> {
        if !(VELOCITY_SCALE_MIN..=VELOCITY_SCALE_MAX).contains(&ratio) {
            let e = DriverError::from(ProtocolError::RatioOutOfRange {
                ratio,
                min: VELOCITY_SCALE_MIN,
                max: VELOCITY_SCALE_MAX,
            });
            error!("set velocity scale: {}", e);
            return Err(e);
        }
        info!("set velocity scale: {}%", ratio);

        let _guard = self.command_lock.lock();
        let mut first_error = None;
        for proxy in &self.actuators.arm {
            let limit = proxy.velocity_limit_tick();
            let scaled = u64::from(limit) * u64::from(ratio) / u64::from(VELOCITY_SCALE_MAX);
            // ratio <= 100，结果不超过 limit
            let velocity = u32::try_from(scaled).unwrap_or(limit);
            if let Err(e) = proxy.set_profile_velocity(velocity) {
                warn!("joint[{}] keeps previous profile velocity", proxy.name());
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
