//! CRANE-X7 驱动入口
//!
//! [`Crane`] 拥有设备链路，`open()` 建立会话（执行器代理 + 遥测线程 + 分发器），
//! `close()` 销毁会话。闸门与回零位置跨会话保留。
//!
//! 所有操作都以 `Result` 报告失败并记录一条日志，从不 panic。

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crane_link::DeviceLink;
use crane_protocol::{ARM_JOINT_NAMES, JOINT_COUNT, tick_to_deg};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::command::ArmCommand;
use crate::config::CraneConfig;
use crate::error::DriverError;
use crate::gate::{ControlGate, GateState};
use crate::joint::{JointProxy, SharedLink};
use crate::metrics::MetricsSnapshot;
use crate::session::{Session, Shared};
use crate::state::{ArmContext, ArmSnapshot, ArmStatus};
use crate::telemetry::{AtomicTelemetryState, TelemetryState};

/// 关节软限位（°）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimit {
    pub min_deg: f64,
    pub max_deg: f64,
}

impl JointLimit {
    fn of(proxy: &JointProxy) -> Self {
        Self {
            min_deg: f64::from(tick_to_deg(proxy.min_tick())),
            max_deg: f64::from(tick_to_deg(proxy.max_tick())),
        }
    }
}

/// 机械臂基本信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManipInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    /// 轴数
    pub axis_count: usize,
    /// 指令周期（毫秒）
    pub command_cycle_ms: u32,
    pub has_gripper: bool,
}

/// CRANE-X7 驱动
pub struct Crane {
    link: SharedLink,
    config: CraneConfig,
    shared: Shared,
    session: RwLock<Option<Session>>,
}

impl Crane {
    /// 以给定链路和配置创建驱动（不打开链路）
    pub fn new(link: Box<dyn DeviceLink>, config: CraneConfig) -> Self {
        let home = config.home;
        Self {
            link: Arc::new(Mutex::new(link)),
            config,
            shared: Shared {
                gate: Arc::new(ControlGate::default()),
                home: Arc::new(RwLock::new(home)),
                context: Arc::new(ArmContext::new()),
                telemetry_state: Arc::new(AtomicTelemetryState::default()),
            },
            session: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CraneConfig {
        &self.config
    }

    // === 生命周期 ===

    /// 打开链路并建立会话
    pub fn open(&self) -> Result<(), DriverError> {
        let mut session = self.session.write();
        if session.is_some() {
            warn!("open: link already opened");
            return Err(DriverError::AlreadyOpen);
        }

        info!("Opening {} at {} bps", self.config.device, self.config.baud_rate);
        if let Err(e) = self.link.lock().open(&self.config.device, self.config.baud_rate) {
            error!("Failed to open the port: {}", e);
            return Err(e.into());
        }

        self.shared.context.publish(ArmSnapshot::default());
        match Session::start(self.link.clone(), &self.config, &self.shared) {
            Ok(started) => {
                *session = Some(started);
                Ok(())
            },
            Err(e) => {
                error!("Failed to initialize actuators: {}", e);
                self.link.lock().close();
                Err(e)
            },
        }
    }

    /// 关闭会话与链路（未打开时为空操作）
    pub fn close(&self) -> Result<(), DriverError> {
        let session = self.session.write().take();
        if session.is_some() {
            drop(session);
            info!("Link closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.session.read().is_some()
    }

    // === 命令 ===

    fn dispatch(&self, command: ArmCommand) -> Result<(), DriverError> {
        let session = self.session.read();
        match session.as_ref() {
            Some(session) => session.dispatch(command),
            None => {
                error!("{}: not yet initialized", command.name());
                self.shared
                    .context
                    .metrics
                    .commands_rejected
                    .fetch_add(1, Ordering::Relaxed);
                Err(DriverError::NotInitialized)
            },
        }
    }

    /// 回到回零位置
    pub fn home(&self, sync: bool) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::Home { sync })
    }

    /// 关节空间单点运动（°，link1..link7）
    pub fn move_joints(&self, goal: [f64; JOINT_COUNT], sync: bool) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::MoveJoints { goal, sync })
    }

    pub fn open_gripper(&self, sync: bool) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::OpenGripper { sync })
    }

    pub fn close_gripper(&self, sync: bool) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::CloseGripper { sync })
    }

    /// 夹爪移动到开度百分比（0 = 闭合，100 = 张开）
    pub fn move_gripper(&self, ratio: u32, sync: bool) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::MoveGripper { ratio, sync })
    }

    pub fn servo_on(&self) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::ServoOn)
    }

    pub fn servo_off(&self) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::ServoOff)
    }

    /// 按速度上限的百分比（1..=100）设置各关节轨迹速度
    pub fn set_velocity_scale(&self, ratio: u32) -> Result<(), DriverError> {
        self.dispatch(ArmCommand::SetVelocityScale { ratio })
    }

    // === 暂停/停止 ===

    /// 运动前置条件：伺服使能且无报警
    fn check_ready(&self, op: &str) -> Result<(), DriverError> {
        let Some(snapshot) = self.snapshot() else {
            error!("{}: servo is off", op);
            return Err(DriverError::NotServoOn);
        };
        if !snapshot.is_servo_on() {
            error!("{}: servo is off", op);
            return Err(DriverError::NotServoOn);
        }
        if snapshot.has_alarm() {
            let bits = snapshot.fault_bits | snapshot.gripper_fault_bits;
            error!("{}: alarm active (0x{:02X})", op, bits);
            return Err(DriverError::AlarmActive { bits });
        }
        Ok(())
    }

    /// 暂停关节运动
    ///
    /// 已暂停时为空操作（成功）。
    pub fn pause(&self) -> Result<(), DriverError> {
        if self.shared.gate.state() != GateState::Normal {
            return Ok(());
        }
        self.check_ready("pause")?;
        if self.shared.gate.pause() {
            info!("paused");
        }
        Ok(())
    }

    /// 恢复关节运动
    pub fn resume(&self) -> Result<(), DriverError> {
        self.shared.gate.resume()?;
        info!("resumed");
        Ok(())
    }

    /// 清除暂停
    ///
    /// 不会中断已发出的运动，也不会进入独立的停止态。
    pub fn stop(&self) -> Result<(), DriverError> {
        self.check_ready("stop")?;
        self.shared.gate.stop();
        info!("stop: pause cleared");
        Ok(())
    }

    pub fn gate_state(&self) -> GateState {
        self.shared.gate.state()
    }

    // === 回零位置 ===

    pub fn set_home(&self, goal: [f64; JOINT_COUNT]) -> Result<(), DriverError> {
        if let Some(bad) = goal.iter().find(|v| !v.is_finite()) {
            error!("set home: invalid value {}", bad);
            return Err(DriverError::InvalidInput(format!("home position contains {bad}")));
        }
        *self.shared.home.write() = goal;
        info!("home position set: {:?}", goal);
        Ok(())
    }

    pub fn home_position(&self) -> [f64; JOINT_COUNT] {
        *self.shared.home.read()
    }

    // === 查询（链路未打开时为 None） ===

    /// 最新遥测快照
    pub fn snapshot(&self) -> Option<Arc<ArmSnapshot>> {
        if self.is_open() {
            Some(self.shared.context.load())
        } else {
            None
        }
    }

    /// 关节角度（°）
    pub fn positions(&self) -> Option<[f64; JOINT_COUNT]> {
        self.snapshot().map(|s| s.joint_positions_deg)
    }

    /// 关节速度（rpm）
    pub fn velocities(&self) -> Option<[f64; JOINT_COUNT]> {
        self.snapshot().map(|s| s.velocities_rpm)
    }

    /// 关节电流（mA）
    pub fn currents(&self) -> Option<[f64; JOINT_COUNT]> {
        self.snapshot().map(|s| s.currents_ma)
    }

    /// 关节温度（°C）
    pub fn temperatures(&self) -> Option<[f64; JOINT_COUNT]> {
        self.snapshot().map(|s| s.temperatures_c)
    }

    pub fn is_moving(&self) -> Option<bool> {
        self.snapshot().map(|s| s.moving)
    }

    /// 各关节硬件错误状态的按位或
    pub fn fault_bits(&self) -> Option<u32> {
        self.snapshot().map(|s| s.fault_bits)
    }

    /// 夹爪角度（°）
    pub fn gripper_position(&self) -> Option<f64> {
        self.snapshot().map(|s| s.gripper_position_deg)
    }

    /// 状态字
    pub fn status(&self) -> ArmStatus {
        let mut status = self
            .snapshot()
            .map(|s| s.status())
            .unwrap_or_else(ArmStatus::empty);
        status.set(ArmStatus::PAUSED, self.shared.gate.state().is_paused());
        status
    }

    /// 关节软限位
    pub fn soft_limits(&self) -> Option<[JointLimit; JOINT_COUNT]> {
        let session = self.session.read();
        let arm = &session.as_ref()?.actuators().arm;
        let mut limits = [JointLimit {
            min_deg: 0.0,
            max_deg: 0.0,
        }; JOINT_COUNT];
        for (limit, proxy) in limits.iter_mut().zip(arm.iter()) {
            *limit = JointLimit::of(proxy);
        }
        Some(limits)
    }

    /// 夹爪软限位
    pub fn gripper_limits(&self) -> Option<JointLimit> {
        let session = self.session.read();
        Some(JointLimit::of(&session.as_ref()?.actuators().gripper))
    }

    /// 夹爪张开/闭合目标（°）
    pub fn gripper_targets(&self) -> Option<(f64, f64)> {
        let session = self.session.read();
        let dispatcher = session.as_ref()?.dispatcher();
        Some((dispatcher.gripper_open_deg(), dispatcher.gripper_close_deg()))
    }

    /// 各关节速度上限寄存器值（打开时读取）
    pub fn velocity_limits(&self) -> Option<[u32; JOINT_COUNT]> {
        let session = self.session.read();
        let arm = &session.as_ref()?.actuators().arm;
        let mut limits = [0u32; JOINT_COUNT];
        for (limit, proxy) in limits.iter_mut().zip(arm.iter()) {
            *limit = proxy.velocity_limit_tick();
        }
        Some(limits)
    }

    /// 关节名称
    pub fn joint_names(&self) -> [&'static str; JOINT_COUNT] {
        ARM_JOINT_NAMES
    }

    pub fn manip_info(&self) -> ManipInfo {
        ManipInfo {
            manufacturer: "RT CORPORATION",
            model: "Crane-X7",
            axis_count: JOINT_COUNT,
            command_cycle_ms: 1,
            has_gripper: true,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.context.metrics.snapshot()
    }

    pub fn telemetry_state(&self) -> TelemetryState {
        self.shared.telemetry_state.get()
    }
}

impl Drop for Crane {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
