//! 遥测状态结构定义

use std::sync::Arc;

use arc_swap::ArcSwap;
use bitflags::bitflags;
use crane_protocol::{
    JOINT_COUNT, STATUS_ALARM, STATUS_MOVING, STATUS_PAUSED, STATUS_SERVO_ON,
};

use crate::metrics::CraneMetrics;

/// 机械臂遥测快照
///
/// 由遥测循环每个周期整体生成并原子替换，读取方拿到的永远是某一个周期的完整数据。
///
/// 更新频率：100Hz（默认周期 10ms）
/// 同步机制：ArcSwap（单写者，多读者无锁）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArmSnapshot {
    /// 遥测周期序号（0 表示尚未采样）
    pub sequence: u64,

    /// 采样时间（微秒，相对链路打开时刻）
    pub timestamp_us: u64,

    // === 关节（link1..link7） ===
    /// 关节角度（°）
    pub joint_positions_deg: [f64; JOINT_COUNT],
    /// 关节速度（rpm）
    pub velocities_rpm: [f64; JOINT_COUNT],
    /// 关节电流（mA）
    pub currents_ma: [f64; JOINT_COUNT],
    /// 关节温度（°C）
    pub temperatures_c: [f64; JOINT_COUNT],
    /// 扭矩使能状态
    pub torque_enabled: [bool; JOINT_COUNT],
    /// 当前轨迹速度寄存器值
    pub profile_velocities: [u32; JOINT_COUNT],
    /// 速度上限寄存器值（打开时读取）
    pub velocity_limits_tick: [u32; JOINT_COUNT],
    /// 任一关节在运动
    pub moving: bool,
    /// 各关节硬件错误状态的按位或
    pub fault_bits: u32,

    // === 夹爪 ===
    /// 夹爪角度（°）
    pub gripper_position_deg: f64,
    pub gripper_moving: bool,
    pub gripper_torque_enabled: bool,
    pub gripper_fault_bits: u32,
}

impl ArmSnapshot {
    /// 所有执行器（含夹爪）均已使能扭矩
    pub fn is_servo_on(&self) -> bool {
        self.torque_enabled.iter().all(|&on| on) && self.gripper_torque_enabled
    }

    /// 任一执行器存在硬件报警
    pub fn has_alarm(&self) -> bool {
        self.fault_bits != 0 || self.gripper_fault_bits != 0
    }

    /// 汇总状态字（不含暂停位，暂停位由闸门提供）
    pub fn status(&self) -> ArmStatus {
        let mut status = ArmStatus::empty();
        status.set(ArmStatus::SERVO_ON, self.is_servo_on());
        status.set(ArmStatus::MOVING, self.moving || self.gripper_moving);
        status.set(ArmStatus::ALARM, self.has_alarm());
        status
    }
}

bitflags! {
    /// 机械臂状态字
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArmStatus: u32 {
        /// 所有执行器均已使能扭矩
        const SERVO_ON = STATUS_SERVO_ON;
        /// 至少一个执行器在运动
        const MOVING = STATUS_MOVING;
        /// 存在硬件报警
        const ALARM = STATUS_ALARM;
        /// 已暂停
        const PAUSED = STATUS_PAUSED;
    }
}

/// 位置数据源
///
/// 到位判定只依赖当前角度，抽象出来便于在没有遥测线程时单独测试等待逻辑。
pub trait PositionSource: Send + Sync {
    fn joint_positions_deg(&self) -> [f64; JOINT_COUNT];
    fn gripper_position_deg(&self) -> f64;
}

/// 驱动上下文（遥测快照 + 指标）
#[derive(Debug)]
pub struct ArmContext {
    /// 最新快照
    pub snapshot: ArcSwap<ArmSnapshot>,
    /// 运行指标
    pub metrics: Arc<CraneMetrics>,
}

impl ArmContext {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(ArmSnapshot::default()),
            metrics: Arc::new(CraneMetrics::new()),
        }
    }

    /// 读取最新快照
    pub fn load(&self) -> Arc<ArmSnapshot> {
        self.snapshot.load_full()
    }

    /// 整体替换快照
    pub fn publish(&self, snapshot: ArmSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl Default for ArmContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionSource for ArmContext {
    fn joint_positions_deg(&self) -> [f64; JOINT_COUNT] {
        self.snapshot.load().joint_positions_deg
    }

    fn gripper_position_deg(&self) -> f64 {
        self.snapshot.load().gripper_position_deg
    }
}
