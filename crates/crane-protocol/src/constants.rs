//! 协议常量定义

use crate::ids::ActuatorRole;

/// 默认串口设备
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// 默认波特率（3 Mbps）
pub const DEFAULT_BAUD_RATE: u32 = 3_000_000;

/// 扭矩使能寄存器取值
pub const TORQUE_ON: u32 = 1;
/// 扭矩关闭寄存器取值
pub const TORQUE_OFF: u32 = 0;

/// 到位判定阈值（°）
pub const MOVE_THRESHOLD_DEG: f64 = 3.0;

/// 夹爪开/合目标距软限位的余量（°）
pub const GRIPPER_MARGIN_DEG: i32 = 5;

/// 速度缩放百分比下限
///
/// 轨迹速度寄存器为 0 表示"不限速"，因此不允许 0%。
pub const VELOCITY_SCALE_MIN: u32 = 1;
/// 速度缩放百分比上限
pub const VELOCITY_SCALE_MAX: u32 = 100;

/// 夹爪开度百分比上限（0 = 闭合，100 = 张开）
pub const GRIPPER_RATIO_MAX: u32 = 100;

// === 状态字位定义 ===

/// 所有执行器均已使能扭矩
pub const STATUS_SERVO_ON: u32 = 0x01;
/// 至少一个关节在运动
pub const STATUS_MOVING: u32 = 0x02;
/// 存在硬件报警
pub const STATUS_ALARM: u32 = 0x04;
/// 已暂停
pub const STATUS_PAUSED: u32 = 0x10;

/// 上电调参（位置环增益 + 轨迹参数）
///
/// `torque_on()` 时写入，属于既定策略而非推导值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoTuning {
    pub position_p_gain: u32,
    pub position_i_gain: u32,
    pub profile_acceleration: u32,
    pub profile_velocity: u32,
}

/// 关节默认调参
pub const ARM_TUNING: ServoTuning = ServoTuning {
    position_p_gain: 150,
    position_i_gain: 20,
    profile_acceleration: 50,
    profile_velocity: 200,
};

/// 夹爪默认调参
pub const GRIPPER_TUNING: ServoTuning = ServoTuning {
    position_p_gain: 200,
    position_i_gain: 20,
    profile_acceleration: 10,
    profile_velocity: 20,
};

impl ServoTuning {
    /// 按角色选择默认调参
    pub const fn for_role(role: ActuatorRole) -> Self {
        match role {
            ActuatorRole::Arm => ARM_TUNING,
            ActuatorRole::Gripper => GRIPPER_TUNING,
        }
    }
}
