//! 执行器 ID 定义
//!
//! CRANE-X7 的 7 个关节与夹爪共享同一条总线，ID 由出厂设置固定。

use crate::ProtocolError;

/// 机械臂关节数
pub const JOINT_COUNT: usize = 7;

/// 关节 1-7 的总线 ID
pub const ARM_JOINT_IDS: [u8; JOINT_COUNT] = [2, 3, 4, 5, 6, 7, 8];

/// 关节名称（与 ID 一一对应）
pub const ARM_JOINT_NAMES: [&str; JOINT_COUNT] =
    ["link1", "link2", "link3", "link4", "link5", "link6", "link7"];

/// 夹爪总线 ID
pub const GRIPPER_ID: u8 = 9;

/// 夹爪名称
pub const GRIPPER_NAME: &str = "hand";

/// 执行器角色
///
/// 决定上电时写入哪一组调参默认值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActuatorRole {
    /// 机械臂关节
    Arm,
    /// 夹爪
    Gripper,
}

/// 执行器描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorSpec {
    pub id: u8,
    pub name: &'static str,
    pub role: ActuatorRole,
}

/// 总线上全部执行器（7 个关节 + 夹爪）
pub const ACTUATORS: [ActuatorSpec; JOINT_COUNT + 1] = [
    ActuatorSpec { id: 2, name: "link1", role: ActuatorRole::Arm },
    ActuatorSpec { id: 3, name: "link2", role: ActuatorRole::Arm },
    ActuatorSpec { id: 4, name: "link3", role: ActuatorRole::Arm },
    ActuatorSpec { id: 5, name: "link4", role: ActuatorRole::Arm },
    ActuatorSpec { id: 6, name: "link5", role: ActuatorRole::Arm },
    ActuatorSpec { id: 7, name: "link6", role: ActuatorRole::Arm },
    ActuatorSpec { id: 8, name: "link7", role: ActuatorRole::Arm },
    ActuatorSpec { id: GRIPPER_ID, name: GRIPPER_NAME, role: ActuatorRole::Gripper },
];

/// 按 ID 查找执行器
pub fn actuator(id: u8) -> Result<ActuatorSpec, ProtocolError> {
    ACTUATORS
        .iter()
        .find(|a| a.id == id)
        .copied()
        .ok_or(ProtocolError::UnknownActuator { id })
}
