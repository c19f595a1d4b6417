//! 命令类型定义
//!
//! 所有会改变执行器状态的操作都表示为 [`ArmCommand`]，直接执行和经工作线程排队执行
//! 走同一条分发路径。

use crane_protocol::JOINT_COUNT;

/// 机械臂命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    /// 回到配置的零位
    Home { sync: bool },
    /// 关节空间单点运动（°）
    MoveJoints { goal: [f64; JOINT_COUNT], sync: bool },
    /// 张开夹爪
    OpenGripper { sync: bool },
    /// 闭合夹爪
    CloseGripper { sync: bool },
    /// 夹爪移动到开度百分比（0 = 闭合，100 = 张开）
    MoveGripper { ratio: u32, sync: bool },
    /// 使能全部执行器扭矩（不改动增益）
    ServoOn,
    /// 关闭全部执行器扭矩
    ServoOff,
    /// 按速度上限的百分比设置各关节轨迹速度
    SetVelocityScale { ratio: u32 },
}

impl ArmCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ArmCommand::Home { .. } => "home",
            ArmCommand::MoveJoints { .. } => "move_joints",
            ArmCommand::OpenGripper { .. } => "open_gripper",
            ArmCommand::CloseGripper { .. } => "close_gripper",
            ArmCommand::MoveGripper { .. } => "move_gripper",
            ArmCommand::ServoOn => "servo_on",
            ArmCommand::ServoOff => "servo_off",
            ArmCommand::SetVelocityScale { .. } => "set_velocity_scale",
        }
    }

    /// 是否受暂停闸门约束
    ///
    /// 只有关节运动受约束；回零与夹爪动作不受暂停影响。
    pub fn is_gated(&self) -> bool {
        matches!(self, ArmCommand::MoveJoints { .. })
    }

    /// 排队执行时调用方是否等待执行结果
    ///
    /// 运动命令按 `sync` 决定；伺服与速度设置没有异步形式，总是等待。
    pub fn waits_for_completion(&self) -> bool {
        match self {
            ArmCommand::Home { sync }
            | ArmCommand::MoveJoints { sync, .. }
            | ArmCommand::OpenGripper { sync }
            | ArmCommand::CloseGripper { sync }
            | ArmCommand::MoveGripper { sync, .. } => *sync,
            ArmCommand::ServoOn | ArmCommand::ServoOff | ArmCommand::SetVelocityScale { .. } => {
                true
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_move_joints_is_gated() {
        assert!(
            ArmCommand::MoveJoints {
                goal: [0.0; JOINT_COUNT],
                sync: false
            }
            .is_gated()
        );
        for cmd in [
            ArmCommand::Home { sync: true },
            ArmCommand::OpenGripper { sync: false },
            ArmCommand::CloseGripper { sync: false },
            ArmCommand::MoveGripper { ratio: 50, sync: false },
            ArmCommand::ServoOn,
            ArmCommand::ServoOff,
            ArmCommand::SetVelocityScale { ratio: 50 },
        ] {
            assert!(!cmd.is_gated(), "{} should not be gated", cmd.name());
        }
    }

    #[test]
    fn test_waits_for_completion() {
        assert!(ArmCommand::Home { sync: true }.waits_for_completion());
        assert!(!ArmCommand::OpenGripper { sync: false }.waits_for_completion());
        assert!(ArmCommand::ServoOff.waits_for_completion());
        assert!(ArmCommand::SetVelocityScale { ratio: 10 }.waits_for_completion());
    }

    #[test]
    fn test_names() {
        assert_eq!(ArmCommand::ServoOn.name(), "servo_on");
        assert_eq!(ArmCommand::MoveGripper { ratio: 0, sync: true }.name(), "move_gripper");
    }
}
