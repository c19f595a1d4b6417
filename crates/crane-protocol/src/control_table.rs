//! Dynamixel 控制表定义
//!
//! 地址与宽度由执行器固件固定（X/MX-430/540，Protocol 2.0），
//! 运行期间不会变化，必须与固件完全一致。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 寄存器字节宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RegisterWidth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl RegisterWidth {
    /// 字节数
    pub const fn bytes(self) -> u8 {
        self as u8
    }

    /// 该宽度下的最大原始值
    pub const fn max_value(self) -> u32 {
        match self {
            RegisterWidth::One => u8::MAX as u32,
            RegisterWidth::Two => u16::MAX as u32,
            RegisterWidth::Four => u32::MAX,
        }
    }

    /// 截断到该宽度（写入前使用）
    pub const fn truncate(self, value: u32) -> u32 {
        value & self.max_value()
    }

    /// 按该宽度做符号扩展
    ///
    /// 速度（4 字节）、电流（2 字节）等寄存器是有符号的补码，
    /// 但 Device Link 统一以 `u32` 返回原始值。
    pub const fn sign_extend(self, raw: u32) -> i32 {
        match self {
            RegisterWidth::One => raw as u8 as i8 as i32,
            RegisterWidth::Two => raw as u16 as i16 as i32,
            RegisterWidth::Four => raw as i32,
        }
    }

    /// 从字节数解析（非 1/2/4 时报错）
    pub fn from_bytes(width: u8) -> Result<Self, ProtocolError> {
        Self::try_from(width).map_err(|_| ProtocolError::InvalidWidth { width })
    }
}

/// 单个可寻址物理量的描述
///
/// 纯数据，没有行为。每个执行器型号、每个物理量一个。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterField {
    /// 控制表地址
    pub address: u16,
    /// 字节宽度
    pub width: RegisterWidth,
    /// 字段名（用于日志）
    pub name: &'static str,
}

impl RegisterField {
    pub const fn new(name: &'static str, address: u16, width: RegisterWidth) -> Self {
        Self {
            address,
            width,
            name,
        }
    }
}

impl std::fmt::Display for RegisterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}/{}", self.name, self.address, self.width.bytes())
    }
}

// === EEPROM 区（扭矩使能时只读） ===

/// 速度上限（单位 0.229 rpm）
pub const VELOCITY_LIMIT: RegisterField =
    RegisterField::new("velocity_limit", 44, RegisterWidth::Four);
/// 位置上限（tick）
pub const MAX_POSITION_LIMIT: RegisterField =
    RegisterField::new("max_position_limit", 48, RegisterWidth::Four);
/// 位置下限（tick）
pub const MIN_POSITION_LIMIT: RegisterField =
    RegisterField::new("min_position_limit", 52, RegisterWidth::Four);

// === RAM 区 ===

/// 扭矩使能（0/1）
pub const TORQUE_ENABLE: RegisterField =
    RegisterField::new("torque_enable", 64, RegisterWidth::One);
/// 硬件错误状态位
pub const HARDWARE_ERROR_STATUS: RegisterField =
    RegisterField::new("hardware_error_status", 70, RegisterWidth::One);
/// 位置环 I 增益
pub const POSITION_I_GAIN: RegisterField =
    RegisterField::new("position_i_gain", 82, RegisterWidth::Two);
/// 位置环 P 增益
pub const POSITION_P_GAIN: RegisterField =
    RegisterField::new("position_p_gain", 84, RegisterWidth::Two);
/// 轨迹加速度（单位 214.577 rev/min²）
pub const PROFILE_ACCELERATION: RegisterField =
    RegisterField::new("profile_acceleration", 108, RegisterWidth::Four);
/// 轨迹速度（单位 0.229 rpm）
pub const PROFILE_VELOCITY: RegisterField =
    RegisterField::new("profile_velocity", 112, RegisterWidth::Four);
/// 目标位置（tick）
pub const GOAL_POSITION: RegisterField =
    RegisterField::new("goal_position", 116, RegisterWidth::Four);
/// 运动中标志
pub const MOVING: RegisterField = RegisterField::new("moving", 122, RegisterWidth::One);
/// 当前电流（有符号，单位 2.69 mA）
pub const PRESENT_CURRENT: RegisterField =
    RegisterField::new("present_current", 126, RegisterWidth::Two);
/// 当前速度（有符号，单位 0.229 rpm）
pub const PRESENT_VELOCITY: RegisterField =
    RegisterField::new("present_velocity", 128, RegisterWidth::Four);
/// 当前位置（tick）
pub const PRESENT_POSITION: RegisterField =
    RegisterField::new("present_position", 132, RegisterWidth::Four);
/// 当前温度（°C）
pub const PRESENT_TEMPERATURE: RegisterField =
    RegisterField::new("present_temperature", 146, RegisterWidth::One);

/// 本库使用到的全部字段
pub const ALL_FIELDS: [RegisterField; 15] = [
    VELOCITY_LIMIT,
    MAX_POSITION_LIMIT,
    MIN_POSITION_LIMIT,
    TORQUE_ENABLE,
    HARDWARE_ERROR_STATUS,
    POSITION_I_GAIN,
    POSITION_P_GAIN,
    PROFILE_ACCELERATION,
    PROFILE_VELOCITY,
    GOAL_POSITION,
    MOVING,
    PRESENT_CURRENT,
    PRESENT_VELOCITY,
    PRESENT_POSITION,
    PRESENT_TEMPERATURE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_from_bytes() {
        assert_eq!(RegisterWidth::from_bytes(1).unwrap(), RegisterWidth::One);
        assert_eq!(RegisterWidth::from_bytes(2).unwrap(), RegisterWidth::Two);
        assert_eq!(RegisterWidth::from_bytes(4).unwrap(), RegisterWidth::Four);
        assert_eq!(
            RegisterWidth::from_bytes(3),
            Err(ProtocolError::InvalidWidth { width: 3 })
        );
        assert!(RegisterWidth::from_bytes(0).is_err());
        assert!(RegisterWidth::from_bytes(8).is_err());
    }

    #[test]
    fn test_sign_extend() {
        // 电流：2 字节补码
        assert_eq!(RegisterWidth::Two.sign_extend(0xFFFF), -1);
        assert_eq!(RegisterWidth::Two.sign_extend(0x8000), -32768);
        assert_eq!(RegisterWidth::Two.sign_extend(100), 100);
        // 速度：4 字节补码
        assert_eq!(RegisterWidth::Four.sign_extend(0xFFFF_FFF6), -10);
        assert_eq!(RegisterWidth::One.sign_extend(0x80), -128);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(RegisterWidth::One.truncate(0x1FF), 0xFF);
        assert_eq!(RegisterWidth::Two.truncate(0x1_0001), 1);
        assert_eq!(RegisterWidth::Four.truncate(u32::MAX), u32::MAX);
    }

    /// 地址来自固件控制表，任何改动都会导致与执行器通信错位
    #[test]
    fn test_control_table_addresses() {
        assert_eq!(
            (VELOCITY_LIMIT.address, VELOCITY_LIMIT.width.bytes()),
            (44, 4)
        );
        assert_eq!(MAX_POSITION_LIMIT.address, 48);
        assert_eq!(MIN_POSITION_LIMIT.address, 52);
        assert_eq!((TORQUE_ENABLE.address, TORQUE_ENABLE.width.bytes()), (64, 1));
        assert_eq!(HARDWARE_ERROR_STATUS.address, 70);
        assert_eq!((POSITION_I_GAIN.address, POSITION_I_GAIN.width.bytes()), (82, 2));
        assert_eq!((POSITION_P_GAIN.address, POSITION_P_GAIN.width.bytes()), (84, 2));
        assert_eq!(PROFILE_ACCELERATION.address, 108);
        assert_eq!(PROFILE_VELOCITY.address, 112);
        assert_eq!(GOAL_POSITION.address, 116);
        assert_eq!((MOVING.address, MOVING.width.bytes()), (122, 1));
        assert_eq!((PRESENT_CURRENT.address, PRESENT_CURRENT.width.bytes()), (126, 2));
        assert_eq!(PRESENT_VELOCITY.address, 128);
        assert_eq!(PRESENT_POSITION.address, 132);
        assert_eq!(PRESENT_TEMPERATURE.address, 146);
    }

    #[test]
    fn test_fields_do_not_overlap() {
        let mut ranges: Vec<(u16, u16)> = ALL_FIELDS
            .iter()
            .map(|f| (f.address, f.address + f.width.bytes() as u16))
            .collect();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_field_display() {
        assert_eq!(format!("{}", GOAL_POSITION), "goal_position@116/4");
    }
}
