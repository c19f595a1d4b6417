//! # Crane Protocol
//!
//! CRANE-X7 机械臂总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `control_table`: Dynamixel X/MX-430/540 控制表（寄存器地址 + 字节宽度）
//! - `ids`: 总线上各执行器的 ID 与名称
//! - `units`: tick ↔ 角度等单位换算
//! - `constants`: 调参默认值、状态字位定义等协议常量
//!
//! ## 字节序
//!
//! Dynamixel Protocol 2.0 使用小端字节序，但字段的打包/解包由 Device Link 负责，
//! 本 crate 只处理寄存器层面的数值（`u32` 原始值）。

pub mod constants;
pub mod control_table;
pub mod ids;
pub mod units;

// 重新导出常用类型
pub use constants::*;
pub use control_table::*;
pub use ids::*;
pub use units::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 寄存器宽度不是 1/2/4 字节
    #[error("Invalid register width: {width} (expected 1, 2 or 4)")]
    InvalidWidth { width: u8 },

    /// 未知的执行器 ID
    #[error("Unknown actuator id: {id}")]
    UnknownActuator { id: u8 },

    /// 百分比参数越界
    #[error("Ratio out of range: {ratio} (expected {min}..={max})")]
    RatioOutOfRange { ratio: u32, min: u32, max: u32 },
}
