//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use crane_sdk::prelude::*;
//! ```

// 驱动入口
pub use crate::driver::{Crane, CraneBuilder, CraneConfig, DispatchMode};
// 快照与状态
pub use crate::driver::{ArmSnapshot, ArmStatus, GateState, JointLimit, ManipInfo};

// 链路层（常用 Trait）
pub use crate::link::DeviceLink;

// 协议层常量
pub use crate::protocol::{ARM_JOINT_NAMES, JOINT_COUNT};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::link::LinkError;
pub use crate::protocol::ProtocolError;
