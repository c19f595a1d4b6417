//! Crane SDK - CRANE-X7 机械臂 Rust SDK
//!
//! 7 轴 CRANE-X7（Dynamixel 协议 2.0 总线）的并发设备状态引擎：
//! 后台遥测、命令分发、运动完成等待与暂停闸门。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 控制表、执行器 ID、单位换算，无 I/O
//! - **链路层** (`link`): `DeviceLink` 抽象与事务状态；`mock` feature 提供模拟总线
//! - **驱动层** (`driver`): 遥测线程、状态快照、命令分发、运动等待、`Crane` 会话
//!
//! # 快速开始
//!
//! ```rust,ignore
//! use crane_sdk::prelude::*;
//!
//! crane_sdk::init_logging();
//! let crane = CraneBuilder::new().link(my_link).build()?;
//! crane.open()?;
//! crane.move_joints([0.0, 10.0, 0.0, -90.0, 0.0, 0.0, 0.0], true)?;
//! ```

pub use crane_driver as driver;
pub use crane_link as link;
pub use crane_protocol as protocol;

mod logging;
pub mod prelude;

// --- 用户以此为界 ---

pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with_filter};

pub use crane_driver::{
    ArmSnapshot, ArmStatus, Crane, CraneBuilder, CraneConfig, DispatchMode, DriverError,
    GateState, JointLimit, ManipInfo, MetricsSnapshot, TelemetryState,
};
pub use crane_link::{CommResult, DeviceLink, LinkError, PacketError};
pub use crane_protocol::ProtocolError;

#[cfg(feature = "mock")]
pub use crane_link::SimulatedBus;
