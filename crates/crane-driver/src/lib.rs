//! 驱动层模块
//!
//! CRANE-X7 的并发设备状态引擎，包括：
//! - 关节代理（寄存器读写 + 结果检查 + 单位换算）
//! - 遥测循环（后台线程周期采样，ArcSwap 无锁发布快照）
//! - 命令分发（命令锁串行化写入，直接执行或经工作线程排队执行）
//! - 到位等待（轮询快照，按操作区分迭代预算）
//! - 暂停/停止闸门
//!
//! # 使用场景
//!
//! 通过 [`CraneBuilder`] 或 [`Crane::new`] 传入一条 [`DeviceLink`](crane_link::DeviceLink)，
//! `open()` 之后即可下发命令并读取遥测。

mod builder;
pub mod command;
pub mod config;
mod crane;
pub mod dispatcher;
mod error;
pub mod gate;
mod join;
pub mod joint;
pub mod metrics;
mod session;
pub mod state;
pub mod telemetry;
pub mod wait;
pub mod worker;

pub use builder::CraneBuilder;
pub use command::ArmCommand;
pub use config::{CraneConfig, DispatchMode, MotionConfig, TelemetryConfig, WaitBudgets};
pub use crane::{Crane, JointLimit, ManipInfo};
pub use dispatcher::Dispatcher;
pub use error::DriverError;
pub use gate::{ControlGate, GateState};
pub use joint::{Actuators, JointProxy, SharedLink};
pub use metrics::{CraneMetrics, MetricsSnapshot};
pub use state::{ArmContext, ArmSnapshot, ArmStatus, PositionSource};
pub use telemetry::{TelemetryHandle, TelemetrySampler, TelemetryState};
pub use wait::{MotionGoal, MotionWaiter, WaitPolicy};
pub use worker::CommandWorker;
