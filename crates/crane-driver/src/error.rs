//! 驱动层错误类型定义

use crane_link::LinkError;
use crane_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 所有公开操作都通过 `Result` 报告失败，不会 panic。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路/事务错误（通信失败或执行器报告错误）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议层错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 目标超出执行器软限位（未发出任何写入）
    #[error(
        "Goal out of range for {joint}: {goal_deg}° -> tick {tick} (allowed {min_tick} < tick <= {max_tick})"
    )]
    OutOfRange {
        joint: &'static str,
        goal_deg: f64,
        tick: i32,
        min_tick: i32,
        max_tick: i32,
    },

    /// 链路未打开
    #[error("Link not opened")]
    NotInitialized,

    /// 链路已打开
    #[error("Link already opened")]
    AlreadyOpen,

    /// 同步等待超出迭代预算（运动指令已发出，可能稍后完成）
    #[error("Wait timeout after {iterations} polls")]
    Timeout { iterations: u32 },

    /// 已暂停，拒绝运动指令
    #[error("Motion rejected: arm is paused")]
    Paused,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 命令通道已关闭（工作线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满（缓冲区容量 10）
    #[error("Command channel full (buffer size: 10)")]
    ChannelFull,

    /// 非法的状态转换
    #[error("Invalid gate transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// 伺服未使能
    #[error("Servo is off")]
    NotServoOn,

    /// 存在硬件报警
    #[error("Alarm active (fault bits 0x{bits:02X})")]
    AlarmActive { bits: u32 },

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 后台线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 重试是否可能成功
    ///
    /// 总线噪声、等待超时、通道满属于瞬时错误；越界、未打开等需要调用方改变输入或状态。
    pub fn is_transient(&self) -> bool {
        match self {
            DriverError::Link(e) => e.is_transient(),
            DriverError::Timeout { .. } | DriverError::ChannelFull => true,
            _ => false,
        }
    }
}
