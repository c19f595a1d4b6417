//! # Crane Device Link Layer
//!
//! 总线链路抽象层：驱动层只通过 [`DeviceLink`] 访问执行器寄存器。
//!
//! 每次读写之后，调用方都要检查 [`DeviceLink::last_comm_result`] 与
//! [`DeviceLink::last_packet_error`]，这与 Dynamixel SDK 的调用约定一致：
//! 读写函数本身不返回错误，传输状态保存在链路上。

use crane_protocol::RegisterWidth;
use thiserror::Error;

pub mod result;

#[cfg(feature = "mock")]
pub mod sim;

pub use result::{CommResult, PacketError, PacketErrorKind};

#[cfg(feature = "mock")]
pub use sim::{SimulatedBus, WriteRecord};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 通信失败（发送/接收层面）
    #[error("{0}")]
    Comm(CommResult),
    /// 执行器在状态包中报告了错误
    #[error("id {id}: {error}")]
    Packet { id: u8, error: PacketError },
    /// 打开设备失败
    #[error("Failed to open {device}: {message}")]
    OpenFailed { device: String, message: String },
    /// 设置波特率失败
    #[error("Failed to change the baudrate to {baud_rate}")]
    BaudRate { baud_rate: u32 },
}

impl LinkError {
    /// 是否是总线噪声类的瞬时错误（重试可能成功）
    pub fn is_transient(&self) -> bool {
        match self {
            LinkError::Comm(result) => result.is_transient(),
            LinkError::Packet { error, .. } => !error.has_hardware_alert(),
            _ => false,
        }
    }
}

/// 寄存器寻址的设备链路
///
/// 对应一个已打开的串口 + 协议处理器。链路由驱动层独占（一个进程一条链路），
/// 实现者无需自行加锁，驱动层会用互斥锁保护每一次事务。
pub trait DeviceLink: Send {
    /// 打开设备并设置波特率
    fn open(&mut self, device: &str, baud_rate: u32) -> Result<(), LinkError>;

    /// 关闭设备（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 读取一个字段，返回原始值
    ///
    /// 失败时返回值无意义，需通过 `last_comm_result()` / `last_packet_error()` 判定。
    fn read_field(&mut self, id: u8, address: u16, width: RegisterWidth) -> u32;

    /// 写入一个字段
    fn write_field(&mut self, id: u8, address: u16, width: RegisterWidth, value: u32) -> bool;

    /// 最近一次事务的通信结果
    fn last_comm_result(&self) -> CommResult;

    /// 最近一次事务中执行器报告的错误字节
    fn last_packet_error(&self) -> PacketError;

    /// 最近一次事务是否完全成功
    fn last_transaction_ok(&self) -> bool {
        self.last_comm_result().is_success() && self.last_packet_error().is_ok()
    }

    /// 将最近一次事务的状态转换为 `Result`
    fn last_transaction(&self, id: u8) -> Result<(), LinkError> {
        let result = self.last_comm_result();
        if !result.is_success() {
            return Err(LinkError::Comm(result));
        }
        let error = self.last_packet_error();
        if !error.is_ok() {
            return Err(LinkError::Packet { id, error });
        }
        Ok(())
    }
}

impl<T: DeviceLink + ?Sized> DeviceLink for Box<T> {
    fn open(&mut self, device: &str, baud_rate: u32) -> Result<(), LinkError> {
        (**self).open(device, baud_rate)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read_field(&mut self, id: u8, address: u16, width: RegisterWidth) -> u32 {
        (**self).read_field(id, address, width)
    }

    fn write_field(&mut self, id: u8, address: u16, width: RegisterWidth, value: u32) -> bool {
        (**self).write_field(id, address, width, value)
    }

    fn last_comm_result(&self) -> CommResult {
        (**self).last_comm_result()
    }

    fn last_packet_error(&self) -> PacketError {
        (**self).last_packet_error()
    }
}
