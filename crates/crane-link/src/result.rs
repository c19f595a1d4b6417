//! 事务状态定义
//!
//! 与 Dynamixel SDK 的 `COMM_*` 返回码及状态包错误字节保持一致。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 通信结果码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum CommResult {
    Success = 0,
    PortBusy = -1000,
    TxFail = -1001,
    RxFail = -1002,
    TxError = -2000,
    RxWaiting = -3000,
    RxTimeout = -3001,
    RxCorrupt = -3002,
    NotAvailable = -9000,
}

impl CommResult {
    /// 从原始返回码转换，未知码视为 `NotAvailable`
    pub fn from_code(code: i32) -> Self {
        Self::try_from(code).unwrap_or(Self::NotAvailable)
    }

    pub fn code(self) -> i32 {
        self.into()
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// 总线噪声导致的失败，下一次事务通常会恢复
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::PortBusy | Self::RxFail | Self::RxWaiting | Self::RxTimeout | Self::RxCorrupt
        )
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "[TxRxResult] Communication success!",
            Self::PortBusy => "[TxRxResult] Port is in use!",
            Self::TxFail => "[TxRxResult] Failed transmit instruction packet!",
            Self::RxFail => "[TxRxResult] Failed get status packet from device!",
            Self::TxError => "[TxRxResult] Incorrect instruction packet!",
            Self::RxWaiting => "[TxRxResult] Now receiving status packet!",
            Self::RxTimeout => "[TxRxResult] There is no status packet!",
            Self::RxCorrupt => "[TxRxResult] Incorrect status packet!",
            Self::NotAvailable => "[TxRxResult] Protocol does not support this function!",
        }
    }
}

impl std::fmt::Display for CommResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// 状态包错误编号（错误字节 Bit 0-6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketErrorKind {
    ResultFail = 1,
    Instruction = 2,
    Crc = 3,
    DataRange = 4,
    DataLength = 5,
    DataLimit = 6,
    Access = 7,
}

impl PacketErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            Self::ResultFail => "[RxPacketError] Failed to process the instruction packet!",
            Self::Instruction => "[RxPacketError] Undefined instruction or incorrect instruction!",
            Self::Crc => "[RxPacketError] CRC doesn't match!",
            Self::DataRange => "[RxPacketError] The data value is out of range!",
            Self::DataLength => "[RxPacketError] The data length does not match as expected!",
            Self::DataLimit => "[RxPacketError] The data value exceeds the limit value!",
            Self::Access => "[RxPacketError] Writing or Reading is not available to target address!",
        }
    }
}

/// 状态包错误字节
///
/// - Bit 7：硬件报警（需读取 Hardware Error Status 寄存器）
/// - Bit 0-6：错误编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketError(u8);

impl PacketError {
    pub const NONE: PacketError = PacketError(0);

    /// 硬件报警位
    pub const ALERT_BIT: u8 = 0x80;

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub const fn has_hardware_alert(self) -> bool {
        self.0 & Self::ALERT_BIT != 0
    }

    /// 错误编号（无错误或编号未知时为 `None`）
    pub fn kind(self) -> Option<PacketErrorKind> {
        PacketErrorKind::try_from(self.0 & !Self::ALERT_BIT).ok()
    }
}

impl From<PacketErrorKind> for PacketError {
    fn from(kind: PacketErrorKind) -> Self {
        Self(kind.into())
    }
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_hardware_alert() {
            return f.write_str(
                "[RxPacketError] Hardware error occurred. Check the error at Control Table (Hardware Error Status)!",
            );
        }
        match self.kind() {
            Some(kind) => f.write_str(kind.message()),
            None if self.is_ok() => f.write_str("[RxPacketError] No error"),
            None => write!(f, "[RxPacketError] Unknown error code: 0x{:02X}", self.0),
        }
    }
}
