//! 暂停/停止闸门
//!
//! 进程内唯一的三态标志，命令分发器在接纳 `move_joints` 前查询它。
//!
//! # 状态转换
//!
//! - `pause()`：Normal → Paused；已处于非 Normal 状态时为空操作（仍视为成功）
//! - `resume()`：Paused → Normal；其他状态下返回 `InvalidTransition`
//! - `stop()`：任意 → Normal
//!
//! 注意 `stop()` 只是清除暂停标志，并不会进入一个独立的停止态；
//! `Stopped` 保留在枚举中以兼容状态查询，现有转换不会到达它。

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, warn};

use crate::error::DriverError;

/// 闸门状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum GateState {
    /// 正常（默认）
    #[default]
    Normal = 0,
    /// 已暂停，拒绝关节运动
    Paused = 1,
    /// 已停止
    Stopped = 2,
}

impl GateState {
    /// 从 u8 转换，无效值视为 Normal
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Paused,
            2 => Self::Stopped,
            _ => Self::Normal,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }

    pub fn is_paused(self) -> bool {
        self == Self::Paused
    }
}

/// 闸门（原子版本，线程间共享）
#[derive(Debug, Default)]
pub struct ControlGate {
    inner: AtomicU8,
}

impl ControlGate {
    pub fn new(state: GateState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn state(&self) -> GateState {
        GateState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Normal → Paused
    ///
    /// 返回是否真的发生了转换；已暂停（或已停止）时返回 false，不视为错误。
    pub fn pause(&self) -> bool {
        let changed = self
            .inner
            .compare_exchange(
                GateState::Normal.as_u8(),
                GateState::Paused.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if changed {
            debug!("Gate: Normal -> Paused");
        } else {
            debug!("Gate: pause ignored in state {:?}", self.state());
        }
        changed
    }

    /// Paused → Normal
    pub fn resume(&self) -> Result<(), DriverError> {
        match self.inner.compare_exchange(
            GateState::Paused.as_u8(),
            GateState::Normal.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!("Gate: Paused -> Normal");
                Ok(())
            },
            Err(actual) => {
                let from = GateState::from_u8(actual);
                warn!("Gate: resume rejected in state {:?}", from);
                Err(DriverError::InvalidTransition {
                    from: from.name(),
                    to: GateState::Normal.name(),
                })
            },
        }
    }

    /// 任意 → Normal（清除暂停）
    pub fn stop(&self) {
        let previous = GateState::from_u8(
            self.inner.swap(GateState::Normal.as_u8(), Ordering::AcqRel),
        );
        debug!("Gate: {:?} -> Normal (stop)", previous);
    }

    /// 是否接纳关节运动
    pub fn admits_motion(&self) -> bool {
        !self.state().is_paused()
    }
}
