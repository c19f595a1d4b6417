//! 单位换算
//!
//! 位置寄存器使用 tick（一圈 4096 tick），对外一律以角度表示，中点 2048 tick 对应 0°。
//!
//! **注意**：两个方向的换算都是向零截断（整数转换），不是四舍五入。
//! 因此往返换算不是精确的：整数角度的误差不超过 1°，任意实数角度的误差不超过 1° + 1 tick。

/// 一圈对应的 tick 数
pub const TICKS_PER_REVOLUTION: u32 = 4096;

/// 每个 tick 对应的角度（°）
pub const DEG_PER_TICK: f64 = 360.0 / TICKS_PER_REVOLUTION as f64;

/// 零点偏移（°）：tick 0 对应 -180°
pub const ZERO_OFFSET_DEG: f64 = 180.0;

/// 速度寄存器单位（rpm / LSB）
pub const RPM_PER_UNIT: f64 = 0.229;

/// 电流寄存器单位（mA / LSB）
pub const MILLIAMPS_PER_UNIT: f64 = 2.69;

/// 角度 → tick
///
/// `tick = trunc((deg + 180) / (360 / 4096))`
#[inline]
pub fn deg_to_tick(deg: f64) -> i32 {
    ((deg + ZERO_OFFSET_DEG) / DEG_PER_TICK) as i32
}

/// tick → 角度（整数度）
///
/// `deg = trunc(tick * 360 / 4096 - 180)`
#[inline]
pub fn tick_to_deg(tick: i32) -> i32 {
    ((tick as f64 * 360.0 / TICKS_PER_REVOLUTION as f64) - ZERO_OFFSET_DEG) as i32
}

/// 速度原始值（已符号扩展）→ rpm
#[inline]
pub fn velocity_to_rpm(raw: i32) -> f64 {
    raw as f64 * RPM_PER_UNIT
}

/// 电流原始值（已符号扩展）→ mA
#[inline]
pub fn current_to_milliamps(raw: i32) -> f64 {
    raw as f64 * MILLIAMPS_PER_UNIT
}
