//! 驱动配置
//!
//! 所有字段都有默认值，TOML 中只需写出要覆盖的部分：
//!
//! ```toml
//! device = "/dev/ttyUSB1"
//!
//! [motion]
//! poll_interval_ms = 0   # 忙轮询
//!
//! [budgets]
//! joints = 40
//! ```

use std::path::Path;
use std::time::Duration;

use crane_protocol::{
    DEFAULT_BAUD_RATE, DEFAULT_DEVICE, GRIPPER_MARGIN_DEG, JOINT_COUNT, MOVE_THRESHOLD_DEG,
};
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::wait::WaitPolicy;

/// 命令分发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// 在调用线程上直接执行
    #[default]
    Direct,
    /// 投递到命令工作线程执行
    Queued,
}

/// 遥测配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 采样周期（毫秒）
    pub period_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { period_ms: 10 }
    }
}

impl TelemetryConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// 运动与到位判定配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// 到位阈值（°）
    pub threshold_deg: f64,
    /// 到位轮询间隔（毫秒），0 表示忙轮询
    pub poll_interval_ms: u64,
    /// 夹爪开/合目标距软限位的余量（°）
    pub gripper_margin_deg: i32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold_deg: MOVE_THRESHOLD_DEG,
            poll_interval_ms: 10,
            gripper_margin_deg: GRIPPER_MARGIN_DEG,
        }
    }
}

impl MotionConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            threshold_deg: self.threshold_deg,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// 各操作的到位等待预算（轮询次数）
///
/// 按各动作的典型行程分别标定，不要合并为一个常量。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitBudgets {
    pub joints: u32,
    pub home: u32,
    pub gripper_open: u32,
    pub gripper_close: u32,
    pub gripper_move: u32,
}

impl Default for WaitBudgets {
    fn default() -> Self {
        Self {
            joints: 20,
            home: 100,
            gripper_open: 150,
            gripper_close: 100,
            gripper_move: 150,
        }
    }
}

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraneConfig {
    /// 串口设备
    pub device: String,
    /// 波特率
    pub baud_rate: u32,
    pub telemetry: TelemetryConfig,
    pub motion: MotionConfig,
    pub budgets: WaitBudgets,
    pub dispatch: DispatchMode,
    /// 回零位置（°）
    pub home: [f64; JOINT_COUNT],
}

impl Default for CraneConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            telemetry: TelemetryConfig::default(),
            motion: MotionConfig::default(),
            budgets: WaitBudgets::default(),
            dispatch: DispatchMode::default(),
            home: [0.0; JOINT_COUNT],
        }
    }
}

impl CraneConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DriverError::Config(format!("parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string(self).map_err(|e| DriverError::Config(format!("serialize: {e}")))
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.device.is_empty() {
            return Err(DriverError::Config("device must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(DriverError::Config("baud_rate must be positive".into()));
        }
        if self.telemetry.period_ms == 0 {
            return Err(DriverError::Config("telemetry.period_ms must be positive".into()));
        }
        if !(self.motion.threshold_deg.is_finite() && self.motion.threshold_deg > 0.0) {
            return Err(DriverError::Config(format!(
                "motion.threshold_deg must be a positive number, got {}",
                self.motion.threshold_deg
            )));
        }
        if self.motion.gripper_margin_deg < 0 {
            return Err(DriverError::Config(
                "motion.gripper_margin_deg must not be negative".into(),
            ));
        }
        if let Some(bad) = self.home.iter().find(|v| !v.is_finite()) {
            return Err(DriverError::Config(format!("home contains {bad}")));
        }
        Ok(())
    }
}
