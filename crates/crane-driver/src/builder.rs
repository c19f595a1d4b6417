//! Builder 模式实现
//!
//! 提供链式构造 `Crane` 实例的便捷方式。

use std::path::Path;
use std::time::Duration;

use crane_link::DeviceLink;
use crane_protocol::JOINT_COUNT;

use crate::config::{CraneConfig, DispatchMode};
use crate::crane::Crane;
use crate::error::DriverError;

/// Crane Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// # fn serial_link() -> Box<dyn crane_link::DeviceLink> { unimplemented!() }
/// use crane_driver::{CraneBuilder, DispatchMode};
///
/// let crane = CraneBuilder::new()
///     .boxed_link(serial_link())
///     .device("/dev/ttyUSB1")
///     .dispatch(DispatchMode::Queued)
///     .build()
///     .unwrap();
/// crane.open().unwrap();
/// ```
pub struct CraneBuilder {
    link: Option<Box<dyn DeviceLink>>,
    config: CraneConfig,
}

impl CraneBuilder {
    pub fn new() -> Self {
        Self {
            link: None,
            config: CraneConfig::default(),
        }
    }

    /// 设备链路
    pub fn link<L: DeviceLink + 'static>(self, link: L) -> Self {
        self.boxed_link(Box::new(link))
    }

    pub fn boxed_link(mut self, link: Box<dyn DeviceLink>) -> Self {
        self.link = Some(link);
        self
    }

    /// 替换整份配置（之后的单项设置会覆盖它）
    pub fn config(mut self, config: CraneConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 TOML 文件加载配置
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, DriverError> {
        self.config = CraneConfig::load(path)?;
        Ok(self)
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = device.into();
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.config.dispatch = mode;
        self
    }

    /// 遥测周期（按毫秒截断）
    pub fn telemetry_period(mut self, period: Duration) -> Self {
        self.config.telemetry.period_ms = period.as_millis() as u64;
        self
    }

    /// 到位轮询间隔（0 表示忙轮询）
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.motion.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn home(mut self, home: [f64; JOINT_COUNT]) -> Self {
        self.config.home = home;
        self
    }

    /// 构建驱动（不打开链路）
    pub fn build(self) -> Result<Crane, DriverError> {
        let link = self
            .link
            .ok_or_else(|| DriverError::InvalidInput("no device link configured".into()))?;
        self.config.validate()?;
        Ok(Crane::new(link, self.config))
    }
}

impl Default for CraneBuilder {
    fn default() -> Self {
        Self::new()
    }
}
