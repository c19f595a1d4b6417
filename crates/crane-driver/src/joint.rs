//! 关节代理
//!
//! 每个执行器一个 [`JointProxy`]，封装寄存器读写、结果检查与单位换算。
//!
//! 每次读写都独占一次链路锁（一个事务一个临界区），事务结束后立即检查链路上记录的
//! 通信结果与执行器错误字节。失败会记录日志并以 `Err` 返回，但不会中止调用方的整组操作：
//! 总线噪声是常态。

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crane_link::DeviceLink;
use crane_protocol::{
    ACTUATORS, ActuatorRole, ActuatorSpec, GOAL_POSITION, GRIPPER_ID, HARDWARE_ERROR_STATUS,
    MAX_POSITION_LIMIT, MIN_POSITION_LIMIT, MOVING, POSITION_I_GAIN, POSITION_P_GAIN,
    PRESENT_CURRENT, PRESENT_POSITION, PRESENT_TEMPERATURE, PRESENT_VELOCITY,
    PROFILE_ACCELERATION, PROFILE_VELOCITY, RegisterField, ServoTuning, TORQUE_ENABLE, TORQUE_OFF,
    TORQUE_ON, VELOCITY_LIMIT, actuator, current_to_milliamps, deg_to_tick, tick_to_deg,
    velocity_to_rpm,
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::DriverError;
use crate::metrics::CraneMetrics;

/// 驱动层共享的链路句柄
///
/// 锁只在单次事务期间持有。
pub type SharedLink = Arc<Mutex<Box<dyn DeviceLink>>>;

/// 单个执行器的代理
pub struct JointProxy {
    spec: ActuatorSpec,
    link: SharedLink,
    metrics: Arc<CraneMetrics>,
    // 创建时读取一次，生命周期内不变
    min_tick: i32,
    max_tick: i32,
    velocity_limit_tick: u32,
}

impl JointProxy {
    /// 创建代理并读取软限位与速度上限
    pub fn new(
        spec: ActuatorSpec,
        link: SharedLink,
        metrics: Arc<CraneMetrics>,
    ) -> Result<Self, DriverError> {
        let mut proxy = Self {
            spec,
            link,
            metrics,
            min_tick: 0,
            max_tick: 0,
            velocity_limit_tick: 0,
        };
        proxy.min_tick = proxy.read(MIN_POSITION_LIMIT)? as i32;
        proxy.max_tick = proxy.read(MAX_POSITION_LIMIT)? as i32;
        proxy.velocity_limit_tick = proxy.read(VELOCITY_LIMIT)?;
        debug!(
            "joint[{}] id={} limits ({}, {}] velocity limit {}",
            proxy.spec.name, proxy.spec.id, proxy.min_tick, proxy.max_tick, proxy.velocity_limit_tick
        );
        Ok(proxy)
    }

    pub fn id(&self) -> u8 {
        self.spec.id
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn role(&self) -> ActuatorRole {
        self.spec.role
    }

    pub fn min_tick(&self) -> i32 {
        self.min_tick
    }

    pub fn max_tick(&self) -> i32 {
        self.max_tick
    }

    pub fn velocity_limit_tick(&self) -> u32 {
        self.velocity_limit_tick
    }

    /// 软限位下界（°）
    pub fn min_deg(&self) -> i32 {
        tick_to_deg(self.min_tick)
    }

    /// 软限位上界（°）
    pub fn max_deg(&self) -> i32 {
        tick_to_deg(self.max_tick)
    }

    // === 原始读写 ===

    /// 读取一个字段
    pub fn read(&self, field: RegisterField) -> Result<u32, DriverError> {
        let mut link = self.link.lock();
        let value = link.read_field(self.spec.id, field.address, field.width);
        let result = link.last_transaction(self.spec.id);
        drop(link);

        result.map(|()| value).map_err(|e| {
            error!("joint[{}] read {} failed: {}", self.spec.name, field, e);
            e.into()
        })
    }

    /// 写入一个字段
    pub fn write(&self, field: RegisterField, value: u32) -> Result<(), DriverError> {
        let mut link = self.link.lock();
        link.write_field(self.spec.id, field.address, field.width, value);
        let result = link.last_transaction(self.spec.id);
        drop(link);

        self.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
        result.map_err(|e| {
            self.metrics.write_failures.fetch_add(1, Ordering::Relaxed);
            error!("joint[{}] write {} <- {} failed: {}", self.spec.name, field, value, e);
            e.into()
        })
    }

    // === 扭矩 ===

    /// 使能/关闭扭矩（不改动增益）
    pub fn torque(&self, on: bool) -> Result<(), DriverError> {
        self.write(TORQUE_ENABLE, if on { TORQUE_ON } else { TORQUE_OFF })
    }

    /// 使能扭矩并写入该角色的默认调参
    ///
    /// 每一项都会尝试写入，返回遇到的第一个错误。
    pub fn torque_on(&self) -> Result<(), DriverError> {
        let tuning = ServoTuning::for_role(self.spec.role);
        let results = [
            self.torque(true),
            self.write(POSITION_P_GAIN, tuning.position_p_gain),
            self.write(POSITION_I_GAIN, tuning.position_i_gain),
            self.write(PROFILE_ACCELERATION, tuning.profile_acceleration),
            self.write(PROFILE_VELOCITY, tuning.profile_velocity),
        ];
        results.into_iter().collect()
    }

    pub fn torque_off(&self) -> Result<(), DriverError> {
        self.torque(false)
    }

    // === 运动 ===

    /// 检查目标角度是否在软限位内，返回目标 tick
    ///
    /// 允许区间为 `min_tick < tick <= max_tick`。
    pub fn check_goal(&self, goal_deg: f64) -> Result<u32, DriverError> {
        let tick = deg_to_tick(goal_deg);
        if tick > self.max_tick || tick <= self.min_tick {
            error!("joint[{}] cannot move: {}", self.spec.name, goal_deg);
            return Err(DriverError::OutOfRange {
                joint: self.spec.name,
                goal_deg,
                tick,
                min_tick: self.min_tick,
                max_tick: self.max_tick,
            });
        }
        Ok(tick as u32)
    }

    /// 移动到目标角度（越界时不发出任何写入）
    pub fn move_to(&self, goal_deg: f64) -> Result<(), DriverError> {
        let tick = self.check_goal(goal_deg)?;
        info!("joint[{}] move: {}", self.spec.name, tick);
        self.write(GOAL_POSITION, tick)
    }

    // === 遥测读取 ===

    pub fn position_tick(&self) -> Result<i32, DriverError> {
        Ok(self.read(PRESENT_POSITION)? as i32)
    }

    /// 当前角度（°，截断取整）
    pub fn position_deg(&self) -> Result<i32, DriverError> {
        Ok(tick_to_deg(self.position_tick()?))
    }

    /// 当前速度（原始值，有符号）
    pub fn velocity_raw(&self) -> Result<i32, DriverError> {
        Ok(PRESENT_VELOCITY.width.sign_extend(self.read(PRESENT_VELOCITY)?))
    }

    pub fn velocity_rpm(&self) -> Result<f64, DriverError> {
        Ok(velocity_to_rpm(self.velocity_raw()?))
    }

    /// 当前电流（原始值，有符号）
    pub fn current_raw(&self) -> Result<i32, DriverError> {
        Ok(PRESENT_CURRENT.width.sign_extend(self.read(PRESENT_CURRENT)?))
    }

    pub fn current_ma(&self) -> Result<f64, DriverError> {
        Ok(current_to_milliamps(self.current_raw()?))
    }

    /// 当前温度（°C）
    pub fn temperature_c(&self) -> Result<f64, DriverError> {
        Ok(self.read(PRESENT_TEMPERATURE)? as f64)
    }

    pub fn is_moving(&self) -> Result<bool, DriverError> {
        Ok(self.read(MOVING)? != 0)
    }

    pub fn torque_enabled(&self) -> Result<bool, DriverError> {
        Ok(self.read(TORQUE_ENABLE)? == TORQUE_ON)
    }

    /// 硬件错误状态位
    pub fn fault_bits(&self) -> Result<u32, DriverError> {
        self.read(HARDWARE_ERROR_STATUS)
    }

    // === 调参 ===

    pub fn p_gain(&self) -> Result<u32, DriverError> {
        self.read(POSITION_P_GAIN)
    }

    pub fn set_p_gain(&self, value: u32) -> Result<(), DriverError> {
        self.write(POSITION_P_GAIN, value)
    }

    pub fn i_gain(&self) -> Result<u32, DriverError> {
        self.read(POSITION_I_GAIN)
    }

    pub fn set_i_gain(&self, value: u32) -> Result<(), DriverError> {
        self.write(POSITION_I_GAIN, value)
    }

    pub fn profile_acceleration(&self) -> Result<u32, DriverError> {
        self.read(PROFILE_ACCELERATION)
    }

    pub fn set_profile_acceleration(&self, value: u32) -> Result<(), DriverError> {
        self.write(PROFILE_ACCELERATION, value)
    }

    pub fn profile_velocity(&self) -> Result<u32, DriverError> {
        self.read(PROFILE_VELOCITY)
    }

    pub fn set_profile_velocity(&self, value: u32) -> Result<(), DriverError> {
        self.write(PROFILE_VELOCITY, value)
    }
}

impl std::fmt::Debug for JointProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JointProxy")
            .field("id", &self.spec.id)
            .field("name", &self.spec.name)
            .field("min_tick", &self.min_tick)
            .field("max_tick", &self.max_tick)
            .field("velocity_limit_tick", &self.velocity_limit_tick)
            .finish()
    }
}

/// 总线上的全部执行器代理
///
/// 链路打开时创建，关闭时销毁；`arm` 恒为 7 个关节，顺序为 link1..link7。
#[derive(Debug)]
pub struct Actuators {
    pub arm: Vec<JointProxy>,
    pub gripper: JointProxy,
}

impl Actuators {
    /// 为 CRANE-X7 的全部执行器创建代理
    pub fn discover(link: &SharedLink, metrics: &Arc<CraneMetrics>) -> Result<Self, DriverError> {
        let arm = ACTUATORS
            .iter()
            .filter(|spec| spec.role == ActuatorRole::Arm)
            .map(|spec| JointProxy::new(*spec, link.clone(), metrics.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let gripper = JointProxy::new(actuator(GRIPPER_ID)?, link.clone(), metrics.clone())?;
        Ok(Self { arm, gripper })
    }

    /// 全部执行器（关节在前，夹爪在后）
    pub fn all(&self) -> impl Iterator<Item = &JointProxy> {
        self.arm.iter().chain(std::iter::once(&self.gripper))
    }

    /// 对全部执行器执行同一操作，全部尝试后返回第一个错误
    pub fn for_each_actuator(
        &self,
        mut op: impl FnMut(&JointProxy) -> Result<(), DriverError>,
    ) -> Result<(), DriverError> {
        let mut first_error = None;
        for proxy in self.all() {
            if let Err(e) = op(proxy)
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crane_link::{LinkError, PacketError, SimulatedBus};
    use crane_link::sim::{SIM_ARM_MAX_TICK, SIM_ARM_MIN_TICK, SIM_VELOCITY_LIMIT};

    fn setup(id: u8) -> (SimulatedBus, JointProxy, Arc<CraneMetrics>) {
        let mut bus = SimulatedBus::crane_x7();
        bus.open("/dev/null", 3_000_000).unwrap();
        let link: SharedLink = Arc::new(Mutex::new(Box::new(bus.clone())));
        let metrics = Arc::new(CraneMetrics::new());
        let proxy = JointProxy::new(actuator(id).unwrap(), link, metrics.clone()).unwrap();
        (bus, proxy, metrics)
    }

    #[test]
    fn test_limits_read_once() {
        let (bus, proxy, _) = setup(2);
        assert_eq!(proxy.min_tick(), SIM_ARM_MIN_TICK as i32);
        assert_eq!(proxy.max_tick(), SIM_ARM_MAX_TICK as i32);
        assert_eq!(proxy.velocity_limit_tick(), SIM_VELOCITY_LIMIT);

        let reads = bus.read_count();
        let _ = proxy.max_deg();
        let _ = proxy.min_deg();
        assert_eq!(bus.read_count(), reads);
    }

    #[test]
    fn test_new_fails_on_missing_actuator() {
        let mut bus = SimulatedBus::empty();
        bus.open("/dev/null", 3_000_000).unwrap();
        let link: SharedLink = Arc::new(Mutex::new(Box::new(bus)));
        let result = JointProxy::new(ACTUATORS[0], link, Arc::new(CraneMetrics::new()));
        assert!(matches!(result, Err(DriverError::Link(LinkError::Comm(_)))));
    }

    #[test]
    fn test_torque_on_writes_role_tuning() {
        let (bus, proxy, _) = setup(GRIPPER_ID);
        bus.clear_writes();
        proxy.torque_on().unwrap();

        let writes: Vec<(u16, u32)> = bus.writes().iter().map(|w| (w.address, w.value)).collect();
        assert_eq!(
            writes,
            vec![
                (TORQUE_ENABLE.address, 1),
                (POSITION_P_GAIN.address, 200),
                (POSITION_I_GAIN.address, 20),
                (PROFILE_ACCELERATION.address, 10),
                (PROFILE_VELOCITY.address, 20),
            ]
        );

        let (_, arm, _) = setup(4);
        arm.torque_on().unwrap();
        assert_eq!(arm.p_gain().unwrap(), 150);
        assert_eq!(arm.i_gain().unwrap(), 20);
        assert_eq!(arm.profile_acceleration().unwrap(), 50);
        assert_eq!(arm.profile_velocity().unwrap(), 200);
    }

    #[test]
    fn test_torque_on_continues_after_failure() {
        let (bus, proxy, metrics) = setup(3);
        bus.clear_writes();
        bus.fail_field_for(3, POSITION_P_GAIN);
        assert!(proxy.torque_on().is_err());
        // 其余 4 项仍然写入
        assert_eq!(bus.write_count(), 4);
        assert_eq!(metrics.snapshot().write_failures, 1);
        assert_eq!(metrics.snapshot().writes_total, 5);
    }

    #[test]
    fn test_torque_toggle_keeps_gains() {
        let (bus, proxy, _) = setup(5);
        bus.clear_writes();
        proxy.torque(true).unwrap();
        proxy.torque_off().unwrap();
        assert_eq!(bus.write_count(), 2);
        assert!(bus.writes().iter().all(|w| w.address == TORQUE_ENABLE.address));
    }

    #[test]
    fn test_move_within_limits() {
        let (bus, proxy, _) = setup(2);
        bus.clear_writes();
        proxy.move_to(90.0).unwrap();
        let writes = bus.writes_to(GOAL_POSITION);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, deg_to_tick(90.0) as u32);
    }

    #[test]
    fn test_move_out_of_range_issues_no_write() {
        let (bus, proxy, _) = setup(2);
        bus.clear_writes();

        // 超过上限
        assert!(matches!(proxy.move_to(170.0), Err(DriverError::OutOfRange { .. })));
        // 等于下限（下界不含）
        let min_deg = (SIM_ARM_MIN_TICK as f64) * 360.0 / 4096.0 - 180.0;
        assert_eq!(deg_to_tick(min_deg), SIM_ARM_MIN_TICK as i32);
        assert!(proxy.move_to(min_deg).is_err());
        assert_eq!(bus.write_count(), 0);
    }

    #[test]
    fn test_move_at_upper_limit_is_allowed() {
        let (bus, proxy, _) = setup(2);
        bus.clear_writes();
        let max_deg = (SIM_ARM_MAX_TICK as f64) * 360.0 / 4096.0 - 180.0;
        assert_eq!(deg_to_tick(max_deg), SIM_ARM_MAX_TICK as i32);
        proxy.move_to(max_deg).unwrap();
        assert_eq!(bus.write_count(), 1);
    }

    #[test]
    fn test_signed_telemetry() {
        let (bus, proxy, _) = setup(6);
        bus.set_register(6, PRESENT_VELOCITY, (-10i32) as u32);
        bus.set_register(6, PRESENT_CURRENT, 0xFFFF);
        bus.set_register(6, PRESENT_TEMPERATURE, 41);
        assert_eq!(proxy.velocity_raw().unwrap(), -10);
        assert!((proxy.velocity_rpm().unwrap() + 2.29).abs() < 1e-9);
        assert_eq!(proxy.current_raw().unwrap(), -1);
        assert_eq!(proxy.temperature_c().unwrap(), 41.0);
    }

    #[test]
    fn test_read_failure_surfaces_as_error() {
        let (bus, proxy, _) = setup(7);
        bus.set_packet_error(7, PacketError::from_raw(0x80));
        match proxy.fault_bits() {
            Err(DriverError::Link(LinkError::Packet { id, error })) => {
                assert_eq!(id, 7);
                assert!(error.has_hardware_alert());
            },
            other => panic!("Expected packet error, got {:?}", other),
        }
    }

    #[test]
    fn test_position_deg_truncates() {
        let (bus, proxy, _) = setup(8);
        bus.set_present_position(8, 2172);
        assert_eq!(proxy.position_deg().unwrap(), 10);
        bus.set_present_position(8, 1923);
        assert_eq!(proxy.position_deg().unwrap(), -10);
    }

    #[test]
    fn test_discover_all_actuators() {
        let mut bus = SimulatedBus::crane_x7();
        bus.open("/dev/null", 3_000_000).unwrap();
        let link: SharedLink = Arc::new(Mutex::new(Box::new(bus.clone())));
        let actuators = Actuators::discover(&link, &Arc::new(CraneMetrics::new())).unwrap();
        let ids: Vec<u8> = actuators.all().map(|p| p.id()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(actuators.gripper.name(), "hand");
        assert_eq!(actuators.gripper.role(), ActuatorRole::Gripper);
    }

    #[test]
    fn test_for_each_actuator_attempts_all() {
        let mut bus = SimulatedBus::crane_x7();
        bus.open("/dev/null", 3_000_000).unwrap();
        let link: SharedLink = Arc::new(Mutex::new(Box::new(bus.clone())));
        let actuators = Actuators::discover(&link, &Arc::new(CraneMetrics::new())).unwrap();
        bus.fail_field_for(3, TORQUE_ENABLE);
        bus.fail_field_for(6, TORQUE_ENABLE);
        bus.clear_writes();

        let result = actuators.for_each_actuator(|p| p.torque(false));
        match result {
            Err(DriverError::Link(LinkError::Comm(_))) => {},
            other => panic!("Expected link error, got {:?}", other),
        }
        assert_eq!(bus.write_count(), 6);
    }
}
