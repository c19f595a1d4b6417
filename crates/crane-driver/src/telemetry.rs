//! 遥测循环
//!
//! 后台线程按固定周期（默认 10ms）读取每个执行器的完整状态，聚合后整体发布到
//! [`ArmContext`]。
//!
//! - 每次字段读取都是独立的短临界区，命令分发器的写入可以穿插在两次读取之间
//! - 单个字段读取失败不会中止本周期：该字段沿用上一周期的缓存值（错误已由关节代理记录）
//! - 循环本身不会因错误退出，只有显式关闭才会停止

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crane_protocol::JOINT_COUNT;
use tracing::{error, info, trace};

use crate::error::DriverError;
use crate::join::JoinTimeout;
use crate::joint::{Actuators, JointProxy};
use crate::state::{ArmContext, ArmSnapshot};

/// 遥测循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TelemetryState {
    /// 链路未打开
    #[default]
    Idle = 0,
    /// 周期运行中
    Running = 1,
    /// 链路已关闭
    Stopped = 2,
}

impl TelemetryState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// 遥测状态（原子版本，线程间共享）
#[derive(Debug, Default)]
pub struct AtomicTelemetryState {
    inner: AtomicU8,
}

impl AtomicTelemetryState {
    pub fn get(&self) -> TelemetryState {
        TelemetryState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: TelemetryState) {
        self.inner.store(state as u8, Ordering::Release);
    }
}

/// 单个执行器的缓存值
#[derive(Debug, Clone, Copy, Default)]
struct JointCache {
    position_deg: f64,
    velocity_rpm: f64,
    current_ma: f64,
    temperature_c: f64,
    moving: bool,
    torque_enabled: bool,
    fault_bits: u32,
    profile_velocity: u32,
}

/// 读取成功则更新缓存，失败则保留旧值并计数
fn refresh<T>(slot: &mut T, value: Result<T, DriverError>, failures: &mut u64) {
    match value {
        Ok(v) => *slot = v,
        Err(_) => *failures += 1,
    }
}

/// 遥测采样器
///
/// 持有每个执行器的缓存，`tick()` 完成一个周期的读取与发布。
pub struct TelemetrySampler {
    actuators: Arc<Actuators>,
    context: Arc<ArmContext>,
    arm_cache: [JointCache; JOINT_COUNT],
    gripper_cache: JointCache,
    sequence: u64,
    started: Instant,
}

impl TelemetrySampler {
    pub fn new(actuators: Arc<Actuators>, context: Arc<ArmContext>) -> Self {
        Self {
            actuators,
            context,
            arm_cache: [JointCache::default(); JOINT_COUNT],
            gripper_cache: JointCache::default(),
            sequence: 0,
            started: Instant::now(),
        }
    }

    /// 执行一个遥测周期并发布快照
    pub fn tick(&mut self) {
        let mut failures = 0u64;

        for (proxy, cache) in self.actuators.arm.iter().zip(self.arm_cache.iter_mut()) {
            Self::sample_arm(proxy, cache, &mut failures);
        }
        Self::sample_gripper(&self.actuators.gripper, &mut self.gripper_cache, &mut failures);

        self.sequence += 1;
        let snapshot = self.build_snapshot();
        self.context.publish(snapshot);

        let metrics = &self.context.metrics;
        metrics.telemetry_ticks.fetch_add(1, Ordering::Relaxed);
        if failures > 0 {
            metrics.read_failures.fetch_add(failures, Ordering::Relaxed);
            trace!("Telemetry tick {}: {} field reads kept stale values", self.sequence, failures);
        }
    }

    fn sample_arm(proxy: &JointProxy, cache: &mut JointCache, failures: &mut u64) {
        refresh(
            &mut cache.position_deg,
            proxy.position_deg().map(f64::from),
            failures,
        );
        refresh(&mut cache.velocity_rpm, proxy.velocity_rpm(), failures);
        refresh(&mut cache.current_ma, proxy.current_ma(), failures);
        refresh(&mut cache.temperature_c, proxy.temperature_c(), failures);
        refresh(&mut cache.moving, proxy.is_moving(), failures);
        refresh(&mut cache.torque_enabled, proxy.torque_enabled(), failures);
        refresh(&mut cache.fault_bits, proxy.fault_bits(), failures);
        refresh(&mut cache.profile_velocity, proxy.profile_velocity(), failures);
    }

    fn sample_gripper(proxy: &JointProxy, cache: &mut JointCache, failures: &mut u64) {
        refresh(
            &mut cache.position_deg,
            proxy.position_deg().map(f64::from),
            failures,
        );
        refresh(&mut cache.moving, proxy.is_moving(), failures);
        refresh(&mut cache.torque_enabled, proxy.torque_enabled(), failures);
        refresh(&mut cache.fault_bits, proxy.fault_bits(), failures);
    }

    fn build_snapshot(&self) -> ArmSnapshot {
        let mut snapshot = ArmSnapshot {
            sequence: self.sequence,
            timestamp_us: self.started.elapsed().as_micros() as u64,
            gripper_position_deg: self.gripper_cache.position_deg,
            gripper_moving: self.gripper_cache.moving,
            gripper_torque_enabled: self.gripper_cache.torque_enabled,
            gripper_fault_bits: self.gripper_cache.fault_bits,
            ..Default::default()
        };

        for (i, cache) in self.arm_cache.iter().enumerate() {
            snapshot.joint_positions_deg[i] = cache.position_deg;
            snapshot.velocities_rpm[i] = cache.velocity_rpm;
            snapshot.currents_ma[i] = cache.current_ma;
            snapshot.temperatures_c[i] = cache.temperature_c;
            snapshot.torque_enabled[i] = cache.torque_enabled;
            snapshot.profile_velocities[i] = cache.profile_velocity;
            snapshot.moving |= cache.moving;
            snapshot.fault_bits |= cache.fault_bits;
        }
        for (i, proxy) in self.actuators.arm.iter().enumerate().take(JOINT_COUNT) {
            snapshot.velocity_limits_tick[i] = proxy.velocity_limit_tick();
        }
        snapshot
    }
}

/// 遥测循环
///
/// # 参数
///
/// - `sampler`: 采样器
/// - `period`: 采样周期
/// - `is_running`: 运行标志（清除后循环在当前周期结束时退出）
pub fn telemetry_loop(mut sampler: TelemetrySampler, period: Duration, is_running: Arc<AtomicBool>) {
    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Telemetry thread: is_running flag is false, exiting");
            break;
        }

        let started = Instant::now();
        sampler.tick();

        let elapsed = started.elapsed();
        if elapsed < period {
            spin_sleep::sleep(period - elapsed);
        }
    }
}

/// 遥测线程句柄
///
/// Drop 时清除运行标志并等待线程退出。
pub struct TelemetryHandle {
    is_running: Arc<AtomicBool>,
    state: Arc<AtomicTelemetryState>,
    thread: Option<JoinHandle<()>>,
}

impl TelemetryHandle {
    /// 启动遥测线程
    ///
    /// 启动前先同步执行一个周期，保证返回时快照已经有效。
    pub fn spawn(
        mut sampler: TelemetrySampler,
        period: Duration,
        state: Arc<AtomicTelemetryState>,
    ) -> Result<Self, DriverError> {
        sampler.tick();

        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();
        let thread = std::thread::Builder::new()
            .name("crane-telemetry".into())
            .spawn(move || telemetry_loop(sampler, period, running))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        state.set(TelemetryState::Running);
        info!("Telemetry loop started (period {:?})", period);
        Ok(Self {
            is_running,
            state,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 停止循环并等待线程退出
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.thread.take() {
            if let Err(_e) = handle.join_timeout(join_timeout) {
                error!(
                    "Telemetry thread panicked or failed to shut down within {:?}",
                    join_timeout
                );
            }
            self.state.set(TelemetryState::Stopped);
            info!("Telemetry loop stopped");
        }
    }
}

impl Drop for TelemetryHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::SharedLink;
    use crate::metrics::CraneMetrics;
    use crane_link::{DeviceLink, SimulatedBus};
    use crane_protocol::{
        GOAL_POSITION, HARDWARE_ERROR_STATUS, PRESENT_TEMPERATURE, PRESENT_VELOCITY, TORQUE_ENABLE,
    };
    use parking_lot::Mutex;

    fn setup() -> (SimulatedBus, Arc<Actuators>, Arc<ArmContext>) {
        let mut bus = SimulatedBus::crane_x7();
        bus.open("/dev/null", 3_000_000).unwrap();
        let link: SharedLink = Arc::new(Mutex::new(Box::new(bus.clone())));
        let context = Arc::new(ArmContext::new());
        let metrics: Arc<CraneMetrics> = context.metrics.clone();
        let actuators = Arc::new(Actuators::discover(&link, &metrics).unwrap());
        (bus, actuators, context)
    }

    #[test]
    fn test_state_conversions() {
        assert_eq!(TelemetryState::from_u8(0), TelemetryState::Idle);
        assert_eq!(TelemetryState::from_u8(1), TelemetryState::Running);
        assert_eq!(TelemetryState::from_u8(2), TelemetryState::Stopped);
        let state = AtomicTelemetryState::default();
        assert_eq!(state.get(), TelemetryState::Idle);
        state.set(TelemetryState::Running);
        assert_eq!(state.get(), TelemetryState::Running);
    }

    #[test]
    fn test_tick_publishes_snapshot() {
        let (bus, actuators, context) = setup();
        bus.set_present_position(4, 2172);
        bus.set_register(5, PRESENT_VELOCITY, 100);
        bus.set_register(6, PRESENT_TEMPERATURE, 45);
        bus.set_present_position(9, 1923);

        let mut sampler = TelemetrySampler::new(actuators, context.clone());
        sampler.tick();

        let s = context.load();
        assert_eq!(s.sequence, 1);
        assert_eq!(s.joint_positions_deg[2], 10.0);
        assert!((s.velocities_rpm[3] - 22.9).abs() < 1e-9);
        assert_eq!(s.temperatures_c[4], 45.0);
        assert_eq!(s.gripper_position_deg, -10.0);
        assert_eq!(s.velocity_limits_tick, [300; JOINT_COUNT]);
        assert!(!s.moving);
        assert_eq!(context.metrics.snapshot().telemetry_ticks, 1);
    }

    #[test]
    fn test_fault_bits_are_or_of_joints() {
        let (bus, actuators, context) = setup();
        bus.set_hardware_error(2, 0x01);
        bus.set_hardware_error(5, 0x04);
        bus.set_hardware_error(8, 0x20);
        bus.set_hardware_error(9, 0x08);

        let mut sampler = TelemetrySampler::new(actuators, context.clone());
        sampler.tick();

        let s = context.load();
        assert_eq!(s.fault_bits, 0x01 | 0x04 | 0x20);
        assert_eq!(s.gripper_fault_bits, 0x08);
        assert!(s.has_alarm());
    }

    #[test]
    fn test_failed_read_keeps_previous_value() {
        let (bus, actuators, context) = setup();
        bus.set_register(3, PRESENT_TEMPERATURE, 50);
        let mut sampler = TelemetrySampler::new(actuators, context.clone());
        sampler.tick();
        assert_eq!(context.load().temperatures_c[1], 50.0);

        bus.set_register(3, PRESENT_TEMPERATURE, 60);
        bus.set_register(3, HARDWARE_ERROR_STATUS, 0x10);
        bus.fail_field_for(3, PRESENT_TEMPERATURE);
        sampler.tick();

        let s = context.load();
        assert_eq!(s.sequence, 2);
        assert_eq!(s.temperatures_c[1], 50.0);
        // 同一执行器的其他字段照常更新
        assert_eq!(s.fault_bits, 0x10);
        assert_eq!(context.metrics.snapshot().read_failures, 1);
    }

    #[test]
    fn test_moving_is_or_of_joints() {
        let (bus, actuators, context) = setup();
        let mut link = bus.clone();
        link.write_field(7, TORQUE_ENABLE.address, TORQUE_ENABLE.width, 1);
        link.write_field(7, GOAL_POSITION.address, GOAL_POSITION.width, 3000);

        let mut sampler = TelemetrySampler::new(actuators, context.clone());
        sampler.tick();
        assert!(context.load().moving);
        assert!(!context.load().gripper_moving);
    }

    #[test]
    fn test_loop_runs_and_stops() {
        let (_bus, actuators, context) = setup();
        let state = Arc::new(AtomicTelemetryState::default());
        let sampler = TelemetrySampler::new(actuators, context.clone());

        let mut handle =
            TelemetryHandle::spawn(sampler, Duration::from_millis(1), state.clone()).unwrap();
        assert_eq!(state.get(), TelemetryState::Running);
        // 启动时已同步执行一个周期
        assert!(context.load().sequence >= 1);

        std::thread::sleep(Duration::from_millis(50));
        assert!(context.load().sequence > 1);

        handle.stop();
        assert!(!handle.is_running());
        assert_eq!(state.get(), TelemetryState::Stopped);
        let last = context.load().sequence;
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(context.load().sequence, last);
    }
}
