//! 内存模拟总线
//!
//! 模拟一条挂载 CRANE-X7 全部执行器的 Dynamixel 总线，用于测试与无硬件调试。
//! 行为要点：
//!
//! - 每个执行器一张寄存器表（地址 → 原始值）
//! - 扭矩使能时，每次读取 Present Position 会让当前位置向目标位置前进 `motion_step` tick
//! - Moving 寄存器反映当前位置是否等于目标位置
//! - 扭矩使能时写 EEPROM 区（地址 < 64）返回 Access 错误，与真实固件一致
//! - 可按字段注入通信故障、硬件报警、读取延迟
//!
//! `SimulatedBus` 是一个可克隆的句柄，测试代码保留一份克隆即可在驱动运行时观察写入记录。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crane_protocol::{
    ACTUATORS, ActuatorRole, GOAL_POSITION, HARDWARE_ERROR_STATUS, MAX_POSITION_LIMIT,
    MIN_POSITION_LIMIT, MOVING, PRESENT_POSITION, PRESENT_TEMPERATURE, RegisterField,
    RegisterWidth, TORQUE_ENABLE, TORQUE_ON, VELOCITY_LIMIT,
};
use parking_lot::Mutex;
use tracing::trace;

use crate::{CommResult, DeviceLink, LinkError, PacketError, PacketErrorKind};

/// EEPROM 区上界（不含）
const EEPROM_END: u16 = 64;

/// 关节软限位（tick）
pub const SIM_ARM_MIN_TICK: u32 = 262;
pub const SIM_ARM_MAX_TICK: u32 = 3834;
/// 夹爪软限位（tick）
pub const SIM_GRIPPER_MIN_TICK: u32 = 1643;
pub const SIM_GRIPPER_MAX_TICK: u32 = 2475;
/// 速度上限寄存器值
pub const SIM_VELOCITY_LIMIT: u32 = 300;
/// 初始位置（0°）
pub const SIM_START_TICK: u32 = 2048;
/// 默认每次读取前进的 tick 数
pub const SIM_DEFAULT_MOTION_STEP: u32 = 200;
/// 写入记录上限，超出后丢弃最早的记录
pub const SIM_WRITE_LOG_CAPACITY: usize = 4096;

/// 一次写入记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub id: u8,
    pub address: u16,
    pub value: u32,
}

#[derive(Debug, Default)]
struct SimServo {
    registers: HashMap<u16, u32>,
    packet_error: PacketError,
}

impl SimServo {
    fn get(&self, address: u16) -> u32 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    fn torque_enabled(&self) -> bool {
        self.get(TORQUE_ENABLE.address) == TORQUE_ON
    }

    /// 向目标位置前进一步
    fn step_toward_goal(&mut self, step: u32) {
        if !self.torque_enabled() || step == 0 {
            return;
        }
        let present = self.get(PRESENT_POSITION.address) as i64;
        let goal = self.get(GOAL_POSITION.address) as i64;
        let delta = (goal - present).clamp(-(step as i64), step as i64);
        self.registers
            .insert(PRESENT_POSITION.address, (present + delta) as u32);
    }
}

#[derive(Debug)]
struct SimState {
    open: bool,
    fail_open: bool,
    device: Option<String>,
    baud_rate: u32,
    servos: HashMap<u8, SimServo>,
    last_result: CommResult,
    last_error: PacketError,
    writes: VecDeque<WriteRecord>,
    read_count: u64,
    /// (id, address)；id 为 None 表示所有执行器
    faults: HashSet<(Option<u8>, u16)>,
    read_delay: Duration,
    motion_step: u32,
}

impl SimState {
    fn has_fault(&self, id: u8, address: u16) -> bool {
        self.faults.contains(&(Some(id), address)) || self.faults.contains(&(None, address))
    }

    fn set_status(&mut self, result: CommResult, error: PacketError) {
        self.last_result = result;
        self.last_error = error;
    }
}

/// 模拟总线句柄
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    /// 空总线（无执行器）
    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                open: false,
                fail_open: false,
                device: None,
                baud_rate: 0,
                servos: HashMap::new(),
                last_result: CommResult::Success,
                last_error: PacketError::NONE,
                writes: VecDeque::new(),
                read_count: 0,
                faults: HashSet::new(),
                read_delay: Duration::ZERO,
                motion_step: SIM_DEFAULT_MOTION_STEP,
            })),
        }
    }

    /// 挂载 CRANE-X7 全部执行器（ID 2-9）的总线
    pub fn crane_x7() -> Self {
        let bus = Self::empty();
        for spec in ACTUATORS.iter() {
            let (min, max) = match spec.role {
                ActuatorRole::Arm => (SIM_ARM_MIN_TICK, SIM_ARM_MAX_TICK),
                ActuatorRole::Gripper => (SIM_GRIPPER_MIN_TICK, SIM_GRIPPER_MAX_TICK),
            };
            bus.add_servo(spec.id, min, max, SIM_VELOCITY_LIMIT);
        }
        bus
    }

    /// 添加一个执行器
    pub fn add_servo(&self, id: u8, min_tick: u32, max_tick: u32, velocity_limit: u32) {
        let mut servo = SimServo::default();
        servo.registers.insert(MIN_POSITION_LIMIT.address, min_tick);
        servo.registers.insert(MAX_POSITION_LIMIT.address, max_tick);
        servo.registers.insert(VELOCITY_LIMIT.address, velocity_limit);
        servo.registers.insert(PRESENT_POSITION.address, SIM_START_TICK);
        servo.registers.insert(GOAL_POSITION.address, SIM_START_TICK);
        servo.registers.insert(PRESENT_TEMPERATURE.address, 30);
        self.state.lock().servos.insert(id, servo);
    }

    /// 最近一次 `open()` 使用的设备与波特率
    pub fn opened_with(&self) -> Option<(String, u32)> {
        let state = self.state.lock();
        state.device.clone().map(|d| (d, state.baud_rate))
    }

    // === 观察 ===

    /// 最近的写入记录（按时间顺序，最多 [`SIM_WRITE_LOG_CAPACITY`] 条）
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.iter().copied().collect()
    }

    /// 对某字段的写入记录
    pub fn writes_to(&self, field: RegisterField) -> Vec<WriteRecord> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.address == field.address)
            .copied()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn read_count(&self) -> u64 {
        self.state.lock().read_count
    }

    /// 读取寄存器当前值（不经过总线，不计数）
    pub fn register(&self, id: u8, field: RegisterField) -> Option<u32> {
        self.state
            .lock()
            .servos
            .get(&id)
            .map(|s| s.get(field.address))
    }

    // === 注入 ===

    /// 直接设置寄存器（不记录写入）
    pub fn set_register(&self, id: u8, field: RegisterField, value: u32) {
        if let Some(servo) = self.state.lock().servos.get_mut(&id) {
            servo.registers.insert(field.address, field.width.truncate(value));
        }
    }

    /// 设置当前位置（同时设置目标位置，使执行器静止）
    pub fn set_present_position(&self, id: u8, tick: u32) {
        if let Some(servo) = self.state.lock().servos.get_mut(&id) {
            servo.registers.insert(PRESENT_POSITION.address, tick);
            servo.registers.insert(GOAL_POSITION.address, tick);
        }
    }

    /// 设置硬件错误状态寄存器
    pub fn set_hardware_error(&self, id: u8, bits: u8) {
        self.set_register(id, HARDWARE_ERROR_STATUS, bits as u32);
    }

    /// 让某执行器的后续状态包都带上指定错误字节
    pub fn set_packet_error(&self, id: u8, error: PacketError) {
        if let Some(servo) = self.state.lock().servos.get_mut(&id) {
            servo.packet_error = error;
        }
    }

    /// 所有执行器上该字段的读写都超时
    pub fn fail_field(&self, field: RegisterField) {
        self.state.lock().faults.insert((None, field.address));
    }

    /// 指定执行器上该字段的读写超时
    pub fn fail_field_for(&self, id: u8, field: RegisterField) {
        self.state.lock().faults.insert((Some(id), field.address));
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// 令后续 `open()` 失败
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// 每次读取的额外延迟
    pub fn set_read_delay(&self, delay: Duration) {
        self.state.lock().read_delay = delay;
    }

    /// 每次读取当前位置时前进的 tick 数（0 = 卡死）
    pub fn set_motion_step(&self, step: u32) {
        self.state.lock().motion_step = step;
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::crane_x7()
    }
}

impl DeviceLink for SimulatedBus {
    fn open(&mut self, device: &str, baud_rate: u32) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(LinkError::OpenFailed {
                device: device.to_string(),
                message: "simulated open failure".to_string(),
            });
        }
        if baud_rate == 0 {
            return Err(LinkError::BaudRate { baud_rate });
        }
        state.open = true;
        state.device = Some(device.to_string());
        state.baud_rate = baud_rate;
        state.set_status(CommResult::Success, PacketError::NONE);
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn read_field(&mut self, id: u8, address: u16, width: RegisterWidth) -> u32 {
        let delay = self.state.lock().read_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.read_count += 1;
        if !state.open {
            state.set_status(CommResult::PortBusy, PacketError::NONE);
            return 0;
        }
        if state.has_fault(id, address) {
            state.set_status(CommResult::RxTimeout, PacketError::NONE);
            return 0;
        }
        let step = state.motion_step;
        let Some(servo) = state.servos.get_mut(&id) else {
            state.set_status(CommResult::RxTimeout, PacketError::NONE);
            return 0;
        };

        if address == PRESENT_POSITION.address {
            servo.step_toward_goal(step);
        }
        let value = if address == MOVING.address {
            (servo.get(PRESENT_POSITION.address) != servo.get(GOAL_POSITION.address)) as u32
        } else {
            servo.get(address)
        };
        let error = servo.packet_error;
        state.set_status(CommResult::Success, error);
        trace!("sim read id={} addr={} -> {}", id, address, value);
        width.truncate(value)
    }

    fn write_field(&mut self, id: u8, address: u16, width: RegisterWidth, value: u32) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            state.set_status(CommResult::PortBusy, PacketError::NONE);
            return false;
        }
        if state.has_fault(id, address) {
            state.set_status(CommResult::RxTimeout, PacketError::NONE);
            return false;
        }
        let Some(servo) = state.servos.get_mut(&id) else {
            state.set_status(CommResult::RxTimeout, PacketError::NONE);
            return false;
        };

        if address < EEPROM_END && servo.torque_enabled() {
            state.set_status(CommResult::Success, PacketErrorKind::Access.into());
            return false;
        }
        let error = servo.packet_error;
        servo.registers.insert(address, width.truncate(value));
        if state.writes.len() == SIM_WRITE_LOG_CAPACITY {
            state.writes.pop_front();
        }
        state.writes.push_back(WriteRecord { id, address, value });
        state.set_status(CommResult::Success, error);
        trace!("sim write id={} addr={} <- {}", id, address, value);
        error.is_ok()
    }

    fn last_comm_result(&self) -> CommResult {
        self.state.lock().last_result
    }

    fn last_packet_error(&self) -> PacketError {
        self.state.lock().last_error
    }
}
