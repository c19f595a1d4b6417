//! 并发集成测试
//!
//! 验证遥测线程与命令调用并发时的快照一致性、队列分发以及故障位聚合。

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use common::{near, open_crane, wait_until};
use crane_sdk::protocol::{GOAL_POSITION, PRESENT_TEMPERATURE};
use crane_sdk::{ArmStatus, DispatchMode, DriverError};

#[test]
fn test_snapshots_stay_well_formed_under_load() {
    let (bus, crane) = open_crane(DispatchMode::Direct);
    bus.set_read_delay(Duration::from_micros(50));
    let crane = Arc::new(crane);
    let running = Arc::new(AtomicBool::new(true));

    // 读者：序号单调、数值有限且在软限位内
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let crane = crane.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut last_sequence = 0;
                let mut observed = 0u32;
                while running.load(Ordering::Relaxed) {
                    let Some(snapshot) = crane.snapshot() else {
                        break;
                    };
                    assert!(snapshot.sequence >= last_sequence);
                    last_sequence = snapshot.sequence;
                    for deg in snapshot.joint_positions_deg {
                        assert!(deg.is_finite());
                        assert!((-157.0..=157.0).contains(&deg), "position {}", deg);
                    }
                    observed += 1;
                    thread::sleep(Duration::from_millis(1));
                }
                observed
            })
        })
        .collect();

    // 两个调用方交替下发关节与夹爪命令
    let arm = {
        let crane = crane.clone();
        thread::spawn(move || {
            for i in 0..5 {
                let deg = if i % 2 == 0 { 40.0 } else { -40.0 };
                crane.move_joints([deg; 7], true).unwrap();
            }
        })
    };
    let gripper = {
        let crane = crane.clone();
        thread::spawn(move || {
            for _ in 0..3 {
                crane.open_gripper(true).unwrap();
                crane.close_gripper(true).unwrap();
            }
        })
    };

    arm.join().unwrap();
    gripper.join().unwrap();
    running.store(false, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    assert!(near(&crane.positions().unwrap(), &[-40.0; 7], 3.0));
    assert_eq!(crane.metrics().commands_executed, 11);
    assert_eq!(crane.metrics().wait_timeouts, 0);
}

#[test]
fn test_queued_dispatch_sync_and_async() {
    let (bus, crane) = open_crane(DispatchMode::Queued);
    let goal = [15.0, 0.0, -15.0, -60.0, 0.0, 30.0, 0.0];

    crane.move_joints(goal, true).unwrap();
    assert!(near(&crane.positions().unwrap(), &goal, 3.0));

    // 异步命令入队即返回，随后在工作线程上执行
    crane.home(false).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        near(&crane.positions().unwrap(), &[0.0; 7], 3.0)
    }));
    assert_eq!(bus.writes_to(GOAL_POSITION).len(), 14);

    // 队列模式下软限位错误由应答带回
    let mut bad = goal;
    bad[0] = 200.0;
    assert!(matches!(
        crane.move_joints(bad, true),
        Err(DriverError::OutOfRange { joint: "link1", .. })
    ));
}

#[test]
fn test_queued_dispatch_rejects_when_paused() {
    let (bus, crane) = open_crane(DispatchMode::Queued);
    crane.pause().unwrap();
    bus.clear_writes();

    // 入队前即被闸门拒绝，同步与异步一致
    assert!(matches!(crane.move_joints([5.0; 7], false), Err(DriverError::Paused)));
    assert!(matches!(crane.move_joints([5.0; 7], true), Err(DriverError::Paused)));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(bus.write_count(), 0);

    crane.resume().unwrap();
    crane.move_joints([5.0; 7], true).unwrap();
}

#[test]
fn test_fault_bits_are_ored_across_joints() {
    let (bus, crane) = open_crane(DispatchMode::Direct);
    assert_eq!(crane.fault_bits(), Some(0));

    bus.set_hardware_error(3, 0x04);
    bus.set_hardware_error(7, 0x20);
    assert!(wait_until(Duration::from_secs(1), || crane.fault_bits() == Some(0x24)));
    assert!(crane.status().contains(ArmStatus::ALARM));

    bus.set_hardware_error(3, 0);
    bus.set_hardware_error(7, 0);
    assert!(wait_until(Duration::from_secs(1), || crane.fault_bits() == Some(0)));
    assert!(!crane.status().contains(ArmStatus::ALARM));
}

#[test]
fn test_failed_read_keeps_previous_value() {
    let (bus, crane) = open_crane(DispatchMode::Direct);
    bus.set_register(4, PRESENT_TEMPERATURE, 41);
    assert!(wait_until(Duration::from_secs(1), || {
        crane.temperatures().map(|t| t[2]) == Some(41.0)
    }));

    bus.fail_field_for(4, PRESENT_TEMPERATURE);
    bus.set_register(4, PRESENT_TEMPERATURE, 90);
    let failures = crane.metrics().read_failures;
    assert!(wait_until(Duration::from_secs(1), || {
        crane.metrics().read_failures > failures + 3
    }));
    assert_eq!(crane.temperatures().map(|t| t[2]), Some(41.0));
    // 其他字段照常刷新
    assert!(crane.metrics().telemetry_ticks > 0);

    bus.clear_faults();
    assert!(wait_until(Duration::from_secs(1), || {
        crane.temperatures().map(|t| t[2]) == Some(90.0)
    }));
}

#[test]
fn test_close_waits_for_inflight_command() {
    let (bus, crane) = open_crane(DispatchMode::Direct);
    bus.set_motion_step(50);
    let crane = Arc::new(crane);

    let mover = {
        let crane = crane.clone();
        thread::spawn(move || crane.move_joints([-60.0; 7], true))
    };
    // 等命令开始执行后再关闭
    assert!(wait_until(Duration::from_secs(1), || {
        bus.writes_to(GOAL_POSITION).len() == 7
    }));
    crane.close().unwrap();

    mover.join().unwrap().unwrap();
    assert!(!crane.is_open());
}
