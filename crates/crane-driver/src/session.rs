//! 链路会话
//!
//! 会话在链路打开时创建、关闭时销毁，持有该次打开期间的全部执行器代理与后台线程。
//! 没有任何代理或线程会比它所依赖的链路活得更久。

use std::sync::Arc;

use crane_protocol::JOINT_COUNT;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::command::ArmCommand;
use crate::config::{CraneConfig, DispatchMode};
use crate::dispatcher::Dispatcher;
use crate::error::DriverError;
use crate::gate::ControlGate;
use crate::joint::{Actuators, SharedLink};
use crate::state::ArmContext;
use crate::telemetry::{AtomicTelemetryState, TelemetryHandle, TelemetrySampler};
use crate::wait::MotionWaiter;
use crate::worker::CommandWorker;

/// 会话间共享的状态（闸门、回零位置、快照、遥测状态）
pub(crate) struct Shared {
    pub gate: Arc<ControlGate>,
    pub home: Arc<RwLock<[f64; JOINT_COUNT]>>,
    pub context: Arc<ArmContext>,
    pub telemetry_state: Arc<AtomicTelemetryState>,
}

pub(crate) struct Session {
    link: SharedLink,
    actuators: Arc<Actuators>,
    dispatcher: Arc<Dispatcher>,
    worker: Option<CommandWorker>,
    telemetry: TelemetryHandle,
}

impl Session {
    /// 在已打开的链路上建立会话
    ///
    /// 读取各执行器限位、使能扭矩并写入默认调参、同步采样一次后启动遥测线程。
    pub fn start(
        link: SharedLink,
        config: &CraneConfig,
        shared: &Shared,
    ) -> Result<Self, DriverError> {
        let actuators = Arc::new(Actuators::discover(&link, &shared.context.metrics)?);

        if let Err(e) = actuators.for_each_actuator(|proxy| proxy.torque_on()) {
            warn!("Some actuators did not accept torque-on settings: {}", e);
        }

        let sampler = TelemetrySampler::new(actuators.clone(), shared.context.clone());
        let telemetry = TelemetryHandle::spawn(
            sampler,
            config.telemetry.period(),
            shared.telemetry_state.clone(),
        )?;

        let waiter = MotionWaiter::new(shared.context.clone(), config.motion.wait_policy());
        let dispatcher = Arc::new(Dispatcher::new(
            actuators.clone(),
            shared.gate.clone(),
            shared.home.clone(),
            waiter,
            config.budgets,
            config.motion.gripper_margin_deg,
            shared.context.metrics.clone(),
        ));

        let worker = match config.dispatch {
            DispatchMode::Direct => None,
            DispatchMode::Queued => Some(CommandWorker::spawn(dispatcher.clone())?),
        };

        info!(
            "Session started: {} actuators, dispatch {:?}",
            actuators.all().count(),
            config.dispatch
        );
        Ok(Self {
            link,
            actuators,
            dispatcher,
            worker,
            telemetry,
        })
    }

    pub fn actuators(&self) -> &Actuators {
        &self.actuators
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// 按配置的分发方式执行命令
    pub fn dispatch(&self, command: ArmCommand) -> Result<(), DriverError> {
        match &self.worker {
            Some(worker) => worker.submit(command),
            None => self.dispatcher.execute(command),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.telemetry.stop();

        if let Err(e) = self.actuators.for_each_actuator(|proxy| proxy.torque_off()) {
            warn!("Torque off failed while closing: {}", e);
        }
        self.link.lock().close();
        info!("Session closed");
    }
}
