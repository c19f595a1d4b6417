//! 命令工作线程
//!
//! 排队分发模式下，命令投递到单个工作线程按顺序执行。接纳检查在投递时执行一次，
//! 执行时再检查一次（投递与执行之间闸门可能已经变化）。

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, error, trace, warn};

use crate::command::ArmCommand;
use crate::dispatcher::Dispatcher;
use crate::error::DriverError;
use crate::join::JoinTimeout;

/// 命令通道容量
pub const COMMAND_QUEUE_CAPACITY: usize = 10;

type Reply = Sender<Result<(), DriverError>>;

/// 投递到工作线程的命令
struct Envelope {
    command: ArmCommand,
    reply: Option<Reply>,
}

fn worker_loop(dispatcher: Arc<Dispatcher>, rx: Receiver<Envelope>) {
    // 所有发送端被 drop 后 recv 返回 Err，线程退出
    while let Ok(Envelope { command, reply }) = rx.recv() {
        trace!("Worker: executing {}", command.name());
        let result = dispatcher.execute(command);
        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            },
            None => {
                if let Err(e) = result {
                    warn!("Worker: queued {} failed: {}", command.name(), e);
                }
            },
        }
    }
    debug!("Worker: command channel disconnected, exiting");
}

/// 命令工作线程
pub struct CommandWorker {
    dispatcher: Arc<Dispatcher>,
    tx: Option<Sender<Envelope>>,
    thread: Option<JoinHandle<()>>,
}

impl CommandWorker {
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> Result<Self, DriverError> {
        let (tx, rx) = bounded(COMMAND_QUEUE_CAPACITY);
        let worker_dispatcher = dispatcher.clone();
        let thread = std::thread::Builder::new()
            .name("crane-command".into())
            .spawn(move || worker_loop(worker_dispatcher, rx))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;
        Ok(Self {
            dispatcher,
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// 投递一条命令
    ///
    /// 需要等待结果的命令（见 [`ArmCommand::waits_for_completion`]）阻塞到执行完成；
    /// 其他命令在入队后立即返回。
    pub fn submit(&self, command: ArmCommand) -> Result<(), DriverError> {
        self.dispatcher.admit(&command)?;
        let tx = self.tx.as_ref().ok_or(DriverError::ChannelClosed)?;

        let (reply, response) = if command.waits_for_completion() {
            let (reply_tx, reply_rx) = bounded(1);
            (Some(reply_tx), Some(reply_rx))
        } else {
            (None, None)
        };

        tx.try_send(Envelope { command, reply }).map_err(|e| match e {
            TrySendError::Full(_) => {
                error!("Worker: command queue full, dropping {}", command.name());
                DriverError::ChannelFull
            },
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })?;

        match response {
            Some(rx) => rx.recv().map_err(|_| DriverError::ChannelClosed)?,
            None => Ok(()),
        }
    }

    /// 关闭通道并等待已入队的命令执行完毕
    pub fn shutdown(&mut self) {
        self.tx.take();

        let join_timeout = Duration::from_secs(5);
        if let Some(handle) = self.thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Command worker panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}

impl Drop for CommandWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
