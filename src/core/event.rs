//! 事件总线系统 (Event Bus System)
//!
//! 基于 MPMC (Multi-Producer, Multi-Consumer) 架构实现 Engine 与 UI 之间的解耦通信。

use flume::{Receiver, Sender};

/// 流水线生命周期事件 (Pipeline Lifecycle Events)
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    /// 测试任务初始化
    RunStarted { input: usize, supported: usize },

    /// 重试轮次开始
    RoundStarted {
        round: u32,
        max_rounds: u32,
        queued: usize,
    },

    /// 批次开始
    BatchStarted {
        batch: usize,
        total_batches: usize,
        size: usize,
    },

    /// 单个探测落地
    ProbeFinished { success: bool },

    /// 批次完成
    BatchCompleted { batch: usize, active: usize },

    /// 批次整体失败（核心未能就绪）
    BatchFailed { batch: usize, reason: String },

    /// 全部轮次结束
    RunCompleted { tested: usize, active: usize },

    /// 任务出现致命错误
    RunFailed { error: String },
}

/// 事件分发器 (Event Dispatcher)
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<ProbeEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<ProbeEvent>) -> Self {
        Self { tx }
    }

    /// 将事件推入总线
    pub fn emit(&self, event: ProbeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn round_started(&self, round: u32, max_rounds: u32, queued: usize) {
        self.emit(ProbeEvent::RoundStarted {
            round,
            max_rounds,
            queued,
        });
    }

    pub fn batch_started(&self, batch: usize, total_batches: usize, size: usize) {
        self.emit(ProbeEvent::BatchStarted {
            batch,
            total_batches,
            size,
        });
    }

    pub fn probe_finished(&self, success: bool) {
        self.emit(ProbeEvent::ProbeFinished { success });
    }

    pub fn batch_completed(&self, batch: usize, active: usize) {
        self.emit(ProbeEvent::BatchCompleted { batch, active });
    }
}

/// 事件接收端 (Event Consumer)
pub struct EventReceiver {
    rx: Receiver<ProbeEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<ProbeEvent>) -> Self {
        Self { rx }
    }

    /// 异步监听
    pub async fn recv_async(&self) -> Option<ProbeEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建双向事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
