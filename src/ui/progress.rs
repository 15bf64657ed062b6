//! 终端进度渲染引擎 (Terminal UI Progress Engine)
//!
//! 基于 `indicatif` 实现非阻塞式进度条编排，同步批次与轮次状态。

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::event::{EventReceiver, ProbeEvent};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
pub struct UiState {
    /// 全局任务主状态条
    main_bar: Option<ProgressBar>,
    /// 当前批次进度条
    batch_bar: Option<ProgressBar>,
}

impl UiState {
    fn new() -> Self {
        Self {
            main_bar: None,
            batch_bar: None,
        }
    }
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::new())))
}

/// 进度协调器 (Progress Orchestrator)
pub struct Ui;

impl Ui {
    /// 激活事件监听循环，启动异步渲染管线
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    /// 执行 UI 状态转换与渲染更新
    fn handle_event(event: ProbeEvent) {
        let multi = get_multi();
        let state = get_state();
        let mut ui = state.write();

        match event {
            ProbeEvent::RunStarted { input, supported } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style);
                bar.set_message(format!(
                    "🔗 Testing {} descriptors ({} links read)",
                    supported, input
                ));
                bar.enable_steady_tick(Duration::from_millis(100));
                ui.main_bar = Some(bar);
            }
            ProbeEvent::RoundStarted {
                round,
                max_rounds,
                queued,
            } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message(format!(
                        "🔁 Round {}/{}: {} queued",
                        round, max_rounds, queued
                    ));
                }
            }
            ProbeEvent::BatchStarted { batch, total_batches, size } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("█▉▊▋▌▍▎▏  ");

                let bar = multi.add(ProgressBar::new(size as u64));
                bar.set_style(style);
                bar.set_message(format!("Batch {}/{}", batch, total_batches));
                ui.batch_bar = Some(bar);
            }
            ProbeEvent::ProbeFinished { .. } => {
                if let Some(ref bar) = ui.batch_bar {
                    bar.inc(1);
                }
            }
            ProbeEvent::BatchCompleted { batch, active } => {
                if let Some(bar) = ui.batch_bar.take() {
                    bar.finish_and_clear();
                }
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message(format!("Batch {} done: {} active", batch, active));
                }
            }
            ProbeEvent::BatchFailed { batch, reason } => {
                if let Some(bar) = ui.batch_bar.take() {
                    bar.finish_and_clear();
                }
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message(format!("⚠️ Batch {} FAILED: {}", batch, reason));
                }
            }
            ProbeEvent::RunCompleted { tested, active } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.finish_with_message(format!(
                        "✅ DONE: {} active / {} tested",
                        active, tested
                    ));
                }
            }
            ProbeEvent::RunFailed { error } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.abandon_with_message(format!("❌ FAILED: {}", error));
                }
            }
        }
    }
}
