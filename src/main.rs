//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及系统生命周期管理。

mod core;
mod dedup;
mod engine;
mod parser;
mod sink;
mod ui;
mod utils;

#[cfg(test)]
mod scenarios;

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::AppConfig;
use crate::core::event::create_event_channel;
use crate::engine::ProbePipeline;
use crate::ui::{Ui, get_multi};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保非同步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 批量测试链接的可达性与延迟
    Test {
        /// 输入链接文件（缺省取配置值）
        #[arg(short, long)]
        input: Option<String>,
    },
    /// 仅执行指纹去重并输出唯一链接清单
    Dedupe {
        /// 输入链接文件（缺省取配置值）
        #[arg(short, long)]
        input: Option<String>,
        /// 去重结果输出路径
        #[arg(short, long, default_value = "unique-configs.txt")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    let config = Arc::new(AppConfig::load()?);
    let cli = Cli::parse();

    match cli.command {
        Commands::Test { input } => {
            if !Path::new(&config.core_path).exists() {
                error!("Core not found at: {}", config.core_path);
                return Ok(());
            }

            let input_path = input.unwrap_or_else(|| config.files.input.clone());
            info!("Reading links from {}", input_path);
            let links = utils::read_links(&input_path).await?;

            // 建立 UI 事件反馈链路 (Event feedback loop)
            let (event_sender, event_receiver) = create_event_channel();
            let ui_handle = Ui::run(event_receiver);

            // 任务域限制 (Scope isolation for proper RAII cleanup)
            {
                let shutdown = CancellationToken::new();

                // 信号处理与优雅退出 (Signal Handling)
                let shutdown_clone = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown_clone.cancel();
                    }
                });

                let pipeline = ProbePipeline::new(config.clone(), event_sender, shutdown);
                match pipeline.run(links).await {
                    Ok(summary) => {
                        info!("========================================");
                        info!("Testing complete");
                        info!("   Total tested: {}", summary.input);
                        info!("   Supported:    {}", summary.supported);
                        info!("   Total active: {}", summary.active);
                        info!("   Saved to: {}", config.files.results_csv);
                        info!("             {}", config.files.active_links);
                        info!("========================================");
                    }
                    Err(e) => error!("Run aborted: {}", e),
                }
            }

            // Await UI shutdown after event sender closure
            let _ = ui_handle.await;
        }
        Commands::Dedupe { input, output } => {
            let input_path = input.unwrap_or_else(|| config.files.input.clone());
            let links = utils::read_links(&input_path).await?;
            let (unique, _report) = dedup::dedupe(links);

            let mut content = unique.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            tokio::fs::write(&output, content).await?;
            info!("Saved unique links to {}", output);
        }
    }

    Ok(())
}
