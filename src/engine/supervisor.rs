//! 核心进程监督器 (Core Process Supervisor)
//!
//! 一个批次对应一次核心进程生命周期：物化多入站/出站配置、拉起子进程、
//! 轮询首端口就绪、批次收尾时强制回收。失败批次的配置保留为现场工件。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::core::config::AppConfig;
use crate::core::error::{ProbeError, Result};
use crate::core::model::LinkedDescriptor;
use crate::engine::batch;

/// 就绪探测总预算
const READY_BUDGET: Duration = Duration::from_secs(5);
/// 单次 TCP 连接超时
const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);
/// 就绪轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 错误日志截断长度
const STDERR_PREVIEW: usize = 300;

/// 核心进程基础设施控制器
pub struct CoreSupervisor {
    /// 二进制文件路径
    executable: PathBuf,
    /// 运行时配置文件路径
    config_path: PathBuf,
    /// 批内首端口
    base_port: u16,
}

/// 活跃批次的核心进程句柄
#[derive(Debug)]
pub struct CoreHandle {
    child: Child,
    config_path: PathBuf,
}

impl CoreSupervisor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            executable: PathBuf::from(&config.core_path),
            config_path: PathBuf::from(&config.files.runtime_config),
            base_port: config.base_port,
        }
    }

    /// 物化批次配置并拉起核心进程，等待首端口就绪
    ///
    /// 失败时内部完成回收并按需保留现场工件，调用方只需将整批标记失败。
    pub async fn launch(
        &self,
        batch: &[LinkedDescriptor],
        batch_id: usize,
    ) -> Result<CoreHandle> {
        let document = generate_mass_config(batch, self.base_port)?;
        tokio::fs::write(&self.config_path, serde_json::to_string_pretty(&document)?).await?;

        let mut child = match Command::new(&self.executable)
            .arg("run")
            .arg("-c")
            .arg(&self.config_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true) // RAII: 释放资源时自动终止
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.persist_failed_config(batch_id).await;
                return Err(ProbeError::CoreSpawn(e.to_string()));
            }
        };

        if wait_for_port(self.base_port, READY_BUDGET).await {
            debug!("Core ready for batch {} ({} slots)", batch_id, batch.len());
            return Ok(CoreHandle {
                child,
                config_path: self.config_path.clone(),
            });
        }

        // 首端口未打开：区分进程已退出与仍在挣扎两种情形
        match child.try_wait() {
            Ok(Some(status)) => {
                let stderr_tail = read_stderr(&mut child).await;
                warn!(
                    "Batch {} failed, core exited ({}): {}",
                    batch_id,
                    status,
                    stderr_tail.chars().take(STDERR_PREVIEW).collect::<String>()
                );
                self.persist_failed_config(batch_id).await;
            }
            _ => {
                warn!("Batch {}: core start timeout (no error log)", batch_id);
                let _ = child.start_kill();
            }
        }
        let _ = child.wait().await;
        Err(ProbeError::CoreUnready(self.base_port))
    }

    /// 保留失败批次的配置供事后排查
    async fn persist_failed_config(&self, batch_id: usize) {
        let artifact = self
            .config_path
            .with_file_name(format!("failed_batch_{}.json", batch_id));
        match tokio::fs::copy(&self.config_path, &artifact).await {
            Ok(_) => info!("Saved failing config to {}", artifact.display()),
            Err(e) => warn!("Could not persist failing config: {}", e),
        }
    }
}

impl CoreHandle {
    /// 终止核心进程并等待退出
    ///
    /// 运行时配置仅在子进程干净退出时删除，异常退出一律保留现场。
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.child.start_kill();
        let status = self.child.wait().await?;
        if status.success() {
            let _ = tokio::fs::remove_file(&self.config_path).await;
        }
        Ok(())
    }
}

/// 轮询 TCP 连接直到端口打开或预算耗尽
pub(crate) async fn wait_for_port(port: u16, budget: Duration) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let deadline = Instant::now() + budget;

    while Instant::now() < deadline {
        if let Ok(Ok(_)) = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    false
}

async fn read_stderr(child: &mut Child) -> String {
    let Some(mut stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut buf = String::new();
    let _ = stderr.read_to_string(&mut buf).await;
    buf.trim().to_string()
}

/// 合成单批次的多入站/出站配置文档
///
/// 槽位 i 对应入站 `in-i` (127.0.0.1:base+i) 与改签为 `proxy-i` 的出站，
/// 路由规则逐槽映射，日志级别压制常规输出。
pub fn generate_mass_config(
    batch: &[LinkedDescriptor],
    base_port: u16,
) -> Result<serde_json::Value> {
    let mut inbounds = Vec::with_capacity(batch.len());
    let mut outbounds = Vec::with_capacity(batch.len() + 1);
    let mut rules = Vec::with_capacity(batch.len());

    outbounds.push(json!({ "type": "direct", "tag": "direct" }));

    for slot in batch::slots(batch, base_port) {
        let inbound_tag = format!("in-{}", slot.index);
        let outbound_tag = format!("proxy-{}", slot.index);

        inbounds.push(json!({
            "type": "socks",
            "tag": inbound_tag,
            "listen": "127.0.0.1",
            "listen_port": slot.port
        }));

        let mut outbound = slot.entry.descriptor.clone();
        outbound.set_tag(outbound_tag.clone());
        outbounds.push(serde_json::to_value(&outbound)?);

        rules.push(json!({ "inbound": inbound_tag, "outbound": outbound_tag }));
    }

    Ok(json!({
        "log": { "level": "panic" },
        "inbounds": inbounds,
        "outbounds": outbounds,
        "route": { "rules": rules, "auto_detect_interface": true }
    }))
}
