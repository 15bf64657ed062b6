//! 测试流水线 (Latency Test Pipeline)
//!
//! 总调度：去重 → 解析 → 过滤 → 串行批次循环 × 重试轮次 → 排序收尾。
//! 批次之间严格串行（端口复用且受文件描述符预算约束），批内并发交给探测池。

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::AppConfig;
use crate::core::error::{ProbeError, Result};
use crate::core::event::{EventSender, ProbeEvent};
use crate::core::model::{LinkedDescriptor, ProbeResult};
use crate::dedup;
use crate::engine::filter::filter_supported;
use crate::engine::prober::ProberPool;
use crate::engine::supervisor::CoreSupervisor;
use crate::parser::parse_link;
use crate::sink::ResultSink;

/// 运行摘要
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// 输入链接总数
    pub input: usize,
    /// 通过解析与过滤的描述符数
    pub supported: usize,
    /// 最终确认活跃的链接数
    pub active: usize,
}

/// 流水线驱动器
pub struct ProbePipeline {
    config: Arc<AppConfig>,
    supervisor: CoreSupervisor,
    prober: ProberPool,
    events: EventSender,
    shutdown: CancellationToken,
}

impl ProbePipeline {
    pub fn new(config: Arc<AppConfig>, events: EventSender, shutdown: CancellationToken) -> Self {
        Self {
            supervisor: CoreSupervisor::new(&config),
            prober: ProberPool::new(&config),
            config,
            events,
            shutdown,
        }
    }

    /// 执行完整测试流程
    ///
    /// 每一轮只测上一轮的残余集；成功即落盘，非末轮失败静默重试，
    /// 末轮失败直接丢弃，结果表只含确认的成功项。
    pub async fn run(&self, links: Vec<String>) -> Result<RunSummary> {
        match self.run_inner(links).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.events.emit(ProbeEvent::RunFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(&self, links: Vec<String>) -> Result<RunSummary> {
        let input = links.len();
        let (unique, _report) = dedup::dedupe(links);

        let parsed: Vec<LinkedDescriptor> = unique
            .into_iter()
            .filter_map(|link| match parse_link(&link) {
                Ok(descriptor) => Some(LinkedDescriptor { link, descriptor }),
                Err(e) => {
                    debug!("Dropping link: {}", e);
                    None
                }
            })
            .collect();

        let supported = filter_supported(parsed);
        let supported_count = supported.len();
        info!(
            "Found {} supported descriptors from {} input links",
            supported_count, input
        );
        self.events.emit(ProbeEvent::RunStarted {
            input,
            supported: supported_count,
        });

        let mut sink = ResultSink::create(&self.config.files)?;

        let mut pending = supported;
        for round in 1..=self.config.max_retries {
            if pending.is_empty() {
                info!("All descriptors verified active, stopping retries early");
                break;
            }
            if self.shutdown.is_cancelled() {
                return Err(ProbeError::Custom("run cancelled".to_string()));
            }

            self.events
                .round_started(round, self.config.max_retries, pending.len());
            info!(
                "--- Round {}/{}: {} queued for testing ---",
                round,
                self.config.max_retries,
                pending.len()
            );
            pending = self.run_round(pending, &mut sink).await?;
        }

        info!(
            "Finalizing and sorting {} result rows",
            sink.active_count()
        );
        let active = sink.finalize()?;
        self.events.emit(ProbeEvent::RunCompleted {
            tested: input,
            active,
        });

        Ok(RunSummary {
            input,
            supported: supported_count,
            active,
        })
    }

    /// 单轮：串行批次循环，返回残余集
    ///
    /// 残余集按原始链接字面值扣除本轮成功项。
    async fn run_round(
        &self,
        pending: Vec<LinkedDescriptor>,
        sink: &mut ResultSink,
    ) -> Result<Vec<LinkedDescriptor>> {
        let batch_size = self.config.batch_size;
        let total_batches = pending.len().div_ceil(batch_size);
        let mut active_links: HashSet<String> = HashSet::new();

        for (idx, batch) in pending.chunks(batch_size).enumerate() {
            if self.shutdown.is_cancelled() {
                return Err(ProbeError::Custom("run cancelled".to_string()));
            }

            let batch_id = idx + 1;
            self.events.batch_started(batch_id, total_batches, batch.len());

            let results = self.run_batch(batch, batch_id).await;
            let active: Vec<&ProbeResult> = results.iter().filter(|r| r.is_success()).collect();

            // 落盘失败是致命错误，立即终止整个运行
            sink.append(&active)?;
            self.events.batch_completed(batch_id, active.len());
            info!(
                "Batch {}/{} done: {} active",
                batch_id,
                total_batches,
                active.len()
            );

            active_links.extend(active.iter().map(|r| r.config.clone()));
        }

        Ok(pending
            .into_iter()
            .filter(|entry| !active_links.contains(&entry.link))
            .collect())
    }

    /// 单批：核心就绪后并发探测；核心未能就绪时整批标记失败
    async fn run_batch(&self, batch: &[LinkedDescriptor], batch_id: usize) -> Vec<ProbeResult> {
        match self.supervisor.launch(batch, batch_id).await {
            Ok(handle) => {
                let results = self.prober.probe_batch(batch, &self.events).await;
                if let Err(e) = handle.shutdown().await {
                    warn!("Core teardown error: {}", e);
                }
                results
            }
            Err(e) => {
                self.events.emit(ProbeEvent::BatchFailed {
                    batch: batch_id,
                    reason: e.to_string(),
                });
                batch
                    .iter()
                    .map(|entry| ProbeResult::fail(entry.link.clone(), "Batch Failed".to_string()))
                    .collect()
            }
        }
    }
}
