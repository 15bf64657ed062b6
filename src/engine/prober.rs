//! 探测执行池 (Prober Pool)
//!
//! 受限并发的 SOCKS5 HTTP 探测。每个 worker 自持客户端与连接，
//! 除结果汇集外不共享任何可变状态。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::core::config::AppConfig;
use crate::core::error::{ProbeError, Result};
use crate::core::event::EventSender;
use crate::core::model::{LinkedDescriptor, ProbeResult};
use crate::engine::batch;

pub struct ProberPool {
    test_url: String,
    timeout: Duration,
    max_workers: usize,
    base_port: u16,
}

impl ProberPool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            test_url: config.test_url.clone(),
            timeout: Duration::from_secs(config.timeout),
            max_workers: config.max_workers,
            base_port: config.base_port,
        }
    }

    /// 并发探测一个就绪批次的全部槽位
    ///
    /// 完成顺序不保证；每个结果在落地时向事件总线汇报进度。
    pub async fn probe_batch(
        &self,
        batch: &[LinkedDescriptor],
        events: &EventSender,
    ) -> Vec<ProbeResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();

        for slot in batch::slots(batch, self.base_port) {
            let semaphore = semaphore.clone();
            let link = slot.entry.link.clone();
            let test_url = self.test_url.clone();
            let total_timeout = self.timeout;
            let port = slot.port;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return ProbeResult::fail(link, e.to_string()),
                };
                probe_one(&test_url, port, total_timeout, link).await
            });
        }

        let mut results = Vec::with_capacity(batch.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    events.probe_finished(result.is_success());
                    results.push(result);
                }
                Err(e) => error!("Probe task join error: {}", e),
            }
        }
        results
    }
}

/// 单槽位探测：经由本地 SOCKS5 入站请求测活 URL
async fn probe_one(
    test_url: &str,
    port: u16,
    total_timeout: Duration,
    link: String,
) -> ProbeResult {
    let started = Instant::now();
    let outcome = execute_probe(test_url, port, total_timeout).await;
    let latency = (started.elapsed().as_secs_f64() * 1000.0).round() as i64;

    match outcome {
        Ok(()) => ProbeResult::success(link, latency),
        Err(e) => ProbeResult::fail(link, e.probe_msg()),
    }
}

async fn execute_probe(test_url: &str, port: u16, total_timeout: Duration) -> Result<()> {
    let proxy = reqwest::Proxy::all(format!("socks5://127.0.0.1:{}", port))?;
    let client = reqwest::Client::builder()
        .proxy(proxy)
        .timeout(total_timeout)
        .build()?;

    let response = client.get(test_url).send().await.map_err(classify)?;
    let status = response.status().as_u16();
    // 读完响应体，延迟覆盖完整响应而非仅首包
    response.bytes().await.map_err(classify)?;

    match status {
        200 | 204 => Ok(()),
        other => Err(ProbeError::ProbeHttp(other)),
    }
}

fn classify(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::ProbeTimeout
    } else {
        ProbeError::ProbeTransport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::create_event_channel;
    use crate::core::model::ProxyDescriptor;

    fn sample_batch(n: usize) -> Vec<LinkedDescriptor> {
        (0..n)
            .map(|i| LinkedDescriptor {
                link: format!("trojan://pw@h{}.example.com:443", i),
                descriptor: ProxyDescriptor::Trojan {
                    tag: format!("node-{}", i),
                    server: format!("h{}.example.com", i),
                    server_port: 443,
                    password: "pw".to_string(),
                    tls: None,
                    transport: None,
                },
            })
            .collect()
    }

    #[tokio::test]
    async fn probe_batch_yields_one_result_per_slot() {
        // 无人监听的端口：所有探测都应快速失败而非挂起
        let base_port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let config = AppConfig {
            base_port,
            timeout: 1,
            max_workers: 2,
            ..AppConfig::default()
        };
        let pool = ProberPool::new(&config);
        let (events, _receiver) = create_event_channel();

        let batch = sample_batch(3);
        let mut results = pool.probe_batch(&batch, &events).await;
        assert_eq!(results.len(), 3);

        results.sort_by(|a, b| a.config.cmp(&b.config));
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.config, batch[i].link);
            assert!(!result.is_success());
            assert_eq!(result.latency, -1);
            assert!(!result.msg.is_empty());
            assert!(result.msg.chars().count() <= 30);
        }
    }
}
