//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化与环境变量覆盖，支持默认值回退机制。

use std::path::Path;

use bon::Builder;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::error::{ProbeError, Result};

/// 全局应用配置
///
/// 环境变量 (CORE_PATH、BASE_PORT、TEST_URL、TIMEOUT、BATCH_SIZE、
/// MAX_WORKERS、MAX_RETRIES) 覆盖文件配置。
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 核心二进制路径
    #[serde(default = "default_core_path")]
    pub core_path: String,

    /// 本地 SOCKS5 监听端口基准值
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// 连通性探测目标 URL
    #[serde(default = "default_test_url")]
    pub test_url: String,

    /// 单次探测总超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// 单批次描述符数量上限（受文件描述符软限制约束）
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// 批内探测并行度上限
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// 残余集重试轮次上限
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 输入输出文件路径
    #[serde(default)]
    pub files: FilesConfig,
}

/// 文件路径配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct FilesConfig {
    /// 输入链接文件
    #[serde(default = "default_input")]
    pub input: String,
    /// 延迟测试结果表
    #[serde(default = "default_results_csv")]
    pub results_csv: String,
    /// 活跃链接清单
    #[serde(default = "default_active_links")]
    pub active_links: String,
    /// 核心进程运行时配置落盘路径
    #[serde(default = "default_runtime_config")]
    pub runtime_config: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            core_path: default_core_path(),
            base_port: default_base_port(),
            test_url: default_test_url(),
            timeout: default_timeout(),
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            files: FilesConfig::default(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            results_csv: default_results_csv(),
            active_links: default_active_links(),
            runtime_config: default_runtime_config(),
        }
    }
}

fn default_core_path() -> String {
    "bin/sing-box".to_string()
}
fn default_base_port() -> u16 {
    11000
}
fn default_test_url() -> String {
    "http://connectivitycheck.gstatic.com/generate_204".to_string()
}
fn default_timeout() -> u64 {
    5
}
fn default_batch_size() -> usize {
    500
}
fn default_max_workers() -> usize {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_input() -> String {
    "unique-configs.txt".to_string()
}
fn default_results_csv() -> String {
    "active_configs_latency_test_results.csv".to_string()
}
fn default_active_links() -> String {
    "active_configs.txt".to_string()
}
fn default_runtime_config() -> String {
    "mass_config.json".to_string()
}

impl AppConfig {
    /// 从文件系统与环境变量加载配置
    pub fn load() -> Result<Self> {
        let config_path = Path::new("config.toml");
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::default())
            .build()
            .map_err(ProbeError::Config)?;
        settings.try_deserialize().map_err(ProbeError::Config)
    }
}
