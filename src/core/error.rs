//! 错误处理体系 (Error Handling System)
//!
//! 定义领域相关的错误类型与全局 Result 别名。

use thiserror::Error;

/// 全局错误定义 (Probe Domain Errors)
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 链接无法解析为任何受支持方言
    #[error("Malformed link: {0}")]
    MalformedLink(String),

    /// 描述符无法由核心进程承载
    #[error("Unsupported descriptor: {0}")]
    UnsupportedDescriptor(String),

    #[error("Core spawn failure: {0}")]
    CoreSpawn(String),

    /// 就绪探测窗口内核心监听端口未打开
    #[error("Core not ready on port {0}")]
    CoreUnready(u16),

    #[error("Timeout")]
    ProbeTimeout,

    #[error("Status {0}")]
    ProbeHttp(u16),

    #[error("Probe transport error: {0}")]
    ProbeTransport(String),

    #[error("Sink error: {0}")]
    Sink(#[from] csv::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Custom(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// 压缩为结果表中的短消息
    ///
    /// 超时与 HTTP 状态保留固定字面量，其余错误截取前 30 个字符。
    pub fn probe_msg(&self) -> String {
        match self {
            ProbeError::ProbeTimeout => "Timeout".to_string(),
            ProbeError::ProbeHttp(code) => format!("Status {}", code),
            ProbeError::ProbeTransport(detail) => detail.chars().take(30).collect(),
            other => other.to_string().chars().take(30).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_msg_keeps_fixed_literals() {
        assert_eq!(ProbeError::ProbeTimeout.probe_msg(), "Timeout");
        assert_eq!(ProbeError::ProbeHttp(403).probe_msg(), "Status 403");
    }

    #[test]
    fn probe_msg_truncates_long_errors() {
        let msg = ProbeError::ProbeTransport(
            "connection refused by the upstream endpoint after handshake".to_string(),
        )
        .probe_msg();
        assert_eq!(msg.chars().count(), 30);
    }
}
