//! 代理描述符数据模型 (Proxy Descriptor Model)
//!
//! 描述符是链接的规范化记录，serde 序列化结果即核心进程的出站对象，
//! 因此字段命名与线上 JSON 结构保持一一对应。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 支持的代理协议变体 (Protocol Variants)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProxyDescriptor {
    Shadowsocks {
        tag: String,
        server: String,
        server_port: u16,
        method: String,
        password: String,
    },
    Vmess {
        tag: String,
        server: String,
        server_port: u16,
        uuid: String,
        security: String,
        alter_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsOutbound>,
    },
    Vless {
        tag: String,
        server: String,
        server_port: u16,
        uuid: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        flow: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsOutbound>,
    },
    Trojan {
        tag: String,
        server: String,
        server_port: u16,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsOutbound>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
    },
    Tuic {
        tag: String,
        server: String,
        server_port: u16,
        uuid: String,
        password: String,
        congestion_control: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsOutbound>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
    },
    Hysteria2 {
        tag: String,
        server: String,
        server_port: u16,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        obfs: Option<ObfsConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tls: Option<TlsOutbound>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
    },
}

impl ProxyDescriptor {
    /// 提取节点标识标签
    pub fn tag(&self) -> &str {
        match self {
            ProxyDescriptor::Shadowsocks { tag, .. }
            | ProxyDescriptor::Vmess { tag, .. }
            | ProxyDescriptor::Vless { tag, .. }
            | ProxyDescriptor::Trojan { tag, .. }
            | ProxyDescriptor::Tuic { tag, .. }
            | ProxyDescriptor::Hysteria2 { tag, .. } => tag,
        }
    }

    pub fn set_tag(&mut self, new_tag: String) {
        match self {
            ProxyDescriptor::Shadowsocks { tag, .. }
            | ProxyDescriptor::Vmess { tag, .. }
            | ProxyDescriptor::Vless { tag, .. }
            | ProxyDescriptor::Trojan { tag, .. }
            | ProxyDescriptor::Tuic { tag, .. }
            | ProxyDescriptor::Hysteria2 { tag, .. } => *tag = new_tag,
        }
    }

    pub fn server(&self) -> &str {
        match self {
            ProxyDescriptor::Shadowsocks { server, .. }
            | ProxyDescriptor::Vmess { server, .. }
            | ProxyDescriptor::Vless { server, .. }
            | ProxyDescriptor::Trojan { server, .. }
            | ProxyDescriptor::Tuic { server, .. }
            | ProxyDescriptor::Hysteria2 { server, .. } => server,
        }
    }

    pub fn server_port(&self) -> u16 {
        match self {
            ProxyDescriptor::Shadowsocks { server_port, .. }
            | ProxyDescriptor::Vmess { server_port, .. }
            | ProxyDescriptor::Vless { server_port, .. }
            | ProxyDescriptor::Trojan { server_port, .. }
            | ProxyDescriptor::Tuic { server_port, .. }
            | ProxyDescriptor::Hysteria2 { server_port, .. } => *server_port,
        }
    }

    /// 传输层子记录 (Shadowsocks 方言没有该字段)
    pub fn transport(&self) -> Option<&Transport> {
        match self {
            ProxyDescriptor::Shadowsocks { .. } => None,
            ProxyDescriptor::Vmess { transport, .. }
            | ProxyDescriptor::Vless { transport, .. }
            | ProxyDescriptor::Trojan { transport, .. }
            | ProxyDescriptor::Tuic { transport, .. }
            | ProxyDescriptor::Hysteria2 { transport, .. } => transport.as_ref(),
        }
    }

    /// 剥离传输层子记录
    pub fn clear_transport(&mut self) {
        match self {
            ProxyDescriptor::Shadowsocks { .. } => {}
            ProxyDescriptor::Vmess { transport, .. }
            | ProxyDescriptor::Vless { transport, .. }
            | ProxyDescriptor::Trojan { transport, .. }
            | ProxyDescriptor::Tuic { transport, .. }
            | ProxyDescriptor::Hysteria2 { transport, .. } => *transport = None,
        }
    }
}

/// 传输层封装协议 (Transport Layer)
///
/// vmess 方言可携带任意 `net` 取值，保持为扁平记录以便过滤器按取值裁剪。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl Transport {
    /// 仅携带类型的裸记录
    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: None,
            headers: None,
            service_name: None,
        }
    }
}

/// 安全传输配置 (TLS/uTLS/Reality)
///
/// `insecure` 恒为 true：这是测量场景的刻意选择，不构成任何安全策略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsOutbound {
    pub enabled: bool,
    pub server_name: Option<String>,
    pub insecure: Option<bool>,
    pub utls: Option<UtlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtlsConfig {
    pub enabled: bool,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealityConfig {
    pub enabled: bool,
    pub public_key: String,
    pub short_id: String,
}

/// hysteria2 混淆层
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObfsConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub password: String,
}

/// 原始链接与描述符的配对 (Linked Descriptor)
///
/// 原始链接原样保留用于报告，描述符仅用于驱动核心进程。
#[derive(Debug, Clone)]
pub struct LinkedDescriptor {
    pub link: String,
    pub descriptor: ProxyDescriptor,
}

/// 探测结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    Fail,
}

/// 单次探测结果，字段顺序即结果表列序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub config: String,
    pub latency: i64,
    pub status: ProbeStatus,
    pub msg: String,
}

impl ProbeResult {
    pub fn success(link: String, latency: i64) -> Self {
        Self {
            config: link,
            latency,
            status: ProbeStatus::Success,
            msg: "OK".to_string(),
        }
    }

    pub fn fail(link: String, msg: String) -> Self {
        Self {
            config: link,
            latency: -1,
            status: ProbeStatus::Fail,
            msg,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_serializes_with_type_tag() {
        let desc = ProxyDescriptor::Shadowsocks {
            tag: "node".to_string(),
            server: "1.2.3.4".to_string(),
            server_port: 8388,
            method: "aes-256-gcm".to_string(),
            password: "pw".to_string(),
        };
        let v = serde_json::to_value(&desc).unwrap();
        assert_eq!(v["type"], "shadowsocks");
        assert_eq!(v["server_port"], 8388);
    }

    #[test]
    fn empty_optionals_are_omitted_from_wire_form() {
        let desc = ProxyDescriptor::Vless {
            tag: "node".to_string(),
            server: "example.com".to_string(),
            server_port: 443,
            uuid: "uuid".to_string(),
            flow: String::new(),
            transport: None,
            tls: None,
        };
        let v = serde_json::to_value(&desc).unwrap();
        assert!(v.get("flow").is_none());
        assert!(v.get("transport").is_none());
        assert!(v.get("tls").is_none());
    }

    #[test]
    fn hysteria2_variant_uses_plain_tag() {
        let desc = ProxyDescriptor::Hysteria2 {
            tag: "h".to_string(),
            server: "h.example.com".to_string(),
            server_port: 443,
            password: "secret".to_string(),
            obfs: None,
            tls: None,
            transport: None,
        };
        assert_eq!(serde_json::to_value(&desc).unwrap()["type"], "hysteria2");
    }

    #[test]
    fn probe_result_constructors() {
        let ok = ProbeResult::success("link".to_string(), 120);
        assert!(ok.is_success());
        assert_eq!(ok.msg, "OK");

        let bad = ProbeResult::fail("link".to_string(), "Timeout".to_string());
        assert_eq!(bad.latency, -1);
        assert_eq!(bad.status.to_string(), "fail");
    }
}
