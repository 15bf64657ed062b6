//! vmess 方言：Base64 负载内嵌 JSON 对象

use std::collections::HashMap;

use serde_json::Value;

use crate::core::error::{ProbeError, Result};
use crate::core::model::{ProxyDescriptor, TlsOutbound, Transport};
use crate::utils::decode_base64_auto;

/// 兼容字符串与数字两种表示的整数字段
fn json_as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str()?.parse().ok())
}

fn json_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// 解析 `vmess://` 之后的 Base64 负载
pub fn parse(body: &str) -> Result<ProxyDescriptor> {
    let decoded = decode_base64_auto(body)
        .map_err(|_| ProbeError::MalformedLink("vmess: invalid base64".to_string()))?;
    let v: Value = serde_json::from_str(&decoded)
        .map_err(|_| ProbeError::MalformedLink("vmess: invalid json payload".to_string()))?;

    let server = json_str(&v, "add")
        .ok_or_else(|| ProbeError::MalformedLink("vmess: missing add".to_string()))?
        .to_string();
    let server_port = v
        .get("port")
        .and_then(json_as_u64)
        .ok_or_else(|| ProbeError::MalformedLink("vmess: missing port".to_string()))?
        as u16;
    let uuid = json_str(&v, "id")
        .ok_or_else(|| ProbeError::MalformedLink("vmess: missing id".to_string()))?
        .to_string();
    let alter_id = v.get("aid").and_then(json_as_u64).unwrap_or(0) as u32;
    let security = json_str(&v, "scy").unwrap_or("auto").to_string();
    let tag = json_str(&v, "ps").unwrap_or("vmess-proxy").to_string();

    // "raw" 是 "tcp" 的新式别名
    let mut net = json_str(&v, "net").unwrap_or("tcp");
    if net == "raw" {
        net = "tcp";
    }

    let transport = match net {
        "" | "tcp" | "kcp" | "quic" => None,
        "ws" | "httpupgrade" => {
            let mut headers = HashMap::new();
            headers.insert(
                "Host".to_string(),
                json_str(&v, "host").unwrap_or("").to_string(),
            );
            Some(Transport {
                kind: net.to_string(),
                path: Some(json_str(&v, "path").unwrap_or("/").to_string()),
                headers: Some(headers),
                service_name: None,
            })
        }
        "grpc" => Some(Transport {
            kind: net.to_string(),
            path: None,
            headers: None,
            service_name: Some(json_str(&v, "path").unwrap_or("").to_string()),
        }),
        other => Some(Transport::bare(other)),
    };

    let tls = match json_str(&v, "tls") {
        Some("tls") => Some(TlsOutbound {
            enabled: true,
            server_name: json_str(&v, "sni")
                .filter(|s| !s.is_empty())
                .or_else(|| json_str(&v, "host"))
                .map(String::from),
            insecure: Some(true),
            utls: None,
            reality: None,
        }),
        _ => None,
    };

    Ok(ProxyDescriptor::Vmess {
        tag,
        server,
        server_port,
        uuid,
        security,
        alter_id,
        transport,
        tls,
    })
}
