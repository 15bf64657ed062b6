//! shadowsocks 方言：SIP002 与旧式 Base64 整体编码并存
//!
//! 兼容路径：
//! 1. SIP002 `ss://base64(method:pass)@host:port`（userinfo 也可能是明文）
//! 2. 旧式 `ss://base64(method:pass@host:port)`
//! 3. IPv6 字面量主机
//! 4. 双重 Base64 编码的 method 字段

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::core::error::{ProbeError, Result};
use crate::core::model::ProxyDescriptor;
use crate::utils::{decode_base64_auto, split_host_port};

/// 核心进程可承载的加密方法全集
pub const VALID_SS_METHODS: &[&str] = &[
    // AEAD
    "aes-128-gcm",
    "aes-192-gcm",
    "aes-256-gcm",
    "chacha20-ietf-poly1305",
    "xchacha20-ietf-poly1305",
    // SS-2022
    "2022-blake3-aes-128-gcm",
    "2022-blake3-aes-256-gcm",
    // Stream / Legacy
    "aes-128-ctr",
    "aes-192-ctr",
    "aes-256-ctr",
    "aes-128-cfb",
    "aes-192-cfb",
    "aes-256-cfb",
    "rc4-md5",
    "chacha20-ietf",
    "xchacha20",
    "chacha20",
];

fn malformed(detail: &str) -> ProbeError {
    ProbeError::MalformedLink(format!("shadowsocks: {}", detail))
}

/// 解析完整的 `ss://` 链接
pub fn parse(link: &str) -> Result<ProxyDescriptor> {
    let mut uri = link
        .strip_prefix("ss://")
        .ok_or_else(|| malformed("missing scheme"))?;

    // 片段即显示名
    let mut tag = "ss-proxy".to_string();
    if let Some((body, fragment)) = uri.split_once('#') {
        uri = body;
        tag = percent_decode_str(fragment)
            .decode_utf8_lossy()
            .trim()
            .to_string();
    }

    // SIP002 插件参数只识别不生效，取出以净化后续解析
    if let Some((body, query)) = uri.split_once('?') {
        uri = body;
        if let Some((_, plugin)) = url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "plugin")
        {
            debug!("Ignoring declared plugin: {}", plugin);
        }
    }

    let (method_raw, password, host, port) = if let Some((userinfo, server_str)) =
        uri.rsplit_once('@')
    {
        // --- SIP002: userinfo@host:port ---
        let decoded = decode_base64_auto(userinfo).unwrap_or_default();
        let (method, password) = if let Some((m, p)) = decoded.split_once(':') {
            (m.to_string(), p.to_string())
        } else if let Some((m, p)) = userinfo.split_once(':') {
            (m.to_string(), p.to_string())
        } else {
            // 罕见：缺失密码，userinfo 仅含 method
            (userinfo.to_string(), String::new())
        };

        let (host, port) =
            split_host_port(server_str).ok_or_else(|| malformed("invalid server format"))?;
        (method, password, host, port)
    } else {
        // --- 旧式: base64(method:pass@host:port) ---
        let decoded = decode_base64_auto(uri).unwrap_or_default();
        let (creds, server_str) = decoded
            .rsplit_once('@')
            .ok_or_else(|| malformed("legacy payload lacks '@'"))?;
        let (host, port) =
            split_host_port(server_str).ok_or_else(|| malformed("invalid server format"))?;

        let (method, password) = match creds.split_once(':') {
            Some((m, p)) => (m.to_string(), p.to_string()),
            None => (creds.to_string(), String::new()),
        };
        (method, password, host, port)
    };

    // method 本身可能再套一层 Base64，解码按原始大小写进行
    let mut method = method_raw.to_lowercase();
    if !VALID_SS_METHODS.contains(&method.as_str())
        && let Ok(decoded) = decode_base64_auto(&method_raw)
    {
        let candidate = decoded.to_lowercase();
        if VALID_SS_METHODS.contains(&candidate.as_str()) {
            method = candidate;
        }
    }

    Ok(ProxyDescriptor::Shadowsocks {
        tag,
        server: host,
        server_port: port,
        method,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};

    fn b64(s: &str) -> String {
        general_purpose::STANDARD.encode(s)
    }

    fn as_parts(desc: &ProxyDescriptor) -> (&str, u16, &str, &str) {
        match desc {
            ProxyDescriptor::Shadowsocks {
                server,
                server_port,
                method,
                password,
                ..
            } => (server, *server_port, method, password),
            other => panic!("expected shadowsocks, got {:?}", other),
        }
    }

    #[test]
    fn parses_sip002_with_base64_userinfo() {
        let link = format!("ss://{}@h.example.com:8388#%E8%8A%82%E7%82%B9", b64("aes-256-gcm:pw"));
        let desc = parse(&link).unwrap();
        let (server, port, method, password) = as_parts(&desc);
        assert_eq!(server, "h.example.com");
        assert_eq!(port, 8388);
        assert_eq!(method, "aes-256-gcm");
        assert_eq!(password, "pw");
        assert_eq!(desc.tag(), "节点");
    }

    #[test]
    fn parses_sip002_with_plain_userinfo() {
        let desc = parse("ss://chacha20-ietf-poly1305:secret@1.2.3.4:9000").unwrap();
        let (server, port, method, password) = as_parts(&desc);
        assert_eq!(server, "1.2.3.4");
        assert_eq!(port, 9000);
        assert_eq!(method, "chacha20-ietf-poly1305");
        assert_eq!(password, "secret");
    }

    #[test]
    fn parses_legacy_whole_body_base64() {
        let link = format!("ss://{}#legacy", b64("aes-256-gcm:pw@h:1"));
        let desc = parse(&link).unwrap();
        let (server, port, method, password) = as_parts(&desc);
        assert_eq!(server, "h");
        assert_eq!(port, 1);
        assert_eq!(method, "aes-256-gcm");
        assert_eq!(password, "pw");
    }

    #[test]
    fn legacy_and_sip002_forms_agree_modulo_tag() {
        let legacy = parse(&format!("ss://{}", b64("aes-256-gcm:pw@h:1"))).unwrap();
        let sip002 = parse(&format!("ss://{}@h:1", b64("aes-256-gcm:pw"))).unwrap();
        assert_eq!(as_parts(&legacy), as_parts(&sip002));
    }

    #[test]
    fn parses_ipv6_literal_host() {
        let link = format!("ss://{}@[2001:db8::1]:8388", b64("aes-128-gcm:pw"));
        let desc = parse(&link).unwrap();
        let (server, port, _, _) = as_parts(&desc);
        assert_eq!(server, "2001:db8::1");
        assert_eq!(port, 8388);
    }

    #[test]
    fn recovers_double_encoded_method() {
        let userinfo = b64(&format!("{}:pw", b64("aes-256-gcm")));
        let desc = parse(&format!("ss://{}@h:8388", userinfo)).unwrap();
        let (_, _, method, _) = as_parts(&desc);
        assert_eq!(method, "aes-256-gcm");
    }

    #[test]
    fn unknown_method_survives_for_downstream_filter() {
        let desc = parse(&format!("ss://{}@h:8388", b64("rc4:pw"))).unwrap();
        let (_, _, method, _) = as_parts(&desc);
        assert_eq!(method, "rc4");
    }

    #[test]
    fn plugin_parameter_is_recognized_but_not_applied() {
        let link = format!(
            "ss://{}@h:8388?plugin=v2ray-plugin%3Bmode%3Dwebsocket#tagged",
            b64("aes-256-gcm:pw")
        );
        let desc = parse(&link).unwrap();
        let (server, port, ..) = as_parts(&desc);
        assert_eq!((server, port), ("h", 8388));
    }

    #[test]
    fn rejects_undecodable_legacy_body() {
        assert!(parse("ss://@@@").is_err());
        assert!(parse(&format!("ss://{}", b64("no-at-sign-here"))).is_err());
    }
}
