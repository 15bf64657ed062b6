//! 语义指纹 (Semantic Fingerprint)
//!
//! 为链接生成稳定的身份键：同一端点的修饰性变体（备注、参数顺序、
//! Base64 填充、主机大小写）收敛到同一指纹。无法解析的链接不产生指纹。

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use crate::utils::decode_base64_auto;

/// 标准 URI 指纹涵盖的功能性参数
const RELEVANT_PARAMS: &[&str] = &["security", "sni", "host", "type", "serviceName", "path"];

/// 生成链接指纹；`None` 表示无法判定身份，调用方应丢弃该链接
pub fn generate(link: &str) -> Option<String> {
    if link.starts_with("vmess://") {
        vmess_fingerprint(link)
    } else if link.starts_with("ss://") {
        ss_fingerprint(link)
    } else if link.starts_with("vless://")
        || link.starts_with("trojan://")
        || link.starts_with("tuic://")
        || link.starts_with("hysteria")
    {
        url_fingerprint(link)
    } else {
        // 未知方言退化为链接本身，按字面值判重
        Some(link.to_string())
    }
}

/// JSON 字段统一字符串化：字符串取原文，数字取十进制表示
fn field_str(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn vmess_fingerprint(link: &str) -> Option<String> {
    let payload = link.strip_prefix("vmess://")?;
    let decoded = decode_base64_auto(payload).ok()?;
    let data: Value = serde_json::from_str(&decoded).ok()?;

    // 仅取功能性字段，忽略 'ps' 备注
    Some(format!(
        "vmess|{}|{}|{}|{}|{}|{}|{}",
        field_str(&data, "add").to_lowercase(),
        field_str(&data, "port"),
        field_str(&data, "id"),
        field_str(&data, "net"),
        field_str(&data, "path"),
        field_str(&data, "host"),
        field_str(&data, "sni"),
    ))
}

fn url_fingerprint(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;

    let mut query: HashMap<String, String> = HashMap::new();
    for (k, v) in url.query_pairs() {
        query.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }

    let mut relevant: Vec<String> = RELEVANT_PARAMS
        .iter()
        .filter_map(|key| {
            let val = query.get(*key)?;
            (!val.is_empty()).then(|| format!("{}={}", key, val))
        })
        .collect();
    relevant.sort();

    Some(format!(
        "{}|{}|{}|{}|{}",
        url.scheme(),
        url.host_str()?.to_lowercase(),
        url.port().map(|p| p.to_string()).unwrap_or_default(),
        url.username(),
        relevant.join("|"),
    ))
}

fn ss_fingerprint(link: &str) -> Option<String> {
    let mut body = link.strip_prefix("ss://")?;
    if let Some((stripped, _)) = body.split_once('#') {
        body = stripped;
    }

    // 旧式整体编码的链接先还原再比较，抹平填充差异
    if !body.contains('@')
        && let Ok(decoded) = decode_base64_auto(body)
        && !decoded.is_empty()
    {
        return Some(format!("ss|{}", decoded));
    }
    Some(format!("ss|{}", body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};

    #[test]
    fn vmess_remark_change_keeps_fingerprint() {
        let a = general_purpose::STANDARD
            .encode(r#"{"ps":"first","add":"H.example.com","port":443,"id":"u","net":"ws"}"#);
        let b = general_purpose::STANDARD
            .encode(r#"{"ps":"renamed","add":"h.example.com","port":"443","id":"u","net":"ws"}"#);
        assert_eq!(
            generate(&format!("vmess://{}", a)),
            generate(&format!("vmess://{}", b))
        );
    }

    #[test]
    fn url_fingerprint_ignores_fragment_and_param_order() {
        let a = "vless://u@Example.com:443?security=tls&sni=x.com&type=ws#alpha";
        let b = "vless://u@example.com:443?type=ws&sni=x.com&security=tls#beta";
        assert_eq!(generate(a), generate(b));
    }

    #[test]
    fn url_fingerprint_discriminates_functional_fields() {
        let base = "vless://u@example.com:443?security=tls&sni=x.com";
        for changed in [
            "vless://u@example.org:443?security=tls&sni=x.com",
            "vless://u@example.com:444?security=tls&sni=x.com",
            "vless://v@example.com:443?security=tls&sni=x.com",
            "vless://u@example.com:443?security=tls&sni=y.com",
            "vless://u@example.com:443?security=tls&sni=x.com&type=grpc",
        ] {
            assert_ne!(generate(base), generate(changed), "{}", changed);
        }
    }

    #[test]
    fn ss_fingerprint_flattens_base64_padding() {
        let body = general_purpose::STANDARD.encode("aes-256-gcm:pw@h:8388");
        let padded = format!("ss://{}#a", body);
        let unpadded = format!("ss://{}#b", body.trim_end_matches('='));
        assert_eq!(generate(&padded), generate(&unpadded));
    }

    #[test]
    fn undecodable_links_yield_no_fingerprint() {
        assert_eq!(generate("vmess://%%%"), None);
        assert_eq!(generate("vless://u@ex ample.com:443"), None);
    }

    #[test]
    fn unknown_scheme_falls_back_to_literal_identity() {
        assert_eq!(
            generate("wireguard://peer").as_deref(),
            Some("wireguard://peer")
        );
    }
}
