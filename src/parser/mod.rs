//! 链接解析器 (Link Parser)
//!
//! 将多方言代理链接规范化为统一描述符。按 scheme 前缀分发：
//! vmess 与旧式 shadowsocks 携带 Base64 负载，其余方言共享标准 URI 形态。

mod shadowsocks;
mod standard;
mod vmess;

pub use shadowsocks::VALID_SS_METHODS;
pub use standard::StandardVariant;

use crate::core::error::{ProbeError, Result};
use crate::core::model::ProxyDescriptor;

/// 解析单条链接
///
/// 不可恢复的解析失败返回 [`ProbeError::MalformedLink`]，调用方直接丢弃该链接。
pub fn parse_link(link: &str) -> Result<ProxyDescriptor> {
    let link = link.trim();

    if let Some(body) = link.strip_prefix("vmess://") {
        return vmess::parse(body);
    }
    if link.starts_with("ss://") {
        return shadowsocks::parse(link);
    }
    if link.starts_with("vless://") {
        return standard::parse(link, StandardVariant::Vless);
    }
    if link.starts_with("trojan://") {
        return standard::parse(link, StandardVariant::Trojan);
    }
    if link.starts_with("tuic://") {
        return standard::parse(link, StandardVariant::Tuic);
    }
    if link.starts_with("hysteria2://") || link.starts_with("hy2://") {
        return standard::parse(link, StandardVariant::Hysteria2);
    }

    Err(ProbeError::MalformedLink(format!(
        "unsupported scheme: {}",
        link.chars().take(16).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_rejects_unknown_schemes() {
        assert!(parse_link("socks5://1.2.3.4:1080").is_err());
        assert!(parse_link("").is_err());
    }

    #[test]
    fn dispatch_trims_surrounding_whitespace() {
        let desc = parse_link("  trojan://pw@example.com:443#node  ").unwrap();
        assert_eq!(desc.server(), "example.com");
        assert_eq!(desc.server_port(), 443);
    }
}
