//! 描述符过滤器 (Descriptor Filter)
//!
//! 剔除核心进程无法承载的描述符，并剥离无效传输层子记录。

use tracing::debug;

use crate::core::error::{ProbeError, Result};
use crate::core::model::{LinkedDescriptor, ProxyDescriptor};
use crate::parser::VALID_SS_METHODS;

/// 过滤受支持的描述符集合
///
/// 结果是输入的子集；被剔除的描述符不算失败，静默退出流水线。
pub fn filter_supported(descriptors: Vec<LinkedDescriptor>) -> Vec<LinkedDescriptor> {
    let input = descriptors.len();
    let supported: Vec<LinkedDescriptor> = descriptors
        .into_iter()
        .filter_map(|mut entry| match check(&mut entry) {
            Ok(()) => Some(entry),
            Err(e) => {
                debug!("Dropping descriptor [{}]: {}", entry.descriptor.tag(), e);
                None
            }
        })
        .collect();

    debug!("Filter kept {}/{} descriptors", supported.len(), input);
    supported
}

/// 单描述符检查；`xhttp` 传输整体拒绝，退化传输仅剥离
fn check(entry: &mut LinkedDescriptor) -> Result<()> {
    let unsupported = |detail: &str| ProbeError::UnsupportedDescriptor(detail.to_string());

    if let ProxyDescriptor::Shadowsocks {
        method, password, ..
    } = &entry.descriptor
    {
        if !VALID_SS_METHODS.contains(&method.to_lowercase().as_str()) {
            return Err(unsupported("shadowsocks method not in allowed set"));
        }
        if password.is_empty() {
            return Err(unsupported("shadowsocks password is empty"));
        }
    }

    if let Some(transport) = entry.descriptor.transport() {
        match transport.kind.as_str() {
            "xhttp" => return Err(unsupported("xhttp transport")),
            "tcp" | "raw" | "none" | "" => entry.descriptor.clear_transport(),
            _ => {}
        }
    }

    if entry.descriptor.server().is_empty() || entry.descriptor.server_port() == 0 {
        return Err(unsupported("missing server or port"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Transport;

    fn entry(descriptor: ProxyDescriptor) -> LinkedDescriptor {
        LinkedDescriptor {
            link: "link".to_string(),
            descriptor,
        }
    }

    fn ss(method: &str, password: &str) -> LinkedDescriptor {
        entry(ProxyDescriptor::Shadowsocks {
            tag: "t".to_string(),
            server: "h".to_string(),
            server_port: 8388,
            method: method.to_string(),
            password: password.to_string(),
        })
    }

    fn vmess_with_transport(kind: &str) -> LinkedDescriptor {
        entry(ProxyDescriptor::Vmess {
            tag: "t".to_string(),
            server: "h".to_string(),
            server_port: 443,
            uuid: "u".to_string(),
            security: "auto".to_string(),
            alter_id: 0,
            transport: Some(Transport::bare(kind)),
            tls: None,
        })
    }

    #[test]
    fn shadowsocks_outside_allowed_methods_is_dropped() {
        assert!(filter_supported(vec![ss("rc4", "pw")]).is_empty());
        assert_eq!(filter_supported(vec![ss("aes-256-gcm", "pw")]).len(), 1);
    }

    #[test]
    fn shadowsocks_empty_password_is_dropped() {
        assert!(filter_supported(vec![ss("aes-256-gcm", "")]).is_empty());
    }

    #[test]
    fn xhttp_transport_rejects_whole_descriptor() {
        assert!(filter_supported(vec![vmess_with_transport("xhttp")]).is_empty());
    }

    #[test]
    fn degenerate_transports_are_stripped_but_descriptor_survives() {
        for kind in ["tcp", "raw", "none", ""] {
            let kept = filter_supported(vec![vmess_with_transport(kind)]);
            assert_eq!(kept.len(), 1, "kind {:?}", kind);
            assert!(kept[0].descriptor.transport().is_none(), "kind {:?}", kind);
        }
    }

    #[test]
    fn real_transports_pass_untouched() {
        let kept = filter_supported(vec![vmess_with_transport("ws")]);
        assert_eq!(kept[0].descriptor.transport().unwrap().kind, "ws");
    }

    #[test]
    fn empty_server_is_dropped() {
        let bad = entry(ProxyDescriptor::Trojan {
            tag: "t".to_string(),
            server: String::new(),
            server_port: 443,
            password: "pw".to_string(),
            tls: None,
            transport: None,
        });
        assert!(filter_supported(vec![bad]).is_empty());
    }
}
