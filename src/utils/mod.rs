//! 通用工具函数 (Shared Utilities)

use std::path::Path;

use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};

/// 执行启发式 Base64 解码 (Heuristic Decoding)
///
/// 链接生态中的 Base64 负载在填充与字符表上并不统一，依次尝试各引擎。
pub fn decode_base64_auto(input: &str) -> Result<String> {
    let clean: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let engines = [
        &general_purpose::STANDARD,
        &general_purpose::STANDARD_NO_PAD,
        &general_purpose::URL_SAFE_NO_PAD,
        &general_purpose::URL_SAFE,
    ];

    for engine in engines {
        if let Ok(b) = engine.decode(&clean) {
            return Ok(String::from_utf8_lossy(&b).to_string());
        }
    }
    Err(anyhow!("Base64 decode failed"))
}

/// 拆分 `host:port`，兼容 IPv6 字面量
///
/// 端口永远位于最后一个冒号之后，`[...]` 包裹的 IPv6 地址需要去壳。
pub fn split_host_port(server: &str) -> Option<(String, u16)> {
    let (host, port_str) = server.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let port: u16 = port_str.parse().ok()?;
    Some((host.to_string(), port))
}

/// 读取行分隔的链接文件，忽略空行与首尾空白
pub async fn read_links(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
