//! IP 地址处理工具
//!
//! 从原始请求信息中解析客户端地址：
//! - 私有 IP / localhost 连接自动视为反向代理，信任 X-Forwarded-For / X-Real-IP
//! - 公网直连使用连接 IP（防止伪造）
//! - 全部缺失时返回 "unknown"

use std::net::{IpAddr, SocketAddr};

use tracing::trace;

pub const UNKNOWN_ADDRESS: &str = "unknown";

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 去掉端口号，"1.2.3.4:5678" -> "1.2.3.4"，"[::1]:80" -> "::1"
pub fn strip_port(addr: &str) -> String {
    let addr = addr.trim();
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        return socket_addr.ip().to_string();
    }
    addr.to_string()
}

/// 从 X-Forwarded-For / X-Real-IP 取转发的 IP
///
/// X-Forwarded-For 取第一个，即原始客户端 IP
pub fn forwarded_ip(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| {
            real_ip
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
}

/// 解析客户端地址
pub fn resolve_client_ip(
    peer_addr: Option<&str>,
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
) -> String {
    let peer = peer_addr
        .map(strip_port)
        .filter(|s| !s.is_empty());

    let Some(peer) = peer else {
        // 无连接信息（例如 Unix Socket 后面的代理）
        return forwarded_ip(forwarded_for, real_ip)
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());
    };

    if let Ok(ip_addr) = peer.parse::<IpAddr>()
        && is_private_or_local(&ip_addr)
        && let Some(real) = forwarded_ip(forwarded_for, real_ip)
    {
        trace!("Auto-detect proxy (private IP {}): using {}", peer, real);
        return real;
    }

    peer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("1.2.3.4:5678"), "1.2.3.4");
        assert_eq!(strip_port("[::1]:80"), "::1");
        assert_eq!(strip_port("1.2.3.4"), "1.2.3.4");
    }

    #[test]
    fn test_proxy_headers_trusted_behind_private_peer() {
        assert_eq!(
            resolve_client_ip(Some("127.0.0.1:9000"), Some("203.0.113.7, 10.0.0.2"), None),
            "203.0.113.7"
        );
        assert_eq!(
            resolve_client_ip(Some("10.0.0.5"), None, Some("198.51.100.1")),
            "198.51.100.1"
        );
    }

    #[test]
    fn test_public_peer_ignores_headers() {
        assert_eq!(
            resolve_client_ip(Some("8.8.8.8:443"), Some("1.1.1.1"), None),
            "8.8.8.8"
        );
    }

    #[test]
    fn test_missing_everything_is_unknown() {
        assert_eq!(resolve_client_ip(None, None, None), UNKNOWN_ADDRESS);
        assert_eq!(resolve_client_ip(Some(""), Some(" "), None), UNKNOWN_ADDRESS);
        assert_eq!(
            resolve_client_ip(None, Some("203.0.113.9"), None),
            "203.0.113.9"
        );
    }
}
