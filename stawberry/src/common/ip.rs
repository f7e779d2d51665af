//! クライアントIP解決ユーティリティ
//!
//! プロキシヘッダーと接続元アドレスから記録用のIP文字列を決定する

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// IPアドレスを正規化する
///
/// IPv4-mapped IPv6（::ffff:x.x.x.x）をIPv4に変換。
/// それ以外はそのまま返す。
pub fn normalize_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                IpAddr::V4(v4)
            } else {
                IpAddr::V6(v6)
            }
        }
        v4 => v4,
    }
}

/// リクエストのクライアントIPを解決する
///
/// 優先順位: `X-Forwarded-For` の先頭 → `X-Real-IP` → 接続元アドレス。
/// いずれも得られない場合は空文字列。
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(ip) = forwarded {
        return ip;
    }

    peer.map(|addr| normalize_ip(addr.ip()).to_string())
        .unwrap_or_default()
}
