//! Requester address as seen by session binding and the lockout.

use std::net::SocketAddr;

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const UNKNOWN: &str = "unknown";

/// First `X-Forwarded-For` hop when proxies are trusted, then `X-Real-IP`,
/// then the socket peer.
pub fn observed_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = header_value(headers, FORWARDED_FOR)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
        if let Some(real) = header_value(headers, REAL_IP).map(str::trim)
            && !real.is_empty()
        {
            return real.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([192, 0, 2, 10], 40000)))
    }

    #[test]
    fn first_forwarded_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        headers.insert(REAL_IP, HeaderValue::from_static("10.0.0.9"));
        assert_eq!(observed_address(&headers, peer(), true), "203.0.113.5");
    }

    #[test]
    fn untrusted_headers_fall_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.5"));
        assert_eq!(observed_address(&headers, peer(), false), "192.0.2.10");
    }

    #[test]
    fn real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(observed_address(&headers, None, true), "198.51.100.2");
        assert_eq!(observed_address(&HeaderMap::new(), None, true), "unknown");
    }
}
