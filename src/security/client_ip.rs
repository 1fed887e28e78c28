//! Client address resolution.
//!
//! The real-IP header wins, then the first entry of the proxy-IP header,
//! then the socket peer. A header that does not parse as an IP address is
//! skipped.

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, HeaderName};

use crate::http::request::header_str;

#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    real_ip_header: Option<HeaderName>,
    proxy_ip_header: Option<HeaderName>,
}

impl ClientIpResolver {
    pub fn new(real_ip_header: Option<HeaderName>, proxy_ip_header: Option<HeaderName>) -> Self {
        Self {
            real_ip_header,
            proxy_ip_header,
        }
    }

    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        if let Some(ip) = self
            .real_ip_header
            .as_ref()
            .and_then(|name| header_str(headers, name))
            .and_then(parse_ip)
        {
            return Some(ip);
        }

        if let Some(ip) = self
            .proxy_ip_header
            .as_ref()
            .and_then(|name| header_str(headers, name))
            .and_then(|value| value.split(',').next())
            .and_then(parse_ip)
        {
            return Some(ip);
        }

        peer.map(|addr| addr.ip())
    }

    /// Peer address plus any client-supplied address headers, for logs.
    pub fn describe(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let mut out = match peer {
            Some(addr) => addr.to_string(),
            None => "unknown".to_string(),
        };
        for name in [&self.real_ip_header, &self.proxy_ip_header].into_iter().flatten() {
            if let Some(value) = header_str(headers, name) {
                out.push_str(&format!(" ({value:?})"));
            }
        }
        out
    }
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn resolver() -> ClientIpResolver {
        ClientIpResolver::new(
            Some(HeaderName::from_static("x-real-ip")),
            Some(HeaderName::from_static("x-forwarded-for")),
        )
    }

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.1:5555".parse().unwrap())
    }

    #[test]
    fn prefers_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(resolver().resolve(&headers, peer()), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn uses_first_proxy_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2, 172.16.0.1"));
        assert_eq!(resolver().resolve(&headers, peer()), Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn unparseable_headers_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("garbage"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("also garbage"));
        assert_eq!(resolver().resolve(&headers, peer()), Some("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn empty_real_ip_defers_to_proxy_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(""));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(resolver().resolve(&headers, peer()), Some("10.0.0.2".parse().unwrap()));
        assert_eq!(resolver().describe(&headers, peer()), "192.0.2.1:5555 (\"10.0.0.2\")");
    }

    #[test]
    fn unconfigured_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        let resolver = ClientIpResolver::default();
        assert_eq!(resolver.resolve(&headers, peer()), Some("192.0.2.1".parse().unwrap()));
        assert_eq!(resolver.resolve(&headers, None), None);
    }

    #[test]
    fn describe_lists_header_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(resolver().describe(&headers, peer()), "192.0.2.1:5555 (\"10.0.0.1\")");
    }
}
