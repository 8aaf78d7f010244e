//! Target checks run before a link is handed to a renderer.
//!
//! Job tables come from outside, so a row can point a real browser at
//! `file://` paths or hosts on the local network.

use std::net::{IpAddr, Ipv4Addr};

use url::{Host, Url};

/// `Err(reason)` when `raw` must not be rendered.
pub(crate) fn check_target(raw: &str, allow_private_hosts: bool) -> Result<(), &'static str> {
    let url = Url::parse(raw).map_err(|_| "not an absolute URL")?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err("unsupported scheme");
    }

    let private = match url.host() {
        None => return Err("missing host"),
        Some(Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
    };

    if private && !allow_private_hosts {
        return Err("private or loopback host");
    }
    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_v4(&mapped);
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10
                || (first & 0xffc0) == 0xfe80
                // fc00::/7
                || (first & 0xfe00) == 0xfc00
        }
    }
}

fn is_private_v4(v4: &Ipv4Addr) -> bool {
    let octets = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_unspecified()
        // 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        // 192.0.0.0/24
        || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
}
