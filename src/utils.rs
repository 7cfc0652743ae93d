//! Utility functions for addresses and local network checks

use ipnetwork::Ipv4Network;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::LazyLock;

static CANONICAL_MAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}$").expect("valid MAC regex")
});

/// True for a 17-character colon-separated hex MAC, e.g. `61:56:FA:1B:E1:21`
pub fn is_canonical_mac(mac: &str) -> bool {
    CANONICAL_MAC.is_match(mac)
}

/// Strip `:`/`-` separators and return the 12 hex digits, if that is what remains
pub fn mac_hex_digits(mac: &str) -> Option<String> {
    let digits: String = mac.chars().filter(|c| *c != ':' && *c != '-').collect();
    if digits.len() == 12 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

/// Normalize user input into the canonical upper-case colon form
pub fn normalize_mac(mac: &str) -> Option<String> {
    let digits = mac_hex_digits(mac.trim())?.to_ascii_uppercase();
    let pairs: Vec<&str> = (0..6).map(|i| &digits[i * 2..i * 2 + 2]).collect();
    Some(pairs.join(":"))
}

/// IPv4 address of the interface that carries the default route.
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// The /24 networks the client sits in
pub fn local_subnets() -> Vec<Ipv4Network> {
    primary_ipv4()
        .and_then(|ip| subnet_of(ip).ok())
        .into_iter()
        .collect()
}

pub fn subnet_of(ip: Ipv4Addr) -> Result<Ipv4Network, ipnetwork::IpNetworkError> {
    let network = Ipv4Network::new(ip, 24)?;
    Ipv4Network::new(network.network(), 24)
}

/// Every usable host address of a network (network and broadcast excluded)
pub fn host_addresses(network: &Ipv4Network) -> impl Iterator<Item = Ipv4Addr> + '_ {
    network
        .iter()
        .filter(move |ip| *ip != network.network() && *ip != network.broadcast())
}
