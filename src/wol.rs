//! Wake-on-LAN magic packets

use crate::error::{Error, Result};
use crate::utils;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

const WOL_PORT: u16 = 9;

fn hex_bytes(digits: &str) -> Vec<u8> {
    (0..digits.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

fn parse_hex6(value: &str, what: &str) -> Result<Vec<u8>> {
    let digits = utils::mac_hex_digits(value)
        .ok_or_else(|| Error::InvalidInput(format!("{} must be 12 hex digits: '{}'", what, value)))?;
    Ok(hex_bytes(&digits))
}

/// Six `0xFF` bytes, the MAC sixteen times, then the SecureOn password if any
pub fn build_magic_packet(mac: &str, password: Option<&str>) -> Result<Vec<u8>> {
    let mac_bytes = parse_hex6(mac, "MAC address")?;
    let password_bytes = password
        .map(|p| parse_hex6(p, "SecureOn password"))
        .transpose()?;

    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac_bytes);
    }
    if let Some(password_bytes) = password_bytes {
        packet.extend_from_slice(&password_bytes);
    }
    Ok(packet)
}

/// Broadcast a magic packet for `mac` on UDP port 9. Returns the MAC.
pub async fn wake(mac: &str, password: Option<&str>) -> Result<String> {
    let packet = build_magic_packet(mac, password)?;

    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_broadcast(true)?;
    socket
        .send_to(&packet, SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT)))
        .await?;

    tracing::info!("Sent Wake-on-LAN packet to {}", mac);
    Ok(mac.to_string())
}
