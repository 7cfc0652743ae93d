//! Data models returned by the router client

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Leaf elements of a response body, keyed by element name
pub type Fields = BTreeMap<String, String>;

/// `key=value` settings from the unauthenticated status page
pub type Settings = BTreeMap<String, String>;

/// Normalized attached-device record, whichever wire format it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedDevice {
    pub ip: String,
    /// `--` or `<unknown>` when the router has no name
    pub name: String,
    pub name_user_set: bool,
    /// Always a canonical 17-character colon-separated MAC
    pub mac: String,
    /// `wired`, `2.4GHz`, `5GHz`, `Guest Wireless 2.4G`, ... or `unknown`
    pub connection_type: String,
    pub ssid: String,
    pub link_speed: u32,
    pub signal_strength: u32,
    /// `Allow`, `Block` or `unknown`
    pub allow_or_block: String,
    pub schedule: bool,
    pub device_type: u32,
    pub device_type_user_set: bool,
    pub upload: f64,
    pub download: f64,
    pub qos_priority: u32,

    // Newer firmware only
    pub device_model: String,
    pub grouping: u32,
    pub schedule_period: u32,
    pub device_type_name: String,
    pub device_model_user_set: bool,
    pub connected_ap_mac: String,
}

impl AttachedDevice {
    /// A record with every optional field at its neutral value
    pub fn new(ip: impl Into<String>, name: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            name: name.into(),
            name_user_set: false,
            mac: mac.into(),
            connection_type: UNKNOWN.to_string(),
            ssid: String::new(),
            link_speed: 0,
            signal_strength: 0,
            allow_or_block: UNKNOWN.to_string(),
            schedule: false,
            device_type: 0,
            device_type_user_set: false,
            upload: 0.0,
            download: 0.0,
            qos_priority: 0,
            device_model: String::new(),
            grouping: 0,
            schedule_period: 0,
            device_type_name: String::new(),
            device_model_user_set: false,
            connected_ap_mac: String::new(),
        }
    }
}

pub(crate) const UNKNOWN: &str = "unknown";

/// Router located by discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredRouter {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub settings: Settings,
}

/// Device identity from `DeviceInfo#GetInfo`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterInfo {
    pub model_name: String,
    pub description: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub smart_agent_version: String,
    pub firewall_version: String,
    pub vpn_version: String,
    pub other_software_version: String,
    pub hardware_version: String,
    pub other_hardware_version: String,
    pub first_use_date: String,
    /// Every field as returned, including ones not mapped above
    pub fields: Fields,
}

/// Traffic statistics in MB. Traffic monitoring must be enabled on the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficMeter {
    pub today_upload: f64,
    pub today_download: f64,
    pub month_upload: f64,
    pub month_download: f64,
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FirmwareInfo {
    pub current_version: String,
    pub new_version: String,
    pub release_note: String,
}

impl FirmwareInfo {
    pub fn update_available(&self) -> bool {
        !self.new_version.is_empty() && self.new_version != self.current_version
    }
}

/// Result of the router's built-in speed test
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedTestResult {
    pub uplink_bandwidth: f64,
    pub downlink_bandwidth: f64,
    pub average_ping: f64,
}

/// QoS bandwidth limits in Mbps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bandwidth {
    pub uplink: f64,
    pub downlink: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllowOrBlock {
    Allow,
    Block,
}

impl AllowOrBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowOrBlock::Allow => "Allow",
            AllowOrBlock::Block => "Block",
        }
    }
}

impl fmt::Display for AllowOrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllowOrBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(AllowOrBlock::Allow),
            "block" => Ok(AllowOrBlock::Block),
            other => Err(format!("expected Allow or Block, got '{}'", other)),
        }
    }
}

/// Guest Wi-Fi network selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GuestBand {
    /// 2.4 GHz, first guest network
    G24,
    /// 5 GHz, first guest network
    G5,
    /// 5 GHz, second guest network
    G5Second,
}

impl FromStr for GuestBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.4" | "2.4g" | "2.4G" => Ok(GuestBand::G24),
            "5" | "5g" | "5G" => Ok(GuestBand::G5),
            "5-2" | "5g-2" | "5G-2" => Ok(GuestBand::G5Second),
            other => Err(format!("unknown guest band '{}'", other)),
        }
    }
}
