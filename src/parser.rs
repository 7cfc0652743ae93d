//! Response body parsing
//!
//! Attached devices arrive in one of two formats depending on firmware:
//! a flat `@`/`;` delimited string (`GetAttachDevice`) or one XML element per
//! device (`GetAttachDevice2`). Both normalize to [`AttachedDevice`]. Other
//! responses are read through [`response_fields`], which collects every leaf
//! element of the body.

use crate::error::{Error, Result};
use crate::models::{
    AttachedDevice, Bandwidth, Fields, FirmwareInfo, RouterInfo, Settings, SpeedTestResult,
    TrafficMeter, UNKNOWN,
};
use crate::soap::envelope::{strip_illegal_xml, unescape_xml};
use crate::utils::is_canonical_mac;
use regex::Regex;
use std::sync::LazyLock;

const UNKNOWN_DEVICE_ENCODED: &str = "&lt;unknown&gt;";
const UNKNOWN_DEVICE_DECODED: &str = "<unknown>";

/// Structured records with at least this many fields carry model/grouping/schedule
const EXTENDED_FIELDS: usize = 18;
/// ... and with at least this many, type name / model flag / access point
const EXTENDED_FIELDS_V2: usize = 21;

static FLAT_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<NewAttachDevice>(.*?)</NewAttachDevice>").expect("valid payload regex")
});

static STRUCTURED_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<(?:[A-Za-z0-9_]+:)?GetAttachDevice2Response\b[^>]*>(.*?)</(?:[A-Za-z0-9_]+:)?GetAttachDevice2Response>",
    )
    .expect("valid response regex")
});

static DEVICE_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Device>(.*?)</Device>").expect("valid device regex"));

// Leaf element `<Name attr="..">text</Name>` or self-closing `<Name/>`.
// The regex crate has no backreferences, so open/close names are compared
// after matching.
static LEAF_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<(?:[A-Za-z0-9_]+:)?([A-Za-z0-9_]+)(?:\s(?:[^<>]*[^/<>])?)?>([^<]*)</(?:[A-Za-z0-9_]+:)?([A-Za-z0-9_]+)>|<(?:[A-Za-z0-9_]+:)?([A-Za-z0-9_]+)(?:\s[^<>]*?)?/>",
    )
    .expect("valid leaf regex")
});

fn parse_error(msg: impl Into<String>) -> Error {
    Error::Parse(msg.into())
}

/// Leaf elements in document order as `(name, value)`, namespace prefixes dropped
fn leaf_elements(xml: &str) -> Vec<(String, String)> {
    LEAF_ELEMENT
        .captures_iter(xml)
        .filter_map(|caps| {
            if let Some(name) = caps.get(4) {
                return Some((name.as_str().to_string(), String::new()));
            }
            let open = caps.get(1)?.as_str();
            let close = caps.get(3)?.as_str();
            if open != close {
                return None;
            }
            let value = unescape_xml(caps.get(2)?.as_str().trim()).into_owned();
            Some((open.to_string(), value))
        })
        .collect()
}

/// Every leaf element of a response body. The first occurrence of a name wins.
pub fn response_fields(body: &str) -> Fields {
    let clean = strip_illegal_xml(body);
    let mut fields = Fields::new();
    for (name, value) in leaf_elements(&clean) {
        fields.entry(name).or_insert(value);
    }
    fields
}

/// Parse the flat `GetAttachDevice` format:
/// `<count>@<index>;<ip>;<name>;<mac>[;<type>;<speed>;<signal>[;<allow>]]@...`
pub fn parse_flat_devices(body: &str) -> Result<Vec<AttachedDevice>> {
    let raw = FLAT_PAYLOAD
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| parse_error("NewAttachDevice element not found"))?;

    let decoded = raw.replace(UNKNOWN_DEVICE_ENCODED, UNKNOWN_DEVICE_DECODED);
    let decoded = decoded.trim();
    if decoded.is_empty() {
        return Err(parse_error("empty device list"));
    }

    let mut entries = decoded.split('@');
    let count_token = entries.next().unwrap_or_default();
    let declared: usize = count_token
        .trim()
        .parse()
        .map_err(|_| parse_error(format!("invalid device count '{}'", count_token)))?;

    let records: Vec<&str> = entries.collect();
    if declared != records.len() {
        return Err(parse_error(format!(
            "device count mismatch: declared {}, found {}",
            declared,
            records.len()
        )));
    }

    records.into_iter().map(parse_flat_record).collect()
}

fn parse_flat_record(record: &str) -> Result<AttachedDevice> {
    let info: Vec<&str> = record.split(';').map(str::trim).collect();
    if info.len() < 4 {
        return Err(parse_error(format!(
            "device record has {} fields, need at least 4: '{}'",
            info.len(),
            record
        )));
    }

    let mac = info[3];
    if !is_canonical_mac(mac) {
        return Err(parse_error(format!("invalid MAC address '{}'", mac)));
    }

    let mut device = AttachedDevice::new(info[1], info[2], mac);

    // Not all routers report link type and rate
    if info.len() >= 7 {
        device.connection_type = info[4].to_string();
        device.link_speed = parse_number(info[5]) as u32;
        device.signal_strength = parse_number(info[6]) as u32;
    }
    if info.len() >= 8 {
        device.allow_or_block = info[7].to_string();
    }

    Ok(device)
}

/// Parse the structured `GetAttachDevice2` format. The number of fields per
/// device tells which firmware generation produced it.
pub fn parse_structured_devices(body: &str) -> Result<Vec<AttachedDevice>> {
    let clean = strip_illegal_xml(body);
    let response = STRUCTURED_RESPONSE
        .captures(&clean)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| parse_error("GetAttachDevice2Response element not found"))?;

    let devices = DEVICE_ELEMENT
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| parse_structured_record(m.as_str()))
        .collect::<Result<Vec<_>>>()?;

    Ok(devices)
}

fn parse_structured_record(xml: &str) -> Result<AttachedDevice> {
    let elements = leaf_elements(xml);
    let field_count = elements.len();
    let mut record = Fields::new();
    for (name, value) in elements {
        record.entry(name).or_insert(value);
    }

    let text = |name: &str| record.get(name).cloned().unwrap_or_default();
    let flag = |name: &str| record.get(name).is_some_and(|v| v == "true");
    let number = |name: &str| record.get(name).map(|v| parse_number(v)).unwrap_or(0.0);

    let mac = text("MAC");
    if !is_canonical_mac(&mac) {
        return Err(parse_error(format!("invalid MAC address '{}'", mac)));
    }

    let mut device = AttachedDevice::new(text("IP"), text("Name"), mac);
    device.name_user_set = flag("NameUserSet");
    device.connection_type = record
        .get("ConnectionType")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string());
    device.ssid = text("SSID");
    device.link_speed = number("Linkspeed") as u32;
    device.signal_strength = number("SignalStrength") as u32;
    device.allow_or_block = record
        .get("AllowOrBlock")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string());
    device.schedule = flag("Schedule");
    device.device_type = number("DeviceType") as u32;
    device.device_type_user_set = flag("DeviceTypeUserSet");
    device.upload = number("Upload");
    device.download = number("Download");
    device.qos_priority = number("QosPriority") as u32;

    if field_count >= EXTENDED_FIELDS {
        device.device_model = text("DeviceModel");
        device.grouping = number("Grouping") as u32;
        device.schedule_period = number("SchedulePeriod") as u32;
    }
    if field_count >= EXTENDED_FIELDS_V2 {
        device.device_type_name = text("DeviceTypeName");
        device.device_model_user_set = flag("DeviceModelUserSet");
        device.connected_ap_mac = record
            .get("ConnAPMAC")
            .or_else(|| record.get("ConAPMac"))
            .cloned()
            .unwrap_or_default();
    }

    Ok(device)
}

/// Numeric value of a field. Values like `"12.3/4.5"` (current/average) give
/// their first number; anything unreadable is 0.
pub fn parse_number(value: &str) -> f64 {
    value
        .split('/')
        .next()
        .map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse the `key=value` lines of `/currentsetting.htm`
pub fn parse_current_setting(body: &str) -> Result<Settings> {
    if !body.contains("Model=") {
        return Err(parse_error("not a Netgear settings page"));
    }

    let settings = body
        .split(['\r', '\n'])
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('=').collect();
            match parts.as_slice() {
                [key, value] if !key.trim().is_empty() => {
                    Some((key.trim().to_string(), value.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect();

    Ok(settings)
}

/// Boolean field sent as `1`/`0` (some firmware uses `true`/`false`)
pub fn parse_flag(body: &str, name: &str) -> Result<bool> {
    let fields = response_fields(body);
    let value = fields
        .get(name)
        .ok_or_else(|| parse_error(format!("{} not found in response", name)))?;
    Ok(value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on"))
}

/// Guest access flag. The element name differs between firmware generations
/// (`NewGuestAccessEnabled`, `New5GGuestAccessEnabled`, ...).
pub fn parse_guest_access(body: &str) -> Result<bool> {
    let fields = response_fields(body);
    let value = fields
        .iter()
        .find(|(name, _)| name.ends_with("GuestAccessEnabled"))
        .map(|(_, value)| value)
        .ok_or_else(|| parse_error("guest access flag not found in response"))?;
    Ok(value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on"))
}

pub fn parse_router_info(body: &str) -> Result<RouterInfo> {
    let fields = response_fields(body);
    // ResponseCode alone means the router returned nothing useful
    if fields.keys().filter(|k| *k != "ResponseCode").count() < 2 {
        return Err(parse_error("GetInfo response has no device information"));
    }

    let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
    Ok(RouterInfo {
        model_name: get("ModelName"),
        description: get("Description"),
        serial_number: get("SerialNumber"),
        firmware_version: get("Firmwareversion"),
        smart_agent_version: get("SmartAgentversion"),
        firewall_version: get("FirewallVersion"),
        vpn_version: get("VPNVersion"),
        other_software_version: get("OthersoftwareVersion"),
        hardware_version: get("Hardwareversion"),
        other_hardware_version: get("Otherhardwareversion"),
        first_use_date: get("FirstUseDate"),
        fields,
    })
}

pub fn parse_traffic_meter(body: &str) -> Result<TrafficMeter> {
    let fields = response_fields(body);
    let number = |name: &str| -> Result<f64> {
        fields
            .get(name)
            .map(|v| parse_number(v))
            .ok_or_else(|| parse_error(format!("{} not found in response", name)))
    };

    Ok(TrafficMeter {
        today_upload: number("NewTodayUpload")?,
        today_download: number("NewTodayDownload")?,
        month_upload: number("NewMonthUpload").unwrap_or(0.0),
        month_download: number("NewMonthDownload").unwrap_or(0.0),
        fields,
    })
}

pub fn parse_firmware_info(body: &str) -> FirmwareInfo {
    let fields = response_fields(body);
    let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
    FirmwareInfo {
        current_version: get("CurrentVersion"),
        new_version: get("NewVersion"),
        release_note: get("ReleaseNote"),
    }
}

pub fn parse_speed_test(body: &str) -> Result<SpeedTestResult> {
    let fields = response_fields(body);
    let uplink = fields
        .get("NewOOKLAUplinkBandwidth")
        .ok_or_else(|| parse_error("speed test result missing uplink bandwidth"))?;
    let downlink = fields
        .get("NewOOKLADownlinkBandwidth")
        .ok_or_else(|| parse_error("speed test result missing downlink bandwidth"))?;

    Ok(SpeedTestResult {
        uplink_bandwidth: parse_number(uplink),
        downlink_bandwidth: parse_number(downlink),
        average_ping: fields.get("AveragePing").map(|v| parse_number(v)).unwrap_or(0.0),
    })
}

pub fn parse_bandwidth(body: &str) -> Result<Bandwidth> {
    let fields = response_fields(body);
    let number = |name: &str| -> Result<f64> {
        fields
            .get(name)
            .map(|v| parse_number(v))
            .ok_or_else(|| parse_error(format!("{} not found in response", name)))
    };
    Ok(Bandwidth {
        uplink: number("NewUplinkBandwidth")?,
        downlink: number("NewDownlinkBandwidth")?,
    })
}

pub fn parse_available_channels(body: &str) -> Vec<String> {
    response_fields(body)
        .get("NewAvailableChannel")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
