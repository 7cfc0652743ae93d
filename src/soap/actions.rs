//! Catalog of SOAP actions and their request bodies
//!
//! Each [`Action`] names one remote operation. The matching body builder below
//! renders the `<v:Body>` fragment; [`super::build_envelope`] wraps it.

use super::envelope::escape_xml;
use std::fmt;

/// One remote operation: `urn:NETGEAR-ROUTER:service:<service>:1#<operation>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub service: &'static str,
    pub operation: &'static str,
}

impl Action {
    const fn new(service: &'static str, operation: &'static str) -> Self {
        Self { service, operation }
    }

    pub fn namespace(&self) -> String {
        format!("urn:NETGEAR-ROUTER:service:{}:1", self.service)
    }

    /// Value of the `SOAPAction` header
    pub fn urn(&self) -> String {
        format!("{}#{}", self.namespace(), self.operation)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service, self.operation)
    }
}

const DEVICE_CONFIG: &str = "DeviceConfig";
const DEVICE_INFO: &str = "DeviceInfo";
const PARENTAL_CONTROL: &str = "ParentalControl";
const ADVANCED_QOS: &str = "AdvancedQoS";
const WLAN: &str = "WLANConfiguration";

// Session
pub const LOGIN_LEGACY: Action = Action::new(PARENTAL_CONTROL, "Authenticate");
pub const LOGIN: Action = Action::new(DEVICE_CONFIG, "SOAPLogin");
pub const LOGOUT: Action = Action::new(DEVICE_CONFIG, "SOAPLogout");

// Device config
pub const REBOOT: Action = Action::new(DEVICE_CONFIG, "Reboot");
pub const CHECK_NEW_FIRMWARE: Action = Action::new(DEVICE_CONFIG, "CheckNewFirmware");
pub const UPDATE_NEW_FIRMWARE: Action = Action::new(DEVICE_CONFIG, "UpdateNewFirmware");
pub const CONFIGURATION_STARTED: Action = Action::new(DEVICE_CONFIG, "ConfigurationStarted");
pub const CONFIGURATION_FINISHED: Action = Action::new(DEVICE_CONFIG, "ConfigurationFinished");
pub const GET_DEVICE_CONFIG: Action = Action::new(DEVICE_CONFIG, "GetInfo");

// Block / allow
pub const GET_BLOCK_DEVICE_ENABLE_STATUS: Action =
    Action::new(DEVICE_CONFIG, "GetBlockDeviceEnableStatus");
pub const SET_BLOCK_DEVICE_ENABLE: Action = Action::new(DEVICE_CONFIG, "SetBlockDeviceEnable");
pub const ENABLE_BLOCK_DEVICE_FOR_ALL: Action =
    Action::new(DEVICE_CONFIG, "EnableBlockDeviceForAll");
pub const SET_BLOCK_DEVICE: Action = Action::new(DEVICE_CONFIG, "SetBlockDeviceByMAC");

// Traffic meter
pub const GET_TRAFFIC_METER_ENABLED: Action = Action::new(DEVICE_CONFIG, "GetTrafficMeterEnabled");
pub const GET_TRAFFIC_METER_OPTIONS: Action = Action::new(DEVICE_CONFIG, "GetTrafficMeterOptions");
pub const GET_TRAFFIC_METER: Action = Action::new(DEVICE_CONFIG, "GetTrafficMeterStatistics");
pub const ENABLE_TRAFFIC_METER: Action = Action::new(DEVICE_CONFIG, "EnableTrafficMeter");

// LAN / WAN
pub const GET_LAN_CONFIG: Action = Action::new("LANConfigSecurity", "GetInfo");
pub const GET_WAN_IP_CONNECTION: Action = Action::new("WANIPConnection", "GetInfo");

// Parental control
pub const GET_PARENTAL_CONTROL_ENABLE_STATUS: Action =
    Action::new(PARENTAL_CONTROL, "GetEnableStatus");
pub const ENABLE_PARENTAL_CONTROL: Action = Action::new(PARENTAL_CONTROL, "EnableParentalControl");

// Device info
pub const GET_INFO: Action = Action::new(DEVICE_INFO, "GetInfo");
pub const GET_SUPPORT_FEATURE_LIST: Action = Action::new(DEVICE_INFO, "GetSupportFeatureListXML");
pub const GET_ATTACHED_DEVICES: Action = Action::new(DEVICE_INFO, "GetAttachDevice");
pub const GET_ATTACHED_DEVICES2: Action = Action::new(DEVICE_INFO, "GetAttachDevice2");
pub const SET_DEVICE_NAME: Action = Action::new(DEVICE_INFO, "SetNetgearDeviceName");

// QoS
pub const SPEED_TEST_START: Action = Action::new(ADVANCED_QOS, "SetOOKLASpeedTestStart");
pub const SPEED_TEST_RESULT: Action = Action::new(ADVANCED_QOS, "GetOOKLASpeedTestResult");
pub const GET_QOS_ENABLE_STATUS: Action = Action::new(ADVANCED_QOS, "GetQoSEnableStatus");
pub const SET_QOS_ENABLE_STATUS: Action = Action::new(ADVANCED_QOS, "SetQoSEnableStatus");
pub const GET_BANDWIDTH_CONTROL_OPTIONS: Action =
    Action::new(ADVANCED_QOS, "GetBandwidthControlOptions");
pub const SET_BANDWIDTH_CONTROL_OPTIONS: Action =
    Action::new(ADVANCED_QOS, "SetBandwidthControlOptions");

// Wireless. Guest access actions come in two generations; the comment names
// the firmware family that introduced each.
pub const GET_GUEST_ACCESS_ENABLED: Action = Action::new(WLAN, "GetGuestAccessEnabled");
pub const GET_5G_GUEST_ACCESS_ENABLED: Action = Action::new(WLAN, "Get5GGuestAccessEnabled"); // R7800
pub const GET_5G1_GUEST_ACCESS_ENABLED: Action = Action::new(WLAN, "Get5G1GuestAccessEnabled"); // R8000
pub const GET_5G_GUEST_ACCESS_ENABLED_2: Action = Action::new(WLAN, "Get5GGuestAccessEnabled2");
pub const SET_GUEST_ACCESS_ENABLED: Action = Action::new(WLAN, "SetGuestAccessEnabled"); // R7800
pub const SET_GUEST_ACCESS_ENABLED_2: Action = Action::new(WLAN, "SetGuestAccessEnabled2"); // R8000
pub const SET_5G_GUEST_ACCESS_ENABLED: Action = Action::new(WLAN, "Set5GGuestAccessEnabled"); // R7800
pub const SET_5G1_GUEST_ACCESS_ENABLED_2: Action = Action::new(WLAN, "Set5G1GuestAccessEnabled2"); // R8000
pub const SET_5G_GUEST_ACCESS_ENABLED_2: Action = Action::new(WLAN, "Set5GGuestAccessEnabled2");
pub const GET_SMART_CONNECT_ENABLED: Action = Action::new(WLAN, "IsSmartConnectEnabled");
pub const SET_SMART_CONNECT_ENABLED: Action = Action::new(WLAN, "SetSmartConnectEnable");
pub const GET_AVAILABLE_CHANNEL: Action = Action::new(WLAN, "GetAvailableChannel");

fn flag(enabled: bool) -> u8 {
    u8::from(enabled)
}

/// Body for an action that takes no arguments
pub fn empty(action: &Action) -> String {
    format!(
        "<v:Body>\n<M1:{op} xmlns:M1=\"{ns}\" />\n</v:Body>",
        op = action.operation,
        ns = action.namespace()
    )
}

/// Body for an action with `(element, value)` arguments. Values must already
/// be escaped.
pub fn with_args(action: &Action, args: &[(&str, &str)]) -> String {
    let mut inner = String::new();
    for (name, value) in args {
        inner.push_str(&format!("<{name}>{value}</{name}>\n"));
    }
    format!(
        "<v:Body>\n<M1:{op} xmlns:M1=\"{ns}\">\n{inner}</M1:{op}>\n</v:Body>",
        op = action.operation,
        ns = action.namespace()
    )
}

/// Body for an action that toggles a single boolean argument
pub fn toggle(action: &Action, element: &str, enabled: bool) -> String {
    with_args(action, &[(element, flag(enabled).to_string().as_str())])
}

/// Legacy login: the parental-control `Authenticate` action, unqualified
pub fn login_legacy(username: &str, password: &str) -> String {
    format!(
        concat!(
            "<v:Body>\n<Authenticate>\n",
            "<NewUsername xsi:type=\"xsd:string\" xmlns:xsi=\"http://www.w3.org/1999/XMLSchema-instance\">{}</NewUsername>\n",
            "<NewPassword xsi:type=\"xsd:string\" xmlns:xsi=\"http://www.w3.org/1999/XMLSchema-instance\">{}</NewPassword>\n",
            "</Authenticate>\n</v:Body>"
        ),
        escape_xml(username),
        escape_xml(password)
    )
}

pub fn login(username: &str, password: &str) -> String {
    with_args(
        &LOGIN,
        &[
            ("Username", &*escape_xml(username)),
            ("Password", &*escape_xml(password)),
        ],
    )
}

pub fn configuration_started(session_id: &str) -> String {
    with_args(
        &CONFIGURATION_STARTED,
        &[("NewSessionID", &*escape_xml(session_id))],
    )
}

pub fn configuration_finished() -> String {
    with_args(&CONFIGURATION_FINISHED, &[("NewStatus", "ChangesApplied")])
}

/// The parental-control status actions are sent unqualified
pub fn parental_control_status() -> String {
    "<v:Body>\n<GetEnableStatus>\n</GetEnableStatus>\n</v:Body>".to_string()
}

pub fn enable_parental_control(enabled: bool) -> String {
    format!(
        "<v:Body>\n<EnableParentalControl>\n<NewEnable>{}</NewEnable>\n</EnableParentalControl>\n</v:Body>",
        flag(enabled)
    )
}

pub fn set_block_device(mac: &str, allow_or_block: &str) -> String {
    with_args(
        &SET_BLOCK_DEVICE,
        &[
            ("NewAllowOrBlock", allow_or_block),
            ("NewMACAddress", &*escape_xml(mac)),
        ],
    )
}

pub fn set_bandwidth_control_options(uplink: u32, downlink: u32) -> String {
    with_args(
        &SET_BANDWIDTH_CONTROL_OPTIONS,
        &[
            ("NewUplinkBandwidth", uplink.to_string().as_str()),
            ("NewDownlinkBandwidth", downlink.to_string().as_str()),
            ("NewSettingMethod", "1"),
        ],
    )
}

pub fn update_new_firmware() -> String {
    with_args(&UPDATE_NEW_FIRMWARE, &[("YesOrNo", "1")])
}

pub fn get_available_channel(band: &str) -> String {
    with_args(&GET_AVAILABLE_CHANNEL, &[("NewBand", &*escape_xml(band))])
}

pub fn set_device_name(mac: &str, name: &str) -> String {
    with_args(
        &SET_DEVICE_NAME,
        &[("MAC", &*escape_xml(mac)), ("Name", &*escape_xml(name))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn() {
        assert_eq!(
            GET_ATTACHED_DEVICES2.urn(),
            "urn:NETGEAR-ROUTER:service:DeviceInfo:1#GetAttachDevice2"
        );
        assert_eq!(
            LOGIN_LEGACY.urn(),
            "urn:NETGEAR-ROUTER:service:ParentalControl:1#Authenticate"
        );
        assert_eq!(SET_BLOCK_DEVICE.to_string(), "DeviceConfig#SetBlockDeviceByMAC");
    }

    #[test]
    fn test_empty_body() {
        let body = empty(&REBOOT);
        assert!(body.starts_with("<v:Body>"));
        assert!(body.contains(
            "<M1:Reboot xmlns:M1=\"urn:NETGEAR-ROUTER:service:DeviceConfig:1\" />"
        ));
    }

    #[test]
    fn test_toggle_coerces_bool() {
        let on = toggle(&SET_GUEST_ACCESS_ENABLED, "NewGuestAccessEnabled", true);
        assert!(on.contains("<NewGuestAccessEnabled>1</NewGuestAccessEnabled>"));
        let off = toggle(&SET_QOS_ENABLE_STATUS, "NewQoSEnable", false);
        assert!(off.contains("<NewQoSEnable>0</NewQoSEnable>"));
        assert!(off.contains("</M1:SetQoSEnableStatus>"));
    }

    #[test]
    fn test_login_bodies_escape_credentials() {
        let modern = login("admin", "a<b&c");
        assert!(modern.contains("<Username>admin</Username>"));
        assert!(modern.contains("<Password>a&lt;b&amp;c</Password>"));

        let legacy = login_legacy("admin", "secret");
        assert!(legacy.contains("<Authenticate>"));
        assert!(legacy.contains(">secret</NewPassword>"));
    }

    #[test]
    fn test_set_block_device_body() {
        let body = set_block_device("AA:BB:CC:DD:EE:FF", "Block");
        assert!(body.contains("<NewAllowOrBlock>Block</NewAllowOrBlock>"));
        assert!(body.contains("<NewMACAddress>AA:BB:CC:DD:EE:FF</NewMACAddress>"));
    }
}
