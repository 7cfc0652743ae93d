//! Router features on top of an authenticated session

use super::{Commit, Router};
use crate::discovery;
use crate::error::{Error, Result};
use crate::models::{
    AllowOrBlock, AttachedDevice, Bandwidth, Fields, FirmwareInfo, RouterInfo, Settings,
    SpeedTestResult, TrafficMeter,
};
use crate::parser;
use crate::session::{Capabilities, DeviceListMethod, GuestWifiVariant};
use crate::soap::{actions, Action, CODE_NOT_CONNECTED, CODE_UNKNOWN_MAC};
use crate::utils;
use crate::wol;
use tokio::time::Instant;

const GUEST_ACCESS_ELEMENT: &str = "NewGuestAccessEnabled";

/// Guest Wi-Fi calls whose action name depends on the firmware generation
#[derive(Debug, Clone, Copy)]
enum GuestCall {
    Get5G,
    Set24G,
    Set5G,
}

impl GuestCall {
    fn slot(self, caps: &mut Capabilities) -> &mut Option<GuestWifiVariant> {
        match self {
            GuestCall::Get5G => &mut caps.get_guest_5g,
            GuestCall::Set24G => &mut caps.set_guest_24g,
            GuestCall::Set5G => &mut caps.set_guest_5g,
        }
    }

    fn cached(self, caps: &Capabilities) -> Option<GuestWifiVariant> {
        match self {
            GuestCall::Get5G => caps.get_guest_5g,
            GuestCall::Set24G => caps.set_guest_24g,
            GuestCall::Set5G => caps.set_guest_5g,
        }
    }

    fn action(self, variant: GuestWifiVariant) -> &'static Action {
        match (self, variant) {
            (GuestCall::Get5G, GuestWifiVariant::Primary) => &actions::GET_5G_GUEST_ACCESS_ENABLED,
            (GuestCall::Get5G, GuestWifiVariant::Alternate) => &actions::GET_5G1_GUEST_ACCESS_ENABLED,
            (GuestCall::Set24G, GuestWifiVariant::Primary) => &actions::SET_GUEST_ACCESS_ENABLED,
            (GuestCall::Set24G, GuestWifiVariant::Alternate) => &actions::SET_GUEST_ACCESS_ENABLED_2,
            (GuestCall::Set5G, GuestWifiVariant::Primary) => &actions::SET_5G_GUEST_ACCESS_ENABLED,
            (GuestCall::Set5G, GuestWifiVariant::Alternate) => &actions::SET_5G1_GUEST_ACCESS_ENABLED_2,
        }
    }
}

fn normalized_mac(mac: &str) -> Result<String> {
    utils::normalize_mac(mac).ok_or_else(|| Error::InvalidInput(format!("invalid MAC address '{}'", mac)))
}

impl Router {
    async fn fields(&mut self, action: &Action) -> Result<Fields> {
        let resp = self.call(action, &actions::empty(action)).await?;
        Ok(parser::response_fields(&resp.body))
    }

    async fn flag(&mut self, action: &Action, element: &str) -> Result<bool> {
        let resp = self.call(action, &actions::empty(action)).await?;
        parser::parse_flag(&resp.body, element)
    }

    async fn toggle(&mut self, action: &Action, element: &str, enabled: bool) -> Result<Commit> {
        self.transaction(action, &actions::toggle(action, element, enabled))
            .await
    }

    /// Model, serial number and software versions
    pub async fn get_info(&mut self) -> Result<RouterInfo> {
        let resp = self
            .call(&actions::GET_INFO, &actions::empty(&actions::GET_INFO))
            .await?;
        parser::parse_router_info(&resp.body)
    }

    pub async fn get_support_feature_list(&mut self) -> Result<Fields> {
        self.fields(&actions::GET_SUPPORT_FEATURE_LIST).await
    }

    pub async fn get_device_config(&mut self) -> Result<Fields> {
        self.fields(&actions::GET_DEVICE_CONFIG).await
    }

    pub async fn get_lan_config(&mut self) -> Result<Fields> {
        self.fields(&actions::GET_LAN_CONFIG).await
    }

    pub async fn get_wan_ip_connection(&mut self) -> Result<Fields> {
        self.fields(&actions::GET_WAN_IP_CONNECTION).await
    }

    /// Attached devices in whichever format the router supports. The richer
    /// structured listing is tried first; the format that worked is kept.
    ///
    /// Only a reply showing the structured RPC is unsupported moves the
    /// session to the flat format. Timeouts, connection errors and 401s are
    /// returned as they are and nothing is cached.
    pub async fn get_attached_devices(&mut self) -> Result<Vec<AttachedDevice>> {
        match self.session.capabilities.device_list {
            Some(DeviceListMethod::Structured) => return self.get_attached_devices_structured().await,
            Some(DeviceListMethod::Flat) => return self.get_attached_devices_flat().await,
            None => {}
        }

        match self.get_attached_devices_structured().await {
            Ok(devices) => {
                self.session.capabilities.device_list = Some(DeviceListMethod::Structured);
                Ok(devices)
            }
            Err(e) if structured_unsupported(&e) => {
                tracing::debug!("Structured device list unavailable ({}), trying flat list", e);
                let devices = self.get_attached_devices_flat().await?;
                self.session.capabilities.device_list = Some(DeviceListMethod::Flat);
                Ok(devices)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_attached_devices_flat(&mut self) -> Result<Vec<AttachedDevice>> {
        let resp = self
            .call(
                &actions::GET_ATTACHED_DEVICES,
                &actions::empty(&actions::GET_ATTACHED_DEVICES),
            )
            .await?;
        parser::parse_flat_devices(&resp.body)
    }

    pub async fn get_attached_devices_structured(&mut self) -> Result<Vec<AttachedDevice>> {
        let resp = self
            .call(
                &actions::GET_ATTACHED_DEVICES2,
                &actions::empty(&actions::GET_ATTACHED_DEVICES2),
            )
            .await?;
        parser::parse_structured_devices(&resp.body)
    }

    /// Traffic statistics in MB; traffic metering must be enabled
    pub async fn get_traffic_meter(&mut self) -> Result<TrafficMeter> {
        let resp = self
            .call(&actions::GET_TRAFFIC_METER, &actions::empty(&actions::GET_TRAFFIC_METER))
            .await?;
        parser::parse_traffic_meter(&resp.body)
    }

    pub async fn get_traffic_meter_enabled(&mut self) -> Result<bool> {
        self.flag(&actions::GET_TRAFFIC_METER_ENABLED, "NewTrafficMeterEnable")
            .await
    }

    pub async fn get_traffic_meter_options(&mut self) -> Result<Fields> {
        self.fields(&actions::GET_TRAFFIC_METER_OPTIONS).await
    }

    pub async fn get_block_device_enable_status(&mut self) -> Result<bool> {
        self.flag(&actions::GET_BLOCK_DEVICE_ENABLE_STATUS, "NewBlockDeviceEnable")
            .await
    }

    pub async fn get_parental_control_enable_status(&mut self) -> Result<bool> {
        let resp = self
            .call(
                &actions::GET_PARENTAL_CONTROL_ENABLE_STATUS,
                &actions::parental_control_status(),
            )
            .await?;
        parser::parse_flag(&resp.body, "ParentalControl")
    }

    pub async fn get_qos_enable_status(&mut self) -> Result<bool> {
        self.flag(&actions::GET_QOS_ENABLE_STATUS, "NewQoSEnableStatus")
            .await
    }

    pub async fn get_bandwidth_control_options(&mut self) -> Result<Bandwidth> {
        let action = &actions::GET_BANDWIDTH_CONTROL_OPTIONS;
        let resp = self.call(action, &actions::empty(action)).await?;
        parser::parse_bandwidth(&resp.body)
    }

    pub async fn get_smart_connect_enabled(&mut self) -> Result<bool> {
        self.flag(&actions::GET_SMART_CONNECT_ENABLED, "NewSmartConnectEnable")
            .await
    }

    /// Channels the radio may use; `band` is e.g. `2.4G` or `5G`
    pub async fn get_available_channels(&mut self, band: &str) -> Result<Vec<String>> {
        let resp = self
            .call(&actions::GET_AVAILABLE_CHANNEL, &actions::get_available_channel(band))
            .await?;
        Ok(parser::parse_available_channels(&resp.body))
    }

    /// 2.4 GHz guest network
    pub async fn get_guest_wifi_enabled(&mut self) -> Result<bool> {
        let action = &actions::GET_GUEST_ACCESS_ENABLED;
        let resp = self.call(action, &actions::empty(action)).await?;
        parser::parse_guest_access(&resp.body)
    }

    /// First 5 GHz guest network
    pub async fn get_5g_guest_wifi_enabled(&mut self) -> Result<bool> {
        let call = GuestCall::Get5G;
        let mut last_err = None;
        for variant in self.guest_variants(call) {
            let action = call.action(variant);
            let attempt = match self.call(action, &actions::empty(action)).await {
                Ok(resp) => parser::parse_guest_access(&resp.body),
                Err(e) => Err(e),
            };
            match attempt {
                Ok(enabled) => {
                    *call.slot(&mut self.session.capabilities) = Some(variant);
                    return Ok(enabled);
                }
                Err(e) => {
                    tracing::debug!("{} failed: {}", action, e);
                    last_err = Some(e);
                }
            }
        }
        Err(no_variant(last_err))
    }

    /// Second 5 GHz guest network
    pub async fn get_5g_guest_wifi_2_enabled(&mut self) -> Result<bool> {
        let action = &actions::GET_5G_GUEST_ACCESS_ENABLED_2;
        let resp = self.call(action, &actions::empty(action)).await?;
        parser::parse_guest_access(&resp.body)
    }

    /// Current and available firmware versions
    pub async fn check_new_firmware(&mut self) -> Result<FirmwareInfo> {
        let resp = self
            .call(&actions::CHECK_NEW_FIRMWARE, &actions::empty(&actions::CHECK_NEW_FIRMWARE))
            .await?;
        Ok(parser::parse_firmware_info(&resp.body))
    }

    /// Allow or block a device by MAC address.
    ///
    /// Response code 1 means the MAC is unknown to the router and 2 that the
    /// device is not connected; both surface as dedicated errors.
    pub async fn set_block_device(&mut self, mac: &str, allow_or_block: AllowOrBlock) -> Result<Commit> {
        let mac = normalized_mac(mac)?;
        let body = actions::set_block_device(&mac, allow_or_block.as_str());
        let action_name = actions::SET_BLOCK_DEVICE.to_string();

        self.transaction(&actions::SET_BLOCK_DEVICE, &body)
            .await
            .map_err(|e| match e {
                Error::Router { action, code: CODE_UNKNOWN_MAC } if action == action_name => {
                    Error::DeviceNotFound(mac.clone())
                }
                Error::Router { action, code: CODE_NOT_CONNECTED } if action == action_name => {
                    Error::DeviceNotConnected(mac.clone())
                }
                other => other,
            })
    }

    pub async fn set_block_device_enable(&mut self, enabled: bool) -> Result<Commit> {
        self.toggle(&actions::SET_BLOCK_DEVICE_ENABLE, "NewBlockDeviceEnable", enabled)
            .await
    }

    pub async fn enable_block_device_for_all(&mut self) -> Result<Commit> {
        let action = &actions::ENABLE_BLOCK_DEVICE_FOR_ALL;
        self.transaction(action, &actions::empty(action)).await
    }

    pub async fn enable_traffic_meter(&mut self, enabled: bool) -> Result<Commit> {
        self.toggle(&actions::ENABLE_TRAFFIC_METER, "NewTrafficMeterEnable", enabled)
            .await
    }

    pub async fn enable_parental_control(&mut self, enabled: bool) -> Result<Commit> {
        self.transaction(
            &actions::ENABLE_PARENTAL_CONTROL,
            &actions::enable_parental_control(enabled),
        )
        .await
    }

    pub async fn set_qos_enable_status(&mut self, enabled: bool) -> Result<Commit> {
        self.toggle(&actions::SET_QOS_ENABLE_STATUS, "NewQoSEnable", enabled)
            .await
    }

    /// Bandwidth limits in Mbps
    pub async fn set_bandwidth_control_options(&mut self, uplink: u32, downlink: u32) -> Result<Commit> {
        self.transaction(
            &actions::SET_BANDWIDTH_CONTROL_OPTIONS,
            &actions::set_bandwidth_control_options(uplink, downlink),
        )
        .await
    }

    pub async fn set_smart_connect_enabled(&mut self, enabled: bool) -> Result<Commit> {
        self.toggle(&actions::SET_SMART_CONNECT_ENABLED, "NewSmartConnectEnable", enabled)
            .await
    }

    pub async fn set_device_name(&mut self, mac: &str, name: &str) -> Result<Commit> {
        let mac = normalized_mac(mac)?;
        self.transaction(&actions::SET_DEVICE_NAME, &actions::set_device_name(&mac, name))
            .await
    }

    /// 2.4 GHz guest network
    pub async fn set_guest_wifi(&mut self, enabled: bool) -> Result<Commit> {
        self.set_guest_variant(GuestCall::Set24G, enabled).await
    }

    /// First 5 GHz guest network
    pub async fn set_5g_guest_wifi(&mut self, enabled: bool) -> Result<Commit> {
        self.set_guest_variant(GuestCall::Set5G, enabled).await
    }

    /// Second 5 GHz guest network
    pub async fn set_5g_guest_wifi_2(&mut self, enabled: bool) -> Result<Commit> {
        self.toggle(&actions::SET_5G_GUEST_ACCESS_ENABLED_2, GUEST_ACCESS_ELEMENT, enabled)
            .await
    }

    pub async fn reboot(&mut self) -> Result<Commit> {
        tracing::info!("Rebooting router");
        self.transaction(&actions::REBOOT, &actions::empty(&actions::REBOOT))
            .await
    }

    /// Download and install the firmware found by [`Router::check_new_firmware`]
    pub async fn update_new_firmware(&mut self) -> Result<Commit> {
        tracing::info!("Starting firmware update");
        self.transaction(&actions::UPDATE_NEW_FIRMWARE, &actions::update_new_firmware())
            .await
    }

    /// Run the router's built-in speed test and wait for the result.
    /// The router answers non-zero codes while the test is still running.
    pub async fn speed_test(&mut self) -> Result<SpeedTestResult> {
        let start = &actions::SPEED_TEST_START;
        let commit = self.transaction(start, &actions::empty(start)).await?;
        if let Some(warning) = commit.warning {
            tracing::debug!("Speed test started with warning: {}", warning);
        }
        tracing::info!("Speed test started, waiting for result...");

        let polling = self.speed_test;
        let deadline = Instant::now() + polling.deadline;
        let action = &actions::SPEED_TEST_RESULT;
        loop {
            tokio::time::sleep(polling.interval).await;
            match self.call(action, &actions::empty(action)).await {
                Ok(resp) => return parser::parse_speed_test(&resp.body),
                Err(Error::Router { code, .. }) => {
                    tracing::debug!("Speed test still running (code {})", code);
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(polling.deadline));
            }
        }
    }

    /// Settings page of the router; discovers the router if no host is set
    pub async fn get_current_setting(&mut self) -> Result<Settings> {
        match self.session.host.clone() {
            Some(host) => {
                discovery::get_current_setting(
                    self.discovery_transport.as_ref(),
                    &host,
                    self.session.timeout,
                )
                .await
            }
            None => {
                let (host, settings) =
                    discovery::locate_host(self.discovery_transport.clone(), &self.discovery).await?;
                self.session.host = Some(host);
                Ok(settings)
            }
        }
    }

    /// Send a Wake-on-LAN packet for `mac`. Returns the MAC it was sent to.
    pub async fn wake(&self, mac: &str, password: Option<&str>) -> Result<String> {
        wol::wake(mac, password).await
    }

    fn guest_variants(&self, call: GuestCall) -> Vec<GuestWifiVariant> {
        match call.cached(&self.session.capabilities) {
            Some(variant) => vec![variant],
            None => GuestWifiVariant::ORDER.to_vec(),
        }
    }

    async fn set_guest_variant(&mut self, call: GuestCall, enabled: bool) -> Result<Commit> {
        let mut last_err = None;
        for variant in self.guest_variants(call) {
            let action = call.action(variant);
            match self.toggle(action, GUEST_ACCESS_ELEMENT, enabled).await {
                Ok(commit) => {
                    *call.slot(&mut self.session.capabilities) = Some(variant);
                    return Ok(commit);
                }
                Err(e) => {
                    tracing::debug!("{} failed: {}", action, e);
                    last_err = Some(e);
                }
            }
        }
        Err(no_variant(last_err))
    }
}

/// The router answered, but not with a structured device list
fn structured_unsupported(err: &Error) -> bool {
    matches!(
        err,
        Error::Router { .. } | Error::Protocol(_) | Error::Parse(_) | Error::HttpStatus(_)
    )
}

fn no_variant(last_err: Option<Error>) -> Error {
    last_err.unwrap_or_else(|| Error::Protocol("no guest Wi-Fi action variant to try".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{code, ok, soap_body, FakeTransport};
    use crate::router::tests::logged_in;
    use crate::router::SpeedTestPolling;
    use std::time::Duration;

    fn bracket(fake: &FakeTransport, operation: &str, finish: &str) {
        fake.push("ConfigurationStarted", code("000"));
        fake.push(operation, code("000"));
        fake.push("ConfigurationFinished", code(finish));
    }

    const STRUCTURED: &str = "<m:GetAttachDevice2Response xmlns:m=\"urn:NETGEAR-ROUTER:service:DeviceInfo:1\"><NewAttachDevice><Device><IP>10.0.0.10</IP><Name>Laptop</Name><NameUserSet>false</NameUserSet><MAC>61:56:FA:1B:E1:21</MAC><ConnectionType>5GHz</ConnectionType><SSID>Home</SSID><Linkspeed>866</Linkspeed><SignalStrength>72</SignalStrength><AllowOrBlock>Allow</AllowOrBlock><Schedule>false</Schedule><DeviceType>12</DeviceType><DeviceTypeUserSet>false</DeviceTypeUserSet><Upload>0</Upload><Download>0</Download><QosPriority>2</QosPriority></Device></NewAttachDevice></m:GetAttachDevice2Response>";

    #[tokio::test]
    async fn test_feature_call_logs_in_first() {
        let fake = FakeTransport::new();
        fake.push("SOAPLogin", code("000"));
        fake.push(
            "GetInfo",
            ok(soap_body("000", "<ModelName>R7000</ModelName><SerialNumber>4RL1234</SerialNumber>")),
        );

        let mut router = crate::router::tests::router(&fake);
        let info = router.get_info().await.unwrap();
        assert_eq!(info.model_name, "R7000");
        assert_eq!(fake.calls(), vec!["SOAPLogin", "GetInfo"]);
    }

    #[tokio::test]
    async fn test_device_list_falls_back_to_flat_and_remembers() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("GetAttachDevice2", code("404"));
        fake.always(
            "GetAttachDevice",
            ok(soap_body(
                "000",
                "<NewAttachDevice>1@1;10.0.0.2;Bob;AA:BB:CC:DD:EE:01;wired;0;0</NewAttachDevice>",
            )),
        );

        let devices = router.get_attached_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].mac, "AA:BB:CC:DD:EE:01");
        assert_eq!(
            router.session().capabilities.device_list,
            Some(DeviceListMethod::Flat)
        );

        router.get_attached_devices().await.unwrap();
        assert_eq!(
            fake.calls().iter().filter(|c| *c == "GetAttachDevice2").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_device_list_timeout_is_not_cached() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push_err("GetAttachDevice2", || Error::Timeout(Duration::from_secs(18)));
        fake.push("GetAttachDevice2", ok(soap_body("000", STRUCTURED)));

        let err = router.get_attached_devices().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(router.session().capabilities.device_list, None);

        let devices = router.get_attached_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(
            router.session().capabilities.device_list,
            Some(DeviceListMethod::Structured)
        );
        assert_eq!(
            fake.calls(),
            vec!["SOAPLogin", "GetAttachDevice2", "GetAttachDevice2"]
        );
    }

    #[tokio::test]
    async fn test_structured_list_with_no_devices_is_empty() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("GetAttachDevice2", ok(soap_body("000", STRUCTURED)));
        fake.push(
            "GetAttachDevice2",
            ok(soap_body(
                "000",
                "<m:GetAttachDevice2Response xmlns:m=\"urn:NETGEAR-ROUTER:service:DeviceInfo:1\"><NewAttachDevice></NewAttachDevice></m:GetAttachDevice2Response>",
            )),
        );

        assert_eq!(router.get_attached_devices().await.unwrap().len(), 1);
        assert!(router.get_attached_devices().await.unwrap().is_empty());
        assert!(!fake.calls().contains(&"GetAttachDevice".to_string()));
    }

    #[tokio::test]
    async fn test_device_list_prefers_structured() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("GetAttachDevice2", ok(soap_body("000", STRUCTURED)));

        let devices = router.get_attached_devices().await.unwrap();
        assert_eq!(devices[0].ssid, "Home");
        assert_eq!(devices[0].link_speed, 866);
        assert_eq!(
            router.session().capabilities.device_list,
            Some(DeviceListMethod::Structured)
        );
        assert!(!fake.calls().contains(&"GetAttachDevice".to_string()));
    }

    #[tokio::test]
    async fn test_block_device_maps_codes() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("SetBlockDeviceByMAC", code("001"));
        fake.push("ConfigurationFinished", code("000"));

        let err = router
            .set_block_device("aa-bb-cc-dd-ee-ff", AllowOrBlock::Block)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(ref mac) if mac == "AA:BB:CC:DD:EE:FF"));

        fake.push("ConfigurationStarted", code("000"));
        fake.push("SetBlockDeviceByMAC", code("002"));
        fake.push("ConfigurationFinished", code("000"));
        let err = router
            .set_block_device("AA:BB:CC:DD:EE:FF", AllowOrBlock::Allow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotConnected(_)));
    }

    #[tokio::test]
    async fn test_block_device_start_failure_is_not_remapped() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("001"));

        let err = router
            .set_block_device("AA:BB:CC:DD:EE:FF", AllowOrBlock::Block)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Router { code: 1, .. }));
    }

    #[tokio::test]
    async fn test_block_device_sends_normalized_mac() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        bracket(&fake, "SetBlockDeviceByMAC", "000");

        let commit = router
            .set_block_device("aa:bb:cc:dd:ee:0f", AllowOrBlock::Block)
            .await
            .unwrap();
        assert!(commit.is_clean());
        let requests = fake.requests.lock().unwrap();
        let body = requests[2].body.as_deref().unwrap();
        assert!(body.contains("<NewMACAddress>AA:BB:CC:DD:EE:0F</NewMACAddress>"));
        assert!(body.contains("<NewAllowOrBlock>Block</NewAllowOrBlock>"));
    }

    #[tokio::test]
    async fn test_invalid_mac_is_rejected_before_io() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        let calls = fake.calls().len();
        let err = router
            .set_device_name("not-a-mac", "TV")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(fake.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_guest_wifi_uses_alternate_and_caches_it() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("SetGuestAccessEnabled", code("002"));
        fake.push("ConfigurationFinished", code("000"));
        bracket(&fake, "SetGuestAccessEnabled2", "000");

        router.set_guest_wifi(true).await.unwrap();
        assert_eq!(
            router.session().capabilities.set_guest_24g,
            Some(GuestWifiVariant::Alternate)
        );

        bracket(&fake, "SetGuestAccessEnabled2", "000");
        router.set_guest_wifi(false).await.unwrap();
        let calls = fake.calls();
        assert_eq!(calls.iter().filter(|c| *c == "SetGuestAccessEnabled").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "SetGuestAccessEnabled2").count(), 2);

        let requests = fake.requests.lock().unwrap();
        let last = requests
            .iter()
            .rev()
            .find(|r| r.header_value("SOAPAction").is_some_and(|a| a.ends_with("#SetGuestAccessEnabled2")))
            .and_then(|r| r.body.clone())
            .unwrap();
        assert!(last.contains("<NewGuestAccessEnabled>0</NewGuestAccessEnabled>"));
    }

    #[tokio::test]
    async fn test_5g_guest_wifi_read_fallback() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("Get5GGuestAccessEnabled", ok(soap_body("000", "")));
        fake.push(
            "Get5G1GuestAccessEnabled",
            ok(soap_body("000", "<NewGuestAccessEnabled>1</NewGuestAccessEnabled>")),
        );

        assert!(router.get_5g_guest_wifi_enabled().await.unwrap());
        assert_eq!(
            router.session().capabilities.get_guest_5g,
            Some(GuestWifiVariant::Alternate)
        );
    }

    #[tokio::test]
    async fn test_guest_wifi_both_variants_fail() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("ConfigurationStarted", code("000"));
        fake.always("ConfigurationFinished", code("000"));

        let err = router.set_5g_guest_wifi(true).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(router.session().capabilities.set_guest_5g, None);
    }

    #[tokio::test]
    async fn test_simple_reads() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push(
            "GetQoSEnableStatus",
            ok(soap_body("000", "<NewQoSEnableStatus>1</NewQoSEnableStatus>")),
        );
        fake.push(
            "GetEnableStatus",
            ok(soap_body("000", "<ParentalControl>0</ParentalControl>")),
        );
        fake.push(
            "GetTrafficMeterStatistics",
            ok(soap_body(
                "000",
                "<NewTodayUpload>1.5</NewTodayUpload><NewTodayDownload>20.25/3</NewTodayDownload>",
            )),
        );
        fake.push(
            "GetAvailableChannel",
            ok(soap_body("000", "<NewAvailableChannel>36,40,44,48</NewAvailableChannel>")),
        );

        assert!(router.get_qos_enable_status().await.unwrap());
        assert!(!router.get_parental_control_enable_status().await.unwrap());
        let traffic = router.get_traffic_meter().await.unwrap();
        assert_eq!(traffic.today_download, 20.25);
        assert_eq!(traffic.month_upload, 0.0);
        assert_eq!(
            router.get_available_channels("5G").await.unwrap(),
            vec!["36", "40", "44", "48"]
        );
    }

    #[tokio::test]
    async fn test_check_new_firmware() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push(
            "CheckNewFirmware",
            ok(soap_body(
                "000",
                "<CurrentVersion>V1.0.9.6</CurrentVersion><NewVersion>V1.0.9.8</NewVersion><ReleaseNote>fixes</ReleaseNote>",
            )),
        );
        let fw = router.check_new_firmware().await.unwrap();
        assert!(fw.update_available());
        assert_eq!(fw.release_note, "fixes");
    }

    #[tokio::test]
    async fn test_reboot_warning_is_reported() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        bracket(&fake, "Reboot", "500");

        let commit = router.reboot().await.unwrap();
        assert!(!commit.is_clean());
        assert!(router.session().config_started());
    }

    #[tokio::test]
    async fn test_speed_test_polls_until_done() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await.with_speed_test_polling(SpeedTestPolling {
            interval: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        });
        bracket(&fake, "SetOOKLASpeedTestStart", "000");
        fake.push("GetOOKLASpeedTestResult", code("001"));
        fake.push("GetOOKLASpeedTestResult", code("001"));
        fake.push(
            "GetOOKLASpeedTestResult",
            ok(soap_body(
                "000",
                "<NewOOKLAUplinkBandwidth>20.5</NewOOKLAUplinkBandwidth><NewOOKLADownlinkBandwidth>180.1</NewOOKLADownlinkBandwidth><AveragePing>9</AveragePing>",
            )),
        );

        let result = router.speed_test().await.unwrap();
        assert_eq!(result.uplink_bandwidth, 20.5);
        assert_eq!(result.downlink_bandwidth, 180.1);
        assert_eq!(result.average_ping, 9.0);
        assert_eq!(
            fake.calls().iter().filter(|c| *c == "GetOOKLASpeedTestResult").count(),
            3
        );
    }

    #[tokio::test]
    async fn test_speed_test_gives_up() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await.with_speed_test_polling(SpeedTestPolling {
            interval: Duration::from_millis(5),
            deadline: Duration::from_millis(20),
        });
        bracket(&fake, "SetOOKLASpeedTestStart", "000");
        fake.always("GetOOKLASpeedTestResult", code("001"));

        let err = router.speed_test().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_current_setting_with_known_host() {
        let fake = FakeTransport::new();
        fake.push(
            "http://10.0.0.1/currentsetting.htm",
            ok("Firmware=V1.0.0.1\nModel=R6400\n".into()),
        );
        let mut router = crate::router::tests::router(&fake);
        let settings = router.get_current_setting().await.unwrap();
        assert_eq!(settings.get("Model").map(String::as_str), Some("R6400"));
        assert!(!router.logged_in());
    }
}
