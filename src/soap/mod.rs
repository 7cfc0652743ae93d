//! SOAP wire format used by the router's control endpoint
//!
//! Requests are a fixed envelope around an action-specific body; responses are
//! judged by their `<ResponseCode>` element, never by the HTTP status alone.

pub mod actions;
pub mod envelope;

pub use actions::Action;
pub use envelope::{build_envelope, response_code, strip_illegal_xml, SESSION_ID};

/// Path of the control endpoint on every firmware
pub const CONTROL_PATH: &str = "/soap/server_sa/";

/// Response code for success
pub const CODE_OK: u32 = 0;
/// Not authenticated / session expired
pub const CODE_UNAUTHORIZED: u32 = 401;
/// ConfigurationFinished: changes were already applied
pub const CODE_ALREADY_FINISHED: u32 = 501;
/// SetBlockDeviceByMAC: MAC address unknown to the router
pub const CODE_UNKNOWN_MAC: u32 = 1;
/// SetBlockDeviceByMAC: device known but not connected
pub const CODE_NOT_CONNECTED: u32 = 2;
