//! Session state for one router client
//!
//! Authentication is a tagged state rather than a set of loose flags: a cookie
//! or an open configuration transaction only exist while a login is in
//! progress or has succeeded.

use crate::soap::SESSION_ID;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The two mutually exclusive authentication RPCs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// `ParentalControl#Authenticate`, older firmware
    Legacy,
    /// `DeviceConfig#SOAPLogin`, newer firmware
    Modern,
}

impl LoginMethod {
    /// Order tried when no method is pinned
    pub const AUTO_ORDER: [LoginMethod; 2] = [LoginMethod::Modern, LoginMethod::Legacy];
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMethod::Legacy => f.write_str("legacy"),
            LoginMethod::Modern => f.write_str("modern"),
        }
    }
}

/// Parses `legacy`, `modern`, or `auto` (= no preference)
pub fn parse_login_method(s: &str) -> Result<Option<LoginMethod>, String> {
    match s.to_ascii_lowercase().as_str() {
        "auto" | "" => Ok(None),
        other => LoginMethod::from_str(other).map(Some),
    }
}

impl FromStr for LoginMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "1" | "1.0" => Ok(LoginMethod::Legacy),
            "modern" | "2" | "2.0" => Ok(LoginMethod::Modern),
            other => Err(format!("unknown login method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating {
        method: LoginMethod,
        cookie: Option<String>,
    },
    Authenticated {
        method: LoginMethod,
        cookie: Option<String>,
        /// A ConfigurationStarted is outstanding and must be finished
        config_started: bool,
    },
}

/// Attached-device RPC variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceListMethod {
    /// `GetAttachDevice2`, one XML element per device
    Structured,
    /// `GetAttachDevice`, delimited string
    Flat,
}

/// Guest Wi-Fi action generation for one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestWifiVariant {
    Primary,
    Alternate,
}

impl GuestWifiVariant {
    pub const ORDER: [GuestWifiVariant; 2] = [GuestWifiVariant::Primary, GuestWifiVariant::Alternate];
}

/// Which protocol variant the router answered to, learned on first use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub login: Option<LoginMethod>,
    pub device_list: Option<DeviceListMethod>,
    pub get_guest_5g: Option<GuestWifiVariant>,
    pub set_guest_24g: Option<GuestWifiVariant>,
    pub set_guest_5g: Option<GuestWifiVariant>,
}

#[derive(Clone)]
pub struct SessionState {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: bool,
    pub username: String,
    pub password: String,
    pub session_id: String,
    pub timeout: Duration,
    pub auth: AuthState,
    pub capabilities: Capabilities,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"*****")
            .field("timeout", &self.timeout)
            .field("auth", &self.auth)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl SessionState {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: None,
            port: None,
            tls: false,
            username: username.into(),
            password: password.into(),
            session_id: SESSION_ID.to_string(),
            timeout: Duration::from_secs(18),
            auth: AuthState::Unauthenticated,
            capabilities: Capabilities::default(),
        }
    }

    pub fn logged_in(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    pub fn login_method(&self) -> Option<LoginMethod> {
        match self.auth {
            AuthState::Authenticated { method, .. } => Some(method),
            _ => self.capabilities.login,
        }
    }

    pub fn cookie(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticating { cookie, .. } | AuthState::Authenticated { cookie, .. } => {
                cookie.as_deref()
            }
            AuthState::Unauthenticated => None,
        }
    }

    /// Store a cookie handed out by the router. Ignored while unauthenticated.
    pub fn set_cookie(&mut self, value: String) {
        match &mut self.auth {
            AuthState::Authenticating { cookie, .. } | AuthState::Authenticated { cookie, .. } => {
                *cookie = Some(value);
            }
            AuthState::Unauthenticated => {}
        }
    }

    pub fn config_started(&self) -> bool {
        matches!(
            self.auth,
            AuthState::Authenticated {
                config_started: true,
                ..
            }
        )
    }

    /// No-op unless authenticated
    pub fn set_config_started(&mut self, started: bool) {
        if let AuthState::Authenticated { config_started, .. } = &mut self.auth {
            *config_started = started;
        }
    }

    pub fn begin_login(&mut self, method: LoginMethod) {
        self.auth = AuthState::Authenticating {
            method,
            cookie: None,
        };
    }

    /// Promote an in-progress login. Returns false if no login was in progress.
    pub fn complete_login(&mut self) -> bool {
        match std::mem::take(&mut self.auth) {
            AuthState::Authenticating { method, cookie } => {
                self.auth = AuthState::Authenticated {
                    method,
                    cookie,
                    config_started: false,
                };
                self.capabilities.login = Some(method);
                true
            }
            other => {
                self.auth = other;
                false
            }
        }
    }

    /// Drop authentication, cookie and any open configuration transaction
    pub fn invalidate(&mut self) {
        self.auth = AuthState::Unauthenticated;
    }

    pub fn endpoint_known(&self) -> bool {
        self.host.is_some() && self.port.is_some()
    }

    pub fn base_url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let port = self.port?;
        let scheme = if self.tls { "https" } else { "http" };
        Some(format!("{}://{}:{}", scheme, host, port))
    }
}
