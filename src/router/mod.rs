//! Router session: login negotiation, logout and authenticated calls
//!
//! Feature methods live in [`features`]; mutating ones go through the
//! configuration bracket in [`transaction`].

pub mod features;
pub mod transaction;

pub use transaction::Commit;

use crate::config::Config;
use crate::discovery::{self, DiscoveryOptions};
use crate::error::{Error, Result};
use crate::http::{HttpResponse, HttpTransport, Transport, TransportOptions};
use crate::models::DiscoveredRouter;
use crate::protocol::{Protocol, SoapResponse};
use crate::session::{LoginMethod, SessionState};
use crate::soap::{actions, Action};
use std::sync::Arc;
use std::time::Duration;

/// Values merged into the session before logging in
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pin a login method instead of trying both
    pub method: Option<LoginMethod>,
}

/// Polling schedule for the router's speed test
#[derive(Debug, Clone, Copy)]
pub struct SpeedTestPolling {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for SpeedTestPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(120),
        }
    }
}

pub struct Router {
    session: SessionState,
    protocol: Protocol,
    discovery_transport: Arc<dyn Transport>,
    discovery: DiscoveryOptions,
    speed_test: SpeedTestPolling,
}

impl Router {
    /// Router client over `transport`. Discovery uses the same transport
    /// unless [`Router::with_discovery`] says otherwise.
    pub fn new(session: SessionState, transport: Arc<dyn Transport>) -> Self {
        let discovery = DiscoveryOptions {
            timeout: session.timeout,
            ..DiscoveryOptions::default()
        };
        Self {
            session,
            protocol: Protocol::new(transport.clone()),
            discovery_transport: transport,
            discovery,
            speed_test: SpeedTestPolling::default(),
        }
    }

    pub fn with_discovery(mut self, transport: Arc<dyn Transport>, options: DiscoveryOptions) -> Self {
        self.discovery_transport = transport;
        self.discovery = options;
        self
    }

    pub fn with_speed_test_polling(mut self, polling: SpeedTestPolling) -> Self {
        self.speed_test = polling;
        self
    }

    /// Build a client from loaded configuration. The control transport is
    /// rate limited; discovery probes get an unlimited one.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut session = SessionState::new(&cfg.router.username, &cfg.router.password);
        session.host = cfg.router.host.clone().filter(|h| !h.is_empty());
        session.port = cfg.router.port;
        session.tls = cfg.router.tls;
        session.timeout = Duration::from_secs(cfg.http.timeout);
        session.capabilities.login = cfg
            .router
            .login_method()
            .map_err(Error::InvalidInput)?;

        let transport_options = TransportOptions {
            connect_timeout: Duration::from_secs(cfg.http.connect_timeout),
            requests_per_second: cfg.http.requests_per_second,
            accept_invalid_certs: cfg.http.accept_invalid_certs,
        };
        let transport = Arc::new(HttpTransport::new(&transport_options)?);
        let scanner = Arc::new(HttpTransport::new(&TransportOptions {
            requests_per_second: 0,
            ..transport_options
        })?);

        let options = DiscoveryOptions {
            hostname: cfg.discovery.hostname.clone(),
            timeout: session.timeout,
            probe_timeout: Duration::from_secs(cfg.discovery.probe_timeout),
            concurrency: cfg.discovery.concurrency,
        };

        Ok(Self::new(session, transport).with_discovery(scanner, options))
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Raw reply to the most recent SOAP call, for diagnostics
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.protocol.last_response()
    }

    pub fn logged_in(&self) -> bool {
        self.session.logged_in()
    }

    fn apply(&mut self, overrides: LoginOptions) {
        if let Some(host) = overrides.host {
            self.session.host = Some(host);
        }
        if let Some(port) = overrides.port {
            self.session.port = Some(port);
        }
        if let Some(tls) = overrides.tls {
            self.session.tls = tls;
        }
        if let Some(username) = overrides.username {
            self.session.username = username;
        }
        if let Some(password) = overrides.password {
            self.session.password = password;
        }
        if overrides.method.is_some() {
            self.session.capabilities.login = overrides.method;
        }
    }

    /// Fill in whatever part of the endpoint is unknown
    async fn resolve_endpoint(&mut self) -> Result<()> {
        match (self.session.host.clone(), self.session.port) {
            (Some(_), Some(_)) => Ok(()),
            (None, None) => {
                let found =
                    discovery::discover_host(self.discovery_transport.clone(), &self.discovery).await?;
                self.session.host = Some(found.host);
                self.session.port = Some(found.port);
                self.session.tls = found.tls;
                Ok(())
            }
            (None, Some(_)) => {
                let (host, _) =
                    discovery::locate_host(self.discovery_transport.clone(), &self.discovery).await?;
                self.session.host = Some(host);
                Ok(())
            }
            (Some(host), None) => {
                let (port, tls) = discovery::discover_port(
                    self.discovery_transport.as_ref(),
                    &host,
                    self.session.timeout,
                )
                .await?;
                self.session.port = Some(port);
                self.session.tls = tls;
                Ok(())
            }
        }
    }

    /// Log in, discovering the router first if needed.
    ///
    /// Without a known method the modern RPC is tried before the legacy one;
    /// the method that worked is kept for later logins.
    pub async fn login(&mut self, overrides: Option<LoginOptions>) -> Result<bool> {
        if let Some(overrides) = overrides {
            self.apply(overrides);
        }
        self.resolve_endpoint().await?;

        let candidates: Vec<LoginMethod> = match self.session.capabilities.login {
            Some(method) => vec![method],
            None => LoginMethod::AUTO_ORDER.to_vec(),
        };

        for method in candidates {
            let (action, body) = match method {
                LoginMethod::Modern => (
                    &actions::LOGIN,
                    actions::login(&self.session.username, &self.session.password),
                ),
                LoginMethod::Legacy => (
                    &actions::LOGIN_LEGACY,
                    actions::login_legacy(&self.session.username, &self.session.password),
                ),
            };

            self.session.begin_login(method);
            match self.protocol.send(&mut self.session, action, &body).await {
                Ok(_) => {
                    self.session.complete_login();
                    tracing::info!(
                        "Logged in to {} as {} ({} login)",
                        self.session.host.as_deref().unwrap_or_default(),
                        self.session.username,
                        method
                    );
                    return Ok(true);
                }
                Err(e) => {
                    tracing::warn!("{} login failed: {}", method, e);
                    self.session.invalidate();
                }
            }
        }

        Err(Error::Auth("Failed to login".to_string()))
    }

    /// Log out. The session counts as logged out afterwards even if the
    /// router did not acknowledge.
    ///
    /// The logout is sent even when the client already considers itself
    /// logged out, so a router-side session survives no local 401. A 401
    /// reply means there was nothing to close.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.session.endpoint_known() {
            self.session.invalidate();
            return Ok(());
        }
        let body = actions::empty(&actions::LOGOUT);
        let result = self.protocol.send(&mut self.session, &actions::LOGOUT, &body).await;
        self.session.invalidate();
        match result {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(Error::Auth(_)) => {
                tracing::debug!("Router had no session to close");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run discovery and point the session at the result
    pub async fn discover(&mut self) -> Result<DiscoveredRouter> {
        let found =
            discovery::discover_host(self.discovery_transport.clone(), &self.discovery).await?;
        self.session.host = Some(found.host.clone());
        self.session.port = Some(found.port);
        self.session.tls = found.tls;
        Ok(found)
    }

    pub(crate) async fn ensure_logged_in(&mut self) -> Result<()> {
        if !self.session.logged_in() {
            self.login(None).await?;
        }
        Ok(())
    }

    /// Send `body` as `action`, logging in first if needed
    pub(crate) async fn call(&mut self, action: &Action, body: &str) -> Result<SoapResponse> {
        self.ensure_logged_in().await?;
        self.protocol.send(&mut self.session, action, body).await
    }
}
