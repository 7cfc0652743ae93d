//! Locating the router and its SOAP endpoint
//!
//! The host is found through the router's well-known DNS name, or failing
//! that by probing `/currentsetting.htm` on every address of the local /24.
//! The control port is found by sending a harmless GetInfo to each candidate
//! port in turn.

use crate::error::{Error, Result};
use crate::http::{HttpRequest, Transport};
use crate::models::{DiscoveredRouter, Settings};
use crate::parser;
use crate::soap::{self, actions, CONTROL_PATH, SESSION_ID};
use crate::utils;
use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Name answered by the router's own DNS server
pub const ROUTER_HOSTNAME: &str = "routerlogin.net";

/// Candidate control endpoints, most preferred first: (port, tls)
pub const PORT_PROBES: [(u16, bool); 4] = [(443, true), (5555, true), (5000, false), (80, false)];

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub hostname: String,
    /// Timeout for the DNS lookup and the probe of the resolved address
    pub timeout: Duration,
    /// Timeout for each subnet-scan probe
    pub probe_timeout: Duration,
    /// Probes in flight at once during a subnet scan
    pub concurrency: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            hostname: ROUTER_HOSTNAME.to_string(),
            timeout: Duration::from_secs(18),
            probe_timeout: Duration::from_secs(3),
            concurrency: 64,
        }
    }
}

/// Fetch and parse `http://{host}/currentsetting.htm`. No login needed.
pub async fn get_current_setting(
    transport: &dyn Transport,
    host: &str,
    timeout: Duration,
) -> Result<Settings> {
    let url = format!("http://{}/currentsetting.htm", host);
    let resp = transport.execute(HttpRequest::get(url, timeout)).await?;
    if resp.status != 200 {
        return Err(Error::HttpStatus(resp.status));
    }
    parser::parse_current_setting(&resp.body)
}

/// Find the port and scheme the SOAP service answers on
pub async fn discover_port(
    transport: &dyn Transport,
    host: &str,
    timeout: Duration,
) -> Result<(u16, bool)> {
    let body = actions::empty(&actions::GET_INFO);
    let envelope = soap::build_envelope(SESSION_ID, &body);

    for (port, tls) in PORT_PROBES {
        let scheme = if tls { "https" } else { "http" };
        let url = format!("{}://{}:{}{}", scheme, host, port, CONTROL_PATH);
        let request = HttpRequest::post(url.clone(), envelope.clone(), timeout)
            .header("SOAPAction", actions::GET_INFO.urn())
            .header("Content-Type", "text/xml; charset=utf-8");

        match transport.execute(request).await {
            Ok(resp) if resp.status == 200 && soap::envelope::has_response_code(&resp.body) => {
                tracing::info!("SOAP endpoint found at {}", url);
                return Ok((port, tls));
            }
            Ok(resp) => tracing::debug!("{} answered {} without a SOAP reply", url, resp.status),
            Err(e) => tracing::debug!("{} unusable: {}", url, e),
        }
    }

    Err(Error::Discovery(format!("no SOAP endpoint answered on {}", host)))
}

/// Find the router's address and the settings page it serves
pub async fn locate_host(
    transport: Arc<dyn Transport>,
    options: &DiscoveryOptions,
) -> Result<(String, Settings)> {
    if let Some(ip) = resolve(&options.hostname, options.timeout).await {
        let host = ip.to_string();
        match get_current_setting(transport.as_ref(), &host, options.timeout).await {
            Ok(settings) => {
                tracing::info!("{} resolved to {}", options.hostname, host);
                return Ok((host, settings));
            }
            Err(e) => tracing::debug!("{} ({}) is not a router: {}", options.hostname, host, e),
        }
    }

    let subnets = utils::local_subnets();
    locate_in_subnets(transport, options, &subnets).await
}

/// Full discovery: host first, then the control port
pub async fn discover_host(
    transport: Arc<dyn Transport>,
    options: &DiscoveryOptions,
) -> Result<DiscoveredRouter> {
    let (host, settings) = locate_host(transport.clone(), options).await?;
    let (port, tls) = discover_port(transport.as_ref(), &host, options.timeout).await?;
    Ok(DiscoveredRouter {
        host,
        port,
        tls,
        settings,
    })
}

async fn resolve(hostname: &str, timeout: Duration) -> Option<IpAddr> {
    let lookup = tokio::net::lookup_host((hostname, 80));
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(mut addrs)) => addrs.find(|a| a.is_ipv4()).map(|a| a.ip()),
        Ok(Err(e)) => {
            tracing::debug!("cannot resolve {}: {}", hostname, e);
            None
        }
        Err(_) => {
            tracing::debug!("resolving {} timed out", hostname);
            None
        }
    }
}

/// Probe every host of `subnets` and keep the lowest address that served a
/// settings page. Probes that fail are skipped.
async fn locate_in_subnets(
    transport: Arc<dyn Transport>,
    options: &DiscoveryOptions,
    subnets: &[Ipv4Network],
) -> Result<(String, Settings)> {
    if subnets.is_empty() {
        return Err(Error::Discovery("no local IPv4 network to scan".to_string()));
    }

    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut probes = JoinSet::new();
    for subnet in subnets {
        tracing::info!("Scanning {} for a router...", subnet);
        for ip in utils::host_addresses(subnet) {
            let transport = transport.clone();
            let permits = permits.clone();
            let timeout = options.probe_timeout;
            probes.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                get_current_setting(transport.as_ref(), &ip.to_string(), timeout)
                    .await
                    .ok()
                    .map(|settings| (ip, settings))
            });
        }
    }

    let mut found: Vec<(Ipv4Addr, Settings)> = Vec::new();
    while let Some(joined) = probes.join_next().await {
        if let Ok(Some(hit)) = joined {
            found.push(hit);
        }
    }
    found.sort_by_key(|(ip, _)| *ip);

    let (ip, settings) = found
        .into_iter()
        .next()
        .ok_or_else(|| Error::Discovery("no router answered on the local network".to_string()))?;
    tracing::info!("Router found at {}", ip);
    Ok((ip.to_string(), settings))
}
