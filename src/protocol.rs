//! SOAP call execution and response validation

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::session::SessionState;
use crate::soap::{self, Action, CODE_OK, CODE_UNAUTHORIZED, CONTROL_PATH};
use std::sync::Arc;

/// A response that passed validation (HTTP 200, response code 0)
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub response_code: u32,
}

/// Sends actions for a session and turns router replies into typed results
pub struct Protocol {
    transport: Arc<dyn Transport>,
    last_response: Option<HttpResponse>,
}

impl Protocol {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            last_response: None,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Raw reply to the most recent call; `None` if it never got a reply
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last_response.as_ref()
    }

    /// Send `body` (a `<v:Body>` fragment) as `action`.
    ///
    /// A 401 response code logs the session out. Cookies set by a successful
    /// reply are kept for later calls.
    pub async fn send(
        &mut self,
        session: &mut SessionState,
        action: &Action,
        body: &str,
    ) -> Result<SoapResponse> {
        let base_url = session
            .base_url()
            .ok_or_else(|| Error::Discovery("router host/port not set".to_string()))?;
        let envelope = soap::build_envelope(&session.session_id, body);

        let mut request = HttpRequest::post(
            format!("{}{}", base_url, CONTROL_PATH),
            envelope,
            session.timeout,
        )
        .header("SOAPAction", action.urn())
        .header("Content-Type", "text/xml; charset=utf-8");
        if let Some(cookie) = session.cookie() {
            request = request.header("Cookie", cookie);
        }

        tracing::debug!("SOAP {} -> {}", action, base_url);
        self.last_response = None;
        let resp = self.transport.execute(request).await?;
        self.last_response = Some(resp.clone());

        if resp.status != 200 {
            return Err(Error::HttpStatus(resp.status));
        }

        let code = soap::response_code(&resp.body).ok_or_else(|| {
            Error::Protocol(format!("no response code in reply to {}", action))
        })?;

        match code {
            CODE_OK => {
                if let Some(cookie) = session_cookie(&resp) {
                    session.set_cookie(cookie);
                }
                Ok(SoapResponse {
                    status: resp.status,
                    headers: resp.headers,
                    body: resp.body,
                    response_code: code,
                })
            }
            CODE_UNAUTHORIZED => {
                tracing::debug!("{} answered 401, session is no longer authenticated", action);
                session.invalidate();
                Err(Error::Auth(format!("{} rejected: not authenticated", action)))
            }
            _ => Err(Error::router(&action.to_string(), code)),
        }
    }
}

/// `name=value` pairs of every `Set-Cookie` header, joined for a `Cookie` header
fn session_cookie(resp: &HttpResponse) -> Option<String> {
    let pairs: Vec<&str> = resp
        .header_values("set-cookie")
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
