//! HTTP transport with timeouts and a request rate limiter
//!
//! The embedded web server in the router cannot cope with bursts of SOAP calls,
//! so [`HttpTransport`] lets at most a fixed number of requests start in any
//! one-second window. Retries are left to the callers.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, body: String, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Value of a request header, case-insensitive
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower-case; repeated headers appear once per value
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One HTTP exchange. Implementations must fail with [`Error::Timeout`] rather
/// than hang when `request.timeout` elapses, and must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// 0 disables rate limiting
    pub requests_per_second: usize,
    /// Routers serve self-signed certificates on their TLS ports
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            requests_per_second: 3,
            accept_invalid_certs: true,
        }
    }
}

pub struct HttpTransport {
    inner: Client,
    limiter: Option<Arc<Semaphore>>,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("netgear-soap/0.1 (SOAP client)"),
        );

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: client,
            limiter: (options.requests_per_second > 0)
                .then(|| Arc::new(Semaphore::new(options.requests_per_second))),
        })
    }

    /// Wait for a slot in the current window. The slot is handed back one
    /// window after the request started, whenever the request itself ends.
    async fn acquire_slot(&self) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        let permit = limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Transport(format!("rate limiter closed: {}", e)))?;
        let release_at = Instant::now() + RATE_WINDOW;
        tokio::spawn(async move {
            tokio::time::sleep_until(release_at).await;
            drop(permit);
        });
        Ok(())
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.inner.get(&request.url),
            Method::Post => self.inner.post(&request.url),
        };

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidInput(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidInput(format!("header value: {}", e)))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.timeout(request.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(request.timeout)
            } else {
                Error::from(e)
            }
        })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(request.timeout)
            } else {
                Error::from(e)
            }
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.acquire_slot().await?;

        let timeout = request.timeout;
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!("{:?} {} (timeout {:?})", method, url, timeout);

        // Outer guard: the request future is dropped (and the connection
        // aborted) once the deadline passes, even mid-body.
        match tokio::time::timeout(timeout, self.send(request)).await {
            Ok(Ok(resp)) => {
                tracing::debug!("{:?} {} -> {}", method, url, resp.status);
                Ok(resp)
            }
            Ok(Err(e)) => {
                tracing::debug!("{:?} {} failed: {}", method, url, e);
                Err(e)
            }
            Err(_) => {
                tracing::debug!("{:?} {} timed out", method, url);
                Err(Error::Timeout(timeout))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for tests: responses are looked up by SOAP action
    //! (or by URL for plain GETs) and every request is recorded.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    pub enum Reply {
        Ok(HttpResponse),
        Err(fn() -> Error),
    }

    #[derive(Default)]
    pub struct FakeTransport {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        fallback: Mutex<HashMap<String, HttpResponse>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    pub fn soap_body(code: &str, inner: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><soap-env:Envelope><soap-env:Body>{}<ResponseCode>{}</ResponseCode></soap-env:Body></soap-env:Envelope>",
            inner, code
        )
    }

    pub fn ok(body: String) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub fn code(code: &str) -> HttpResponse {
        ok(soap_body(code, ""))
    }

    fn key_for(request: &HttpRequest) -> String {
        request
            .header_value("SOAPAction")
            .map(|urn| urn.rsplit('#').next().unwrap_or(urn).to_string())
            .unwrap_or_else(|| request.url.clone())
    }

    impl FakeTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Queue a one-shot reply for an operation name (e.g. `SOAPLogin`) or URL
        pub fn push(&self, key: &str, reply: HttpResponse) {
            self.push_reply(key, Reply::Ok(reply));
        }

        pub fn push_err(&self, key: &str, err: fn() -> Error) {
            self.push_reply(key, Reply::Err(err));
        }

        fn push_reply(&self, key: &str, reply: Reply) {
            self.replies
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push_back(reply);
        }

        /// Reply used whenever the queue for `key` is empty
        pub fn always(&self, key: &str, reply: HttpResponse) {
            self.fallback.lock().unwrap().insert(key.to_string(), reply);
        }

        /// Operation names / URLs in request order
        pub fn calls(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(key_for).collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            let key = key_for(&request);
            self.requests.lock().unwrap().push(request);

            let queued = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(|q| q.pop_front());
            match queued {
                Some(Reply::Ok(resp)) => Ok(resp),
                Some(Reply::Err(make)) => Err(make()),
                None => self
                    .fallback
                    .lock()
                    .unwrap()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| Error::Transport(format!("connection refused: {}", key))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = HttpRequest::post("http://10.0.0.1:5000/soap/server_sa/", "<x/>".into(), Duration::from_secs(2))
            .header("SOAPAction", "urn:NETGEAR-ROUTER:service:DeviceInfo:1#GetInfo");
        assert_eq!(req.method, Method::Post);
        assert_eq!(
            req.header_value("soapaction"),
            Some("urn:NETGEAR-ROUTER:service:DeviceInfo:1#GetInfo")
        );
        assert_eq!(HttpRequest::get("http://x/", Duration::from_secs(1)).body, None);
    }

    #[test]
    fn test_response_header_values() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![
                ("set-cookie".into(), "a=1; Path=/".into()),
                ("content-type".into(), "text/xml".into()),
                ("set-cookie".into(), "b=2".into()),
            ],
            body: String::new(),
        };
        let cookies: Vec<_> = resp.header_values("Set-Cookie").collect();
        assert_eq!(cookies, vec!["a=1; Path=/", "b=2"]);
    }

    #[tokio::test]
    async fn test_rate_limiter_holds_third_request() {
        let transport = HttpTransport::new(&TransportOptions {
            requests_per_second: 2,
            ..TransportOptions::default()
        })
        .unwrap();

        let start = Instant::now();
        transport.acquire_slot().await.unwrap();
        transport.acquire_slot().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        transport.acquire_slot().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn test_zero_rate_disables_limiter() {
        let transport = HttpTransport::new(&TransportOptions {
            requests_per_second: 0,
            ..TransportOptions::default()
        })
        .unwrap();
        assert!(transport.limiter.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_fast() {
        let transport = HttpTransport::new(&TransportOptions::default()).unwrap();
        // Port 9 on localhost is closed on any sane test machine
        let err = transport
            .execute(HttpRequest::get("http://127.0.0.1:9/", Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_) | Error::Timeout(_)));
    }
}
