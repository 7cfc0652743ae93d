//! SOAP envelope construction and response-code extraction

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Fixed session token required by the SOAP handshake. Not a credential.
pub const SESSION_ID: &str = "A7D88AE69687E58D9A00";

static RESPONSE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z0-9_]+:)?ResponseCode>\s*(-?\d+)\s*</(?:[A-Za-z0-9_]+:)?ResponseCode>")
        .expect("valid ResponseCode regex")
});

// Code points outside the XML 1.0 Char production. The router emits some of
// these inside device names.
static ILLEGAL_XML_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x{FFFE}\x{FFFF}]").expect("valid XML char regex")
});

/// Wrap an action body (`<v:Body>...</v:Body>`) in the SOAP envelope
pub fn build_envelope(session_id: &str, body: &str) -> String {
    format!(
        concat!(
            "<!--?xml version=\"1.0\" encoding= \"UTF-8\" ?-->\n",
            "<v:Envelope xmlns:v=\"http://schemas.xmlsoap.org/soap/envelope/\">\n",
            "<v:Header>\n",
            "<SessionID>{}</SessionID>\n",
            "</v:Header>\n",
            "{}\n",
            "</v:Envelope>"
        ),
        escape_xml(session_id),
        body
    )
}

/// Extract the `<ResponseCode>` value from a response body
pub fn response_code(body: &str) -> Option<u32> {
    let caps = RESPONSE_CODE.captures(body)?;
    let raw = caps.get(1)?.as_str();
    // Negative codes are not part of the protocol; treat them as unreadable
    raw.parse::<u32>().ok()
}

/// True when the body carries a response code, whatever its value
pub fn has_response_code(body: &str) -> bool {
    RESPONSE_CODE.is_match(body)
}

/// Remove code points that are illegal in XML 1.0 before structured parsing
pub fn strip_illegal_xml(body: &str) -> Cow<'_, str> {
    ILLEGAL_XML_CHARS.replace_all(body, "")
}

/// Escape a value for interpolation into element content
pub fn escape_xml(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Reverse of [`escape_xml`] for values read back from a response
pub fn unescape_xml(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}
