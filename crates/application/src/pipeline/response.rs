//! Decoding of transport responses.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_domain::{Cookie, ResponseBody, ResponseSpec, StatusCode};
use mime::Mime;

use crate::ports::TransportResponse;

/// Turns a raw transport response into the stored response.
///
/// JSON content types decode to a structured value (falling back to text
/// when the payload is not valid JSON), binary types become a base64
/// envelope and everything else is text. `size_bytes` is measured on the
/// decoded body, see [`ResponseBody::serialized_len`].
#[must_use]
pub fn parse_response(raw: &TransportResponse, elapsed_ms: u64) -> ResponseSpec {
    let headers = collect_headers(raw);
    let content_type = headers.get("content-type").cloned();
    let body = decode_body(content_type.as_deref(), &raw.body);

    let status_text = if raw.status_text.trim().is_empty() {
        StatusCode::new(raw.status).reason_phrase().to_string()
    } else {
        raw.status_text.clone()
    };

    ResponseSpec {
        status: raw.status,
        status_text,
        size_bytes: body.serialized_len(),
        headers,
        body,
        content_type,
        elapsed_ms,
    }
}

/// Cookies set by the response for `host`.
#[must_use]
pub fn response_cookies(raw: &TransportResponse, host: &str) -> Vec<Cookie> {
    raw.headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .filter_map(|(_, value)| Cookie::from_set_cookie(value, host))
        .collect()
}

/// Lower-cases names and joins repeated headers with `, `.
fn collect_headers(raw: &TransportResponse) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &raw.headers {
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    headers
}

fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> ResponseBody {
    let mime = content_type.and_then(|ct| ct.parse::<Mime>().ok());

    match mime.as_ref().map(classify_mime) {
        Some(BodyKind::Json) => serde_json::from_slice(bytes).map_or_else(
            |_| text(bytes),
            |value| ResponseBody::Json { value },
        ),
        Some(BodyKind::Binary) => ResponseBody::binary(STANDARD.encode(bytes)),
        Some(BodyKind::Text) | None => text(bytes),
    }
}

enum BodyKind {
    Json,
    Binary,
    Text,
}

fn classify_mime(mime: &Mime) -> BodyKind {
    let (top, sub) = (mime.type_(), mime.subtype());

    if sub == mime::JSON || mime.suffix() == Some(mime::JSON) {
        BodyKind::Json
    } else if top == mime::IMAGE && sub == mime::SVG {
        BodyKind::Text
    } else if top == mime::IMAGE || top == mime::AUDIO || top == mime::VIDEO || top == mime::FONT {
        BodyKind::Binary
    } else if top == mime::APPLICATION
        && (sub == mime::OCTET_STREAM
            || sub == mime::PDF
            || matches!(sub.as_str(), "zip" | "gzip" | "wasm" | "x-tar"))
    {
        BodyKind::Binary
    } else {
        BodyKind::Text
    }
}

fn text(bytes: &[u8]) -> ResponseBody {
    ResponseBody::Text {
        text: String::from_utf8_lossy(bytes).into_owned(),
    }
}
