//! URL construction, header assembly and body encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_domain::{
    ApiRequest, CookieJar, DomainError, DomainResult, MultipartField, RequestBody, ResolvedAuth,
};
use url::Url;

use crate::auth::apply_query_auth;
use crate::ports::{EncodedBody, MultipartPart};

const CONTENT_TYPE: &str = "Content-Type";
const COOKIE: &str = "Cookie";

/// Headers in send order.
pub type HeaderList = Vec<(String, String)>;

/// Parses `raw` as an absolute URL, prepending `https://` when it has no
/// scheme and host of its own.
///
/// # Errors
///
/// Returns [`DomainError::InvalidUrl`] when no host can be derived.
pub fn absolute_url(raw: &str) -> DomainResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidUrl("URL is empty".to_string()));
    }
    if let Ok(url) = Url::parse(trimmed)
        && url.has_host()
    {
        return Ok(url);
    }
    Url::parse(&format!("https://{trimmed}"))
        .ok()
        .filter(Url::has_host)
        .ok_or_else(|| DomainError::InvalidUrl(format!("cannot parse '{trimmed}' as a URL")))
}

/// Builds the final URL: normalization, then enabled query parameters,
/// then a query-parameter credential.
///
/// # Errors
///
/// Returns [`DomainError::InvalidUrl`] when the URL cannot be parsed.
pub fn build_url(request: &ApiRequest, auth: Option<&ResolvedAuth>) -> DomainResult<Url> {
    let mut url = absolute_url(&request.url)?;

    let params: Vec<_> = request
        .enabled_query_params()
        .filter(|p| !p.key.is_empty())
        .collect();
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for param in params {
            pairs.append_pair(&param.key, &param.value);
        }
    }

    apply_query_auth(&mut url, auth);
    Ok(url)
}

/// Collects enabled headers, then the credential header, which replaces
/// any user header of the same name.
#[must_use]
pub fn build_headers(request: &ApiRequest, auth: Option<&ResolvedAuth>) -> HeaderList {
    let mut headers: HeaderList = request
        .enabled_headers()
        .filter(|h| !h.name.trim().is_empty())
        .map(|h| (h.name.trim().to_string(), h.value.clone()))
        .collect();

    if let Some(ResolvedAuth::Header { name, value }) = auth {
        headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }
    headers
}

/// Adds jar cookies matching the URL's host and path as one `Cookie`
/// header. A user-supplied `Cookie` header is extended, not replaced.
///
/// Returns the number of cookies injected.
pub fn inject_cookies(headers: &mut HeaderList, jar: &CookieJar, url: &Url) -> usize {
    let Some(host) = url.host_str() else {
        return 0;
    };
    let selected = jar.select(host, url.path());
    if selected.is_empty() {
        return 0;
    }
    let jar_value = selected
        .iter()
        .map(|c| c.to_pair())
        .collect::<Vec<_>>()
        .join("; ");

    match headers
        .iter_mut()
        .find(|(n, _)| n.eq_ignore_ascii_case(COOKIE))
    {
        Some((_, existing)) if !existing.trim().is_empty() => {
            existing.push_str("; ");
            existing.push_str(&jar_value);
        }
        Some((_, existing)) => *existing = jar_value,
        None => headers.push((COOKIE.to_string(), jar_value)),
    }
    selected.len()
}

/// Encodes the body and adjusts the content type header to match.
///
/// Methods that carry no body drop it. Multipart bodies strip any explicit
/// content type so the transport can add its own boundary.
///
/// # Errors
///
/// Returns [`DomainError::InvalidBody`] for undecodable file parts or form
/// fields that cannot be serialized.
pub fn encode_body(request: &ApiRequest, headers: &mut HeaderList) -> DomainResult<EncodedBody> {
    if !request.method.allows_body() {
        return Ok(EncodedBody::Empty);
    }

    let body = match &request.body {
        RequestBody::None => EncodedBody::Empty,
        RequestBody::Json { content } | RequestBody::Raw { content, .. } => {
            EncodedBody::Text(content.clone())
        }
        RequestBody::UrlEncoded { fields } => {
            let pairs: Vec<(&str, &str)> = fields
                .iter()
                .filter(|f| f.enabled)
                .map(|f| (f.key.as_str(), f.value.as_str()))
                .collect();
            let encoded = serde_urlencoded::to_string(pairs)
                .map_err(|e| DomainError::InvalidBody(e.to_string()))?;
            EncodedBody::Text(encoded)
        }
        RequestBody::Multipart { fields } => {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(CONTENT_TYPE));
            return fields
                .iter()
                .filter(|f| f.is_enabled())
                .map(multipart_part)
                .collect::<DomainResult<Vec<_>>>()
                .map(EncodedBody::Multipart);
        }
    };

    if let Some(content_type) = request.body.implied_content_type()
        && !headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(CONTENT_TYPE))
    {
        headers.push((CONTENT_TYPE.to_string(), content_type.to_string()));
    }
    Ok(body)
}

fn multipart_part(field: &MultipartField) -> DomainResult<MultipartPart> {
    match field {
        MultipartField::Text { key, value, .. } => Ok(MultipartPart::Text {
            name: key.clone(),
            value: value.clone(),
        }),
        MultipartField::File {
            key,
            file_name,
            content_type,
            data,
            ..
        } => {
            let bytes = STANDARD.decode(data.trim()).map_err(|e| {
                DomainError::InvalidBody(format!("file part '{key}' is not valid base64: {e}"))
            })?;
            Ok(MultipartPart::File {
                name: key.clone(),
                file_name: file_name.clone(),
                content_type: content_type.clone(),
                data: bytes,
            })
        }
    }
}
