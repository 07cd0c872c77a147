//! Substitution engine
//!
//! Replaces `<<key>>` placeholders with environment values in one pass.
//! Substituted text is never rescanned, so values cannot chain into
//! further placeholders.

use courier_domain::{
    ApiRequest, AuthConfig, FormField, MultipartField, RequestBody, VariableSnapshot,
};

use super::parser::parse_placeholders;

/// Replaces every known `<<key>>` in `template` with `vars[key]`.
///
/// Unknown keys are left literal.
///
/// # Examples
///
/// ```
/// use courier_application::substitute;
/// use courier_domain::VariableSnapshot;
///
/// let mut vars = VariableSnapshot::new();
/// vars.insert("A".to_string(), "<<B>>".to_string());
/// vars.insert("B".to_string(), "x".to_string());
/// assert_eq!(substitute("<<A>>", &vars), "<<B>>");
/// ```
#[must_use]
pub fn substitute(template: &str, vars: &VariableSnapshot) -> String {
    let references = parse_placeholders(template);
    if references.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for reference in references {
        if let Some(value) = vars.get(&reference.key) {
            out.push_str(&template[last..reference.span.start]);
            out.push_str(value);
            last = reference.span.end;
        }
    }
    out.push_str(&template[last..]);
    out
}

/// Returns the keys referenced by `template` that `vars` does not define.
#[must_use]
pub fn unresolved_keys(template: &str, vars: &VariableSnapshot) -> Vec<String> {
    parse_placeholders(template)
        .into_iter()
        .filter(|r| !vars.contains_key(&r.key))
        .map(|r| r.key)
        .collect()
}

/// Substitutes the URL, header values, query keys and values, body and
/// auth values of a request. Scripts are left untouched.
#[must_use]
pub fn substitute_request(request: &ApiRequest, vars: &VariableSnapshot) -> ApiRequest {
    let mut resolved = request.clone();
    resolved.url = substitute(&request.url, vars);

    for header in &mut resolved.headers {
        header.value = substitute(&header.value, vars);
    }
    for param in &mut resolved.query_params {
        param.key = substitute(&param.key, vars);
        param.value = substitute(&param.value, vars);
    }

    resolved.body = substitute_body(&request.body, vars);
    resolved.auth = substitute_auth(&request.auth, vars);
    resolved
}

fn substitute_body(body: &RequestBody, vars: &VariableSnapshot) -> RequestBody {
    match body {
        RequestBody::None => RequestBody::None,
        RequestBody::Json { content } => RequestBody::Json {
            content: substitute(content, vars),
        },
        RequestBody::Raw {
            content,
            content_type,
        } => RequestBody::Raw {
            content: substitute(content, vars),
            content_type: content_type.clone(),
        },
        RequestBody::UrlEncoded { fields } => RequestBody::UrlEncoded {
            fields: fields
                .iter()
                .map(|f| FormField {
                    key: substitute(&f.key, vars),
                    value: substitute(&f.value, vars),
                    enabled: f.enabled,
                })
                .collect(),
        },
        RequestBody::Multipart { fields } => RequestBody::Multipart {
            fields: fields
                .iter()
                .map(|field| match field {
                    MultipartField::Text {
                        key,
                        value,
                        enabled,
                    } => MultipartField::Text {
                        key: key.clone(),
                        value: substitute(value, vars),
                        enabled: *enabled,
                    },
                    file @ MultipartField::File { .. } => file.clone(),
                })
                .collect(),
        },
    }
}

fn substitute_auth(auth: &AuthConfig, vars: &VariableSnapshot) -> AuthConfig {
    match auth {
        AuthConfig::None => AuthConfig::None,
        AuthConfig::Bearer { token } => AuthConfig::Bearer {
            token: substitute(token, vars),
        },
        AuthConfig::Basic { username, password } => AuthConfig::Basic {
            username: substitute(username, vars),
            password: substitute(password, vars),
        },
        AuthConfig::ApiKey {
            key,
            value,
            location,
        } => AuthConfig::ApiKey {
            key: substitute(key, vars),
            value: substitute(value, vars),
            location: *location,
        },
        AuthConfig::OAuth2 { access_token } => AuthConfig::OAuth2 {
            access_token: access_token.as_deref().map(|t| substitute(t, vars)),
        },
    }
}
