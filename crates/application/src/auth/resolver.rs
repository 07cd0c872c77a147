//! Resolution of auth configurations into concrete credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_domain::{ApiKeyLocation, AuthConfig, DomainError, DomainResult, ResolvedAuth};
use tracing::warn;
use url::Url;

const AUTHORIZATION: &str = "Authorization";

/// Resolves an auth configuration.
///
/// Returns `Ok(None)` when no credential applies. A bearer or `OAuth2`
/// config with a blank token resolves to nothing; acquiring the token is
/// not this resolver's job.
///
/// # Errors
///
/// Returns [`DomainError::InvalidAuth`] when an API key has no name.
pub fn resolve(config: &AuthConfig) -> DomainResult<Option<ResolvedAuth>> {
    let resolved = match config {
        AuthConfig::None => None,
        AuthConfig::Bearer { token } => {
            let credential = bearer(token);
            if credential.is_none() {
                warn!("bearer auth configured with an empty token, sending unauthenticated");
            }
            credential
        }
        AuthConfig::Basic { username, password } => {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            Some(ResolvedAuth::Header {
                name: AUTHORIZATION.to_string(),
                value: format!("Basic {encoded}"),
            })
        }
        AuthConfig::ApiKey {
            key,
            value,
            location,
        } => {
            let name = key.trim();
            if name.is_empty() {
                return Err(DomainError::InvalidAuth(
                    "API key name must not be empty".to_string(),
                ));
            }
            let (name, value) = (name.to_string(), value.clone());
            Some(match location {
                ApiKeyLocation::Header => ResolvedAuth::Header { name, value },
                ApiKeyLocation::Query => ResolvedAuth::QueryParam { name, value },
            })
        }
        AuthConfig::OAuth2 { access_token } => {
            let credential = access_token.as_deref().and_then(bearer);
            if credential.is_none() {
                warn!("oauth2 auth configured without an access token, sending unauthenticated");
            }
            credential
        }
    };
    Ok(resolved)
}

/// Appends a pending query-parameter credential to an absolute URL.
///
/// Header credentials are ignored here; they are applied to the header list.
pub fn apply_query_auth(url: &mut Url, auth: Option<&ResolvedAuth>) {
    if let Some(ResolvedAuth::QueryParam { name, value }) = auth {
        url.query_pairs_mut().append_pair(name, value);
    }
}

fn bearer(token: &str) -> Option<ResolvedAuth> {
    let token = token.trim();
    (!token.is_empty()).then(|| ResolvedAuth::Header {
        name: AUTHORIZATION.to_string(),
        value: format!("Bearer {token}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(name: &str, value: &str) -> Option<ResolvedAuth> {
        Some(ResolvedAuth::Header {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    #[test]
    fn test_none() {
        assert_eq!(resolve(&AuthConfig::None).unwrap(), None);
    }

    #[test]
    fn test_bearer() {
        assert_eq!(
            resolve(&AuthConfig::bearer("abc")).unwrap(),
            header("Authorization", "Bearer abc")
        );
    }

    #[test]
    fn test_blank_bearer_token_sends_nothing() {
        assert_eq!(resolve(&AuthConfig::bearer("")).unwrap(), None);
        assert_eq!(resolve(&AuthConfig::bearer(" \t ")).unwrap(), None);
    }

    #[test]
    fn test_basic_encodes_user_and_password() {
        assert_eq!(
            resolve(&AuthConfig::basic("u", "p")).unwrap(),
            header("Authorization", "Basic dTpw")
        );
    }

    #[test]
    fn test_api_key_locations() {
        assert_eq!(
            resolve(&AuthConfig::api_key("X-Api-Key", "k1", ApiKeyLocation::Header)).unwrap(),
            header("X-Api-Key", "k1")
        );
        assert_eq!(
            resolve(&AuthConfig::api_key("api_key", "k1", ApiKeyLocation::Query)).unwrap(),
            Some(ResolvedAuth::QueryParam {
                name: "api_key".to_string(),
                value: "k1".to_string(),
            })
        );
    }

    #[test]
    fn test_api_key_without_name_is_invalid() {
        let err = resolve(&AuthConfig::api_key("  ", "k1", ApiKeyLocation::Header)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidAuth(_)));
    }

    #[test]
    fn test_oauth2() {
        assert_eq!(
            resolve(&AuthConfig::oauth2("tok")).unwrap(),
            header("Authorization", "Bearer tok")
        );
        assert_eq!(
            resolve(&AuthConfig::OAuth2 { access_token: None }).unwrap(),
            None
        );
        assert_eq!(resolve(&AuthConfig::oauth2("")).unwrap(), None);
        assert_eq!(resolve(&AuthConfig::oauth2("  ")).unwrap(), None);
    }

    #[test]
    fn test_apply_query_auth() {
        let mut url = Url::parse("https://api.example/items?page=2").unwrap();
        let auth = resolve(&AuthConfig::api_key("key", "a b", ApiKeyLocation::Query)).unwrap();
        apply_query_auth(&mut url, auth.as_ref());
        assert_eq!(url.as_str(), "https://api.example/items?page=2&key=a+b");

        let mut untouched = Url::parse("https://api.example/items").unwrap();
        apply_query_auth(&mut untouched, header("Authorization", "x").as_ref());
        assert_eq!(untouched.as_str(), "https://api.example/items");
    }
}
