//! Bearer challenge decoding and token responses for Registry v2 servers

use crate::error::{CleanupError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

/// Actions requested on the repository; deleting needs all three
pub const REQUIRED_SCOPE: &str = "pull,push,delete";

/// Challenge header name as sent by registries
pub const AUTH_HEADER: &str = "Www-Authenticate";

static VALID_AUTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[Bb]earer *((realm|service|scope|error)="[A-Za-z0-9_./:,@?&=%+-]+",? *){2,4}$"#)
        .expect("auth header grammar is a valid regex")
});

static AUTH_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(realm|service|scope|error)="([^"]*)""#).expect("auth param regex is valid")
});

/// Where and how to ask for a token, from a `WWW-Authenticate: Bearer ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: String,
}

impl AuthChallenge {
    /// Decode one challenge header value
    pub fn decode(header: &str) -> Result<Self> {
        let header = header.trim();
        if !VALID_AUTH_HEADER.is_match(header) {
            return Err(CleanupError::Authentication(format!(
                "invalid auth header: {}",
                header
            )));
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for caps in AUTH_PARAM.captures_iter(header) {
            let value = caps[2].to_string();
            match &caps[1] {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| {
            CleanupError::Authentication(format!("invalid auth header: no realm in {}", header))
        })?;

        Ok(Self {
            realm,
            service: service.unwrap_or_default(),
            scope: scope.unwrap_or_else(|| REQUIRED_SCOPE.to_string()),
        })
    }

    /// Decode the challenge carried by a probe response, if any.
    ///
    /// No header means the registry did not ask for a token. More than one is ambiguous.
    pub fn from_headers(values: &[String]) -> Result<Option<Self>> {
        match values {
            [] => Ok(None),
            [single] => Self::decode(single).map(Some),
            many => Err(CleanupError::Authentication(format!(
                "ambiguous auth challenge: {} {} headers",
                many.len(),
                AUTH_HEADER
            ))),
        }
    }

    /// Token endpoint URL granting [`REQUIRED_SCOPE`] on `repository`
    pub fn token_url(&self, repository: &str) -> Result<Url> {
        let mut url = Url::parse(&self.realm).map_err(|e| {
            CleanupError::Authentication(format!("invalid realm {}: {}", self.realm, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if !self.service.is_empty() {
                query.append_pair("service", &self.service);
            }
            query.append_pair("scope", &format!("repository:{}:{}", repository, REQUIRED_SCOPE));
        }
        Ok(url)
    }
}

/// Token endpoint answer; registries use either field name
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    pub fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

/// `Authorization` value for HTTP Basic credentials
pub fn basic_authorization(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

pub fn bearer_authorization(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_challenge() {
        let challenge = AuthChallenge::decode(
            r#"Bearer realm="https://auth.example/token",service="registry.example",scope="repository:foo:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.example/token");
        assert_eq!(challenge.service, "registry.example");
        assert_eq!(challenge.scope, "repository:foo:pull");
    }

    #[test]
    fn test_scope_defaults_to_required_scope() {
        let challenge = AuthChallenge::decode(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#,
        )
        .unwrap();
        assert_eq!(challenge.scope, REQUIRED_SCOPE);
    }

    #[test]
    fn test_lowercase_scheme_and_error_field() {
        let challenge = AuthChallenge::decode(
            r#"bearer realm="https://a.example/t",service="a.example",scope="repository:x/y:pull,push",error="insufficient_scope""#,
        )
        .unwrap();
        assert_eq!(challenge.scope, "repository:x/y:pull,push");
    }

    #[test]
    fn test_rejects_non_bearer_scheme() {
        let err = AuthChallenge::decode(r#"Basic realm="registry",service="a""#).unwrap_err();
        assert!(err.to_string().contains("invalid auth header"));
    }

    #[test]
    fn test_rejects_single_field() {
        assert!(AuthChallenge::decode(r#"Bearer realm="https://auth.example/token""#).is_err());
    }

    #[test]
    fn test_rejects_missing_realm() {
        let err =
            AuthChallenge::decode(r#"Bearer service="registry.example",scope="repository:a:pull""#)
                .unwrap_err();
        assert!(err.to_string().contains("no realm"));
    }

    #[test]
    fn test_from_headers_cardinality() {
        assert_eq!(AuthChallenge::from_headers(&[]).unwrap(), None);

        let one = vec![r#"Bearer realm="https://a/t",service="s""#.to_string()];
        assert!(AuthChallenge::from_headers(&one).unwrap().is_some());

        let two = vec![one[0].clone(), one[0].clone()];
        assert!(matches!(
            AuthChallenge::from_headers(&two),
            Err(CleanupError::Authentication(_))
        ));
    }

    #[test]
    fn test_token_url() {
        let challenge = AuthChallenge {
            realm: "https://auth.example/token".into(),
            service: "registry.example".into(),
            scope: REQUIRED_SCOPE.into(),
        };
        let url = challenge.token_url("acme/app").unwrap();
        assert_eq!(
            url.as_str(),
            "https://auth.example/token?service=registry.example&scope=repository%3Aacme%2Fapp%3Apull%2Cpush%2Cdelete"
        );
    }

    #[test]
    fn test_token_response_prefers_token() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"token":"a","access_token":"b","expires_in":300}"#).unwrap();
        assert_eq!(resp.into_token().as_deref(), Some("a"));

        let resp: TokenResponse = serde_json::from_str(r#"{"access_token":"b"}"#).unwrap();
        assert_eq!(resp.into_token().as_deref(), Some("b"));

        let resp: TokenResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(resp.into_token(), None);
    }

    #[test]
    fn test_basic_authorization() {
        assert_eq!(basic_authorization("user", "pass"), "Basic dXNlcjpwYXNz");
    }
}
