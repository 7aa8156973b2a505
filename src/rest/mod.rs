//! JSON-over-HTTP helper shared by both registry backends
//!
//! [`RestClient`] knows nothing about registries. It sends GET/HEAD/POST/DELETE requests with
//! an optional JSON payload, merges a set of session headers (usually `Authorization`) onto
//! every request and decodes JSON responses. HEAD responses have no body, so the response
//! header set is serialized as the body instead and decoded like any other payload.

use crate::logging::Logger;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const JSON_MIME: &str = "application/json";
const HIDDEN: &str = "---HIDDEN---";

#[derive(Debug, Error)]
pub enum RestError {
    #[error("cannot serialise payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },
    #[error("error executing request: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx answer. The body is kept for diagnostics.
    #[error("{status}")]
    Status { status: StatusCode, body: Vec<u8> },
    #[error("cannot decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RestError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RestError::Status { status, .. } => Some(*status),
            RestError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Response header set, keyed by lower-cased header name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet(BTreeMap<String, Vec<String>>);

impl HeaderSet {
    /// First value of a header, name matched case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl From<&HeaderMap> for HeaderSet {
    fn from(headers: &HeaderMap) -> Self {
        let mut set: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            set.entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        HeaderSet(set)
    }
}

/// Raw outcome of a request that reached the server
#[derive(Debug)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderSet,
    pub body: Vec<u8>,
}

pub struct RestClientBuilder {
    skip_tls: bool,
    dump: bool,
    output: Option<Logger>,
}

impl RestClientBuilder {
    pub fn new() -> Self {
        Self {
            skip_tls: false,
            dump: false,
            output: None,
        }
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> Result<RestClient, RestError> {
        let client = if self.skip_tls {
            Client::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            Client::builder().build()?
        };

        Ok(RestClient {
            client,
            headers: BTreeMap::new(),
            dump: self.dump,
            output: self.output.unwrap_or_else(|| Logger::new(false)),
        })
    }
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RestClient {
    client: Client,
    headers: BTreeMap<String, String>,
    dump: bool,
    output: Logger,
}

impl RestClient {
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// Header sent with every following request
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }

    /// Send a request and return whatever the server answered.
    ///
    /// Any non-2xx answer to a non-HEAD request is an error. HEAD answers are always
    /// returned so callers can inspect the status and headers themselves.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        payload: Option<Vec<u8>>,
        extra_headers: &[(&str, &str)],
    ) -> Result<RestResponse, RestError> {
        let is_head = method == Method::HEAD;
        if self.dump {
            self.output.dump(&format!("request > {} {}", method, url));
        }

        let mut headers = HeaderMap::new();
        if payload.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME));
        }
        if !is_head {
            headers.insert(ACCEPT, HeaderValue::from_static(JSON_MIME));
        }
        for (name, value) in self
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .chain(extra_headers.iter().copied())
        {
            headers.insert(Self::header_name(name)?, Self::header_value(name, value)?);
        }

        if self.dump {
            self.dump_headers("request headers", &headers);
            if let Some(body) = &payload {
                self.output.dump(&format!(
                    "payload ---\n{}\npayload ---",
                    String::from_utf8_lossy(body)
                ));
            }
        }

        tracing::debug!(%method, %url, "sending request");
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = payload {
            request = request.body(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        tracing::debug!(%url, %status, "received response");

        if self.dump {
            self.dump_headers("response headers", &response_headers);
        }

        let headers = HeaderSet::from(&response_headers);
        if is_head {
            let body = serde_json::to_vec(&headers).map_err(RestError::Decode)?;
            return Ok(RestResponse {
                status,
                headers,
                body,
            });
        }

        let body = response.bytes().await?.to_vec();
        if self.dump {
            self.output.dump(&format!(
                "response ---\n{}\nresponse ---",
                String::from_utf8_lossy(&body)
            ));
        }

        if !status.is_success() {
            return Err(RestError::Status { status, body });
        }

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, RestError> {
        self.get_with(url, &[]).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let response = self.execute(Method::GET, url, None, extra_headers).await?;
        Self::decode(&response.body)
    }

    /// HEAD request decoded from the serialized response header set
    pub async fn head<T: DeserializeOwned>(
        &self,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let response = self.execute(Method::HEAD, url, None, extra_headers).await?;
        Self::decode(&response.body)
    }

    pub async fn post<P, T>(&self, url: &str, payload: &P) -> Result<T, RestError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(RestError::Payload)?;
        let response = self.execute(Method::POST, url, Some(body), &[]).await?;
        Self::decode(&response.body)
    }

    /// DELETE; any response body is ignored
    pub async fn delete(&self, url: &str) -> Result<(), RestError> {
        self.execute(Method::DELETE, url, None, &[]).await?;
        Ok(())
    }

    fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RestError> {
        serde_json::from_slice(body).map_err(RestError::Decode)
    }

    fn header_name(name: &str) -> Result<HeaderName, RestError> {
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| RestError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn header_value(name: &str, value: &str) -> Result<HeaderValue, RestError> {
        HeaderValue::from_str(value).map_err(|e| RestError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn dump_headers(&self, title: &str, headers: &HeaderMap) {
        let mut lines = vec![format!("{} ---", title)];
        for (name, value) in headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            if name == AUTHORIZATION {
                lines.push(format!("{}: {}", name, redact_authorization(&value)));
            } else {
                lines.push(format!("{}: {}", name, value));
            }
        }
        lines.push(format!("{} ---", title));
        self.output.dump(&lines.join("\n"));
    }
}

/// Keep the scheme of an Authorization value and hide the credential
pub fn redact_authorization(value: &str) -> String {
    let mut parts: Vec<&str> = value.split(' ').collect();
    if let Some(last) = parts.last_mut() {
        *last = HIDDEN;
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_authorization() {
        assert_eq!(redact_authorization("Bearer abc.def"), "Bearer ---HIDDEN---");
        assert_eq!(redact_authorization("Basic dXNlcjpwYXNz"), "Basic ---HIDDEN---");
        assert_eq!(redact_authorization("rawtoken"), "---HIDDEN---");
    }

    #[test]
    fn test_header_set_lookup_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static("docker-content-digest"),
            HeaderValue::from_static("sha256:abc"),
        );
        map.append(
            HeaderName::from_static("www-authenticate"),
            HeaderValue::from_static("Bearer realm=\"a\",service=\"b\""),
        );
        map.append(
            HeaderName::from_static("www-authenticate"),
            HeaderValue::from_static("Basic realm=\"c\""),
        );

        let set = HeaderSet::from(&map);
        assert_eq!(set.get("Docker-Content-Digest"), Some("sha256:abc"));
        assert_eq!(set.get_all("WWW-Authenticate").len(), 2);
        assert!(set.get("Content-Type").is_none());
    }

    #[test]
    fn test_header_set_survives_body_encoding() {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME));
        let set = HeaderSet::from(&map);

        let body = serde_json::to_vec(&set).unwrap();
        let decoded: HeaderSet = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded.get("content-type"), Some(JSON_MIME));
    }
}
