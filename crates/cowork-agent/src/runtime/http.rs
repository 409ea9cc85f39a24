//! Outbound HTTP for the `fetch_url` tool.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BOT_USER_AGENT: &str = "Cowork-Bot/1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    /// Defaults to GET when empty.
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Decoded JSON, text, or base64 for binary bodies.
    pub data: Value,
    pub content_type: String,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Final URL after redirects.
    pub url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed fetcher. Only `http` and `https` URLs are accepted.
pub struct ReqwestFetcher {
    http: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

pub(crate) fn effective_method(method: &str) -> String {
    let m = method.trim();
    if m.is_empty() {
        "GET".to_string()
    } else {
        m.to_uppercase()
    }
}

/// Serialise a request body: strings are sent verbatim, other JSON values as JSON text.
/// Returns `None` for GET requests and for absent, null or empty-string bodies.
pub(crate) fn encode_body(method: &str, body: Option<&Value>) -> Option<String> {
    if method == "GET" {
        return None;
    }
    match body? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn decode_body(content_type: &str, bytes: &[u8]) -> Value {
    if content_type.contains("application/json") {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
    } else if content_type.contains("text/") {
        Value::String(String::from_utf8_lossy(bytes).to_string())
    } else {
        Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = reqwest::Url::parse(&request.url).context("无效的 URL 格式")?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("只支持 HTTP 和 HTTPS 协议");
        }
        let method_name = effective_method(&request.method);
        let method = reqwest::Method::from_bytes(method_name.as_bytes())
            .with_context(|| format!("Invalid HTTP method: {}", method_name))?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BOT_USER_AGENT));
        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("Invalid header name: {}", key))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid header value for {}", key))?;
            headers.insert(name, value);
        }

        let body = encode_body(&method_name, request.body.as_ref());
        if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let resp = builder.send().await.context("网络请求失败")?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let response_headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let content_type = response_headers
            .get("content-type")
            .cloned()
            .unwrap_or_default();
        let bytes = resp.bytes().await.context("Failed to read response body")?;
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(url = %final_url, status = status.as_u16(), duration_ms, "fetched");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: response_headers,
            data: decode_body(&content_type, &bytes),
            content_type,
            duration_ms,
            url: final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_body_rules() {
        assert_eq!(encode_body("GET", Some(&json!({"a": 1}))), None);
        assert_eq!(encode_body("POST", Some(&json!("raw"))), Some("raw".to_string()));
        assert_eq!(
            encode_body("POST", Some(&json!({"a": 1}))),
            Some("{\"a\":1}".to_string())
        );
        assert_eq!(encode_body("PUT", Some(&Value::Null)), None);
        assert_eq!(encode_body("POST", None), None);
        assert_eq!(effective_method(" post "), "POST");
        assert_eq!(effective_method(""), "GET");
    }

    #[test]
    fn test_decode_body_by_content_type() {
        assert_eq!(
            decode_body("application/json; charset=utf-8", br#"{"ok":true}"#),
            json!({"ok": true})
        );
        assert_eq!(decode_body("text/html", b"<p>hi</p>"), json!("<p>hi</p>"));
        assert_eq!(decode_body("image/png", &[0xff, 0x00]), json!("/wA="));
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch(HttpRequest {
                url: "file:///etc/passwd".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP"));
    }
}
