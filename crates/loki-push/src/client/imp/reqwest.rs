use crate::client::headers;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct HttpClient {
    inner: reqwest::blocking::Client,
}

#[must_use = "RequestBuilder does nothing until you 'send' it"]
pub(crate) struct RequestBuilder {
    inner: reqwest::blocking::RequestBuilder,
}

pub(crate) struct Response {
    pub(crate) inner: reqwest::blocking::Response,
}

pub(crate) struct StatusCode {
    pub(crate) inner: reqwest::StatusCode,
}

pub type Error = reqwest::Error;
type Result<T, E = Error> = std::result::Result<T, E>;

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: reqwest::blocking::ClientBuilder::new()
                .user_agent(headers::USER_AGENT_VALUE)
                .timeout(timeout)
                .default_headers(HeaderMap::from_iter([(
                    HeaderName::from_static(headers::CONTENT_TYPE),
                    HeaderValue::from_static(headers::JSON_CONTENT_TYPE),
                )]))
                .build()?,
        })
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        RequestBuilder {
            inner: self.inner.post(url),
        }
    }
}

impl RequestBuilder {
    pub fn body(self, body: Vec<u8>) -> RequestBuilder {
        RequestBuilder {
            inner: self.inner.body(body),
        }
    }

    /// Sends the request. Non-success statuses are returned as responses, not errors.
    pub fn send(self) -> Result<Response> {
        Ok(Response {
            inner: self.inner.send()?,
        })
    }
}
