use crate::net::{Response, Session};
use anyhow::{anyhow, Context};
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::{Read, Write},
};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
use std::time::Duration;

/// Response bodies are only ever small JSON acknowledgements.
const MAX_BODY: usize = 2048;

/// An HTTPS client that keeps its connection open between requests, as long
/// as they use the same timeout.
#[derive(Default)]
pub struct EspSession {
    client: Option<(Duration, HttpClient<EspHttpConnection>)>,
}

// === impl EspSession ===

impl EspSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&mut self, timeout: Duration) -> anyhow::Result<&mut HttpClient<EspHttpConnection>> {
        if !matches!(self.client, Some((t, _)) if t == timeout) {
            let config = HttpClientConfiguration {
                timeout: Some(timeout),
                crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
                ..Default::default()
            };
            let conn = EspHttpConnection::new(&config).context("failed to create HTTP connection")?;
            self.client = Some((timeout, HttpClient::wrap(conn)));
        }
        self.client
            .as_mut()
            .map(|(_, client)| client)
            .ok_or_else(|| anyhow!("HTTP client missing"))
    }

    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> anyhow::Result<Response> {
        let result = (|| -> anyhow::Result<Response> {
            let client = self.client(timeout)?;
            let mut request = client
                .request(method, url, headers)
                .map_err(|e| anyhow!("{e:?}"))?;
            if !body.is_empty() {
                request.write_all(body).map_err(|e| anyhow!("{e:?}"))?;
                request.flush().map_err(|e| anyhow!("{e:?}"))?;
            }
            let mut response = request.submit().map_err(|e| anyhow!("{e:?}"))?;
            let status = response.status();

            let mut body = Vec::new();
            let mut chunk = [0u8; 256];
            while body.len() < MAX_BODY {
                let read = response.read(&mut chunk).map_err(|e| anyhow!("{e:?}"))?;
                if read == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..read]);
            }
            Ok(Response { status, body })
        })();

        // don't reuse a connection that may be in a bad state.
        if result.is_err() {
            self.client = None;
        }
        result.with_context(|| format!("{method:?} {url} failed"))
    }
}

impl Session for EspSession {
    fn get(&mut self, url: &str, timeout: Duration) -> anyhow::Result<Response> {
        self.request(Method::Get, url, &[], &[], timeout)
    }

    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> anyhow::Result<Response> {
        let content_len = body.len().to_string();
        let mut all_headers = Vec::with_capacity(headers.len() + 1);
        all_headers.extend_from_slice(headers);
        all_headers.push(("Content-Length", content_len.as_str()));
        self.request(Method::Post, url, &all_headers, body, timeout)
    }
}
