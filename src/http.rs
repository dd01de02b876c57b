//! HTTP push backend for desktop using the blocking reqwest client

use std::time::Duration;

use crate::notifier::{HttpResponse, PushClient};
use crate::types::NotifyError;

pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_error)?;

        Ok(Self { client })
    }
}

impl PushClient for ReqwestClient {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, NotifyError> {
        let request = headers.iter().fold(
            self.client.post(url).timeout(timeout).body(body.to_vec()),
            |request, (name, value)| request.header(*name, *value),
        );

        let response = request.send().map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(map_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_error(e: reqwest::Error) -> NotifyError {
    if e.is_timeout() {
        NotifyError::Timeout
    } else {
        NotifyError::Transport(e.to_string())
    }
}
