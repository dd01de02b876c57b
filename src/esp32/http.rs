//! HTTP push backend using the ESP-IDF HTTP client

use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::{Read, Write};
use std::time::Duration;

use crate::notifier::{HttpResponse, PushClient};
use crate::types::NotifyError;

/// Opens a fresh connection per notification
#[derive(Default)]
pub struct EspPushClient;

impl EspPushClient {
    pub fn new() -> Self {
        Self
    }
}

impl PushClient for EspPushClient {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, NotifyError> {
        let config = Configuration {
            timeout: Some(timeout),
            ..Default::default()
        };
        let mut connection = EspHttpConnection::new(&config).map_err(transport_error)?;

        let content_length = body.len().to_string();
        let mut all_headers = headers.to_vec();
        all_headers.push(("Content-Length", content_length.as_str()));

        connection
            .initiate_request(Method::Post, url, &all_headers)
            .map_err(transport_error)?;
        connection.write_all(body).map_err(transport_error)?;
        connection.initiate_response().map_err(transport_error)?;

        let status = connection.status();
        let mut response = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let bytes_read = connection.read(&mut buf).map_err(transport_error)?;
            if bytes_read == 0 {
                break;
            }
            response.extend_from_slice(&buf[..bytes_read]);
        }

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&response).into_owned(),
        })
    }
}

fn transport_error<E: std::fmt::Debug>(e: E) -> NotifyError {
    NotifyError::Transport(format!("{:?}", e))
}
