use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::client::{ApiRequest, Method, RawResponse, RequestBody, Transport};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Network transport backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ClientError> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { field, payload } => {
                let part = Part::bytes(payload.bytes)
                    .file_name(payload.file_name)
                    .mime_str(&payload.content_type)?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);
        let body = resp.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}
