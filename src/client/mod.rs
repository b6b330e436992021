use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::{ClientConfig, SizeLimits};
use crate::error::ClientError;
use crate::logging::{log, log_failure, log_request, obj, v_str, Domain, Level};
use crate::report::{file_name_from_disposition, ReportFile, ReportFormat};
use crate::upload::{prepare_upload, UploadPayload, UploadRequest};

mod transport;
pub mod types;

pub use transport::HttpTransport;
pub use types::{AiReport, AnalysisResult, HealthStatus, ReportSource};

/// Multipart field the backend reads the dataset from.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart { field: String, payload: UploadPayload },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
}

/// Status, the two headers the client reads, and the raw body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and hands back whatever came back. Implementations
/// must not retry; non-2xx statuses are returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ClientError>;
}

/// Typed client for the analysis backend.
pub struct ApiClient<T: Transport = HttpTransport> {
    transport: T,
    base: Url,
    limits: SizeLimits,
}

impl ApiClient<HttpTransport> {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(cfg)?;
        Self::with_transport(cfg, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(cfg: &ClientConfig, transport: T) -> Result<Self, ClientError> {
        let base = cfg.resolve_base_url()?;
        log(
            Level::Info,
            Domain::System,
            "client_ready",
            obj(&[
                ("base_url", v_str(base.as_str())),
                ("raw_max_bytes", cfg.limits.raw_max_bytes.into()),
                ("zip_max_bytes", cfg.limits.zip_max_bytes.into()),
                ("zip_allowed", cfg.limits.zip_allowed.into()),
            ]),
        );
        Ok(Self {
            transport,
            base,
            limits: cfg.limits,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Exactly one transport call; non-2xx becomes a `Transport` error.
    async fn execute(
        &self,
        domain: Domain,
        operation: &str,
        request: ApiRequest,
    ) -> Result<RawResponse, ClientError> {
        log_request(domain, request.method.as_str(), request.url.as_str());
        let result = match self.transport.send(request).await {
            Ok(resp) if resp.is_success() => Ok(resp),
            Ok(resp) => Err(ClientError::from_response(resp.status, &resp.body)),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            log_failure(domain, operation, &err.message(), err.status());
        }
        result
    }

    async fn execute_json<R: DeserializeOwned>(
        &self,
        domain: Domain,
        operation: &str,
        request: ApiRequest,
    ) -> Result<R, ClientError> {
        let resp = self.execute(domain, operation, request).await?;
        serde_json::from_slice(&resp.body).map_err(|e| {
            let err = ClientError::transport(
                Some(resp.status),
                format!("Malformed response from server: {}", e),
            );
            log_failure(domain, operation, &err.message(), err.status());
            err
        })
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let request = ApiRequest {
            method: Method::Get,
            url: self.endpoint(&["health"]),
            body: RequestBody::Empty,
        };
        self.execute_json(Domain::Fetch, "health", request).await
    }

    /// Upload a dataset for analysis.
    ///
    /// The size policy runs first; a refused file never reaches the
    /// transport. The backend's JSON is returned unmodified.
    pub async fn analyze(&self, file: Option<&UploadRequest>) -> Result<Value, ClientError> {
        let payload = prepare_upload(file, &self.limits)?;
        let request = ApiRequest {
            method: Method::Post,
            url: self.endpoint(&["analyze"]),
            body: RequestBody::Multipart {
                field: FILE_FIELD.to_string(),
                payload,
            },
        };
        let value: Value = self.execute_json(Domain::Upload, "analyze", request).await?;
        if let Some(id) = value.get("analysis_id").and_then(|v| v.as_str()) {
            log(
                Level::Info,
                Domain::Upload,
                "analyzed",
                obj(&[("analysis_id", v_str(id))]),
            );
        }
        Ok(value)
    }

    /// `analyze` followed by parsing into an [`AnalysisResult`].
    pub async fn analyze_result(
        &self,
        file: Option<&UploadRequest>,
    ) -> Result<AnalysisResult, ClientError> {
        let value = self.analyze(file).await?;
        AnalysisResult::from_value(value)
            .map_err(|e| ClientError::transport(None, format!("Malformed response from server: {}", e)))
    }

    pub async fn fetch_analysis(&self, analysis_id: &str) -> Result<AnalysisResult, ClientError> {
        let id = require_id(analysis_id)?;
        let request = ApiRequest {
            method: Method::Get,
            url: self.endpoint(&["analysis", id]),
            body: RequestBody::Empty,
        };
        self.execute_json(Domain::Fetch, "fetch_analysis", request).await
    }

    pub async fn ai_report(&self, source: &ReportSource) -> Result<AiReport, ClientError> {
        if let ReportSource::Id(id) = source {
            require_id(id)?;
        }
        let request = ApiRequest {
            method: Method::Post,
            url: self.endpoint(&["ai-report"]),
            body: RequestBody::Json(source.to_body()),
        };
        self.execute_json(Domain::Report, "ai_report", request).await
    }

    pub async fn download_report(
        &self,
        analysis_id: &str,
        format: ReportFormat,
    ) -> Result<ReportFile, ClientError> {
        let id = require_id(analysis_id)?;
        let mut url = self.endpoint(&["download-report"]);
        url.query_pairs_mut()
            .append_pair("analysis_id", id)
            .append_pair("format", format.as_str());
        let request = ApiRequest {
            method: Method::Get,
            url,
            body: RequestBody::Empty,
        };
        let resp = self.execute(Domain::Report, "download_report", request).await?;
        let file_name = resp
            .content_disposition
            .as_deref()
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| format.default_file_name(id));
        let content_type = resp
            .content_type
            .clone()
            .unwrap_or_else(|| format.content_type().to_string());
        log(
            Level::Info,
            Domain::Report,
            "downloaded",
            obj(&[
                ("analysis_id", v_str(id)),
                ("file_name", v_str(&file_name)),
                ("bytes", resp.body.len().into()),
            ]),
        );
        Ok(ReportFile {
            file_name,
            content_type,
            bytes: resp.body,
        })
    }
}

fn require_id(analysis_id: &str) -> Result<&str, ClientError> {
    let id = analysis_id.trim();
    if id.is_empty() {
        return Err(ClientError::input("No analysis id provided"));
    }
    Ok(id)
}
