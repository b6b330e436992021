#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use edaclient::client::{ApiRequest, RawResponse, Transport};
use edaclient::{ApiClient, ClientConfig, ClientError, SizeLimits};

/// In-process transport: records every request, replays canned replies.
#[derive(Default)]
pub struct RecordingTransport {
    pub requests: Mutex<Vec<ApiRequest>>,
    replies: Mutex<VecDeque<Result<RawResponse, ClientError>>>,
}

impl RecordingTransport {
    pub fn replying(replies: Vec<Result<RawResponse, ClientError>>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ClientError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport(None, "no canned reply")))
    }
}

pub fn json_reply(status: u16, body: serde_json::Value) -> Result<RawResponse, ClientError> {
    Ok(RawResponse {
        status,
        content_type: Some("application/json".to_string()),
        content_disposition: None,
        body: body.to_string().into_bytes(),
    })
}

pub fn text_reply(status: u16, body: &str) -> Result<RawResponse, ClientError> {
    Ok(RawResponse {
        status,
        content_type: Some("text/plain".to_string()),
        content_disposition: None,
        body: body.as_bytes().to_vec(),
    })
}

pub fn client_with(
    limits: SizeLimits,
    replies: Vec<Result<RawResponse, ClientError>>,
) -> ApiClient<RecordingTransport> {
    let cfg = ClientConfig::default()
        .with_base("http://backend.test")
        .with_limits(limits);
    ApiClient::with_transport(&cfg, RecordingTransport::replying(replies)).unwrap()
}

/// Deterministic bytes that deflate barely shrinks.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

pub fn analysis_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "analysis_id": id,
        "summary": {"rows": 3, "columns": 2},
        "columns": [{"name": "c", "dtype": "object", "missing": 0}],
        "charts": {"histograms": [], "barCounts": []},
        "insights": ["Data looks healthy."],
        "forecast": null,
        "forecast_reason": "no datetime column",
        "detected": {"date_col": null},
        "preview_rows": [{"c": "a", "n": 1}, {"c": "b", "n": 2}, {"c": "a", "n": 3}]
    })
}
