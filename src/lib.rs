pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod loader;
pub mod logging;
pub mod report;
pub mod rows;
pub mod upload;

pub use client::{AnalysisResult, ApiClient, HttpTransport, Transport};
pub use config::{ClientConfig, SizeLimits};
pub use error::ClientError;
pub use upload::UploadRequest;
