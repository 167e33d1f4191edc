//! Application state.

use std::sync::Arc;
use std::time::Duration;

use eyeblur_media::PipelineConfig;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PipelineConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, pipeline: PipelineConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("eyeblur/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            http,
        })
    }
}
