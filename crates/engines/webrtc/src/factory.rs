//! Engine factory: one tokio runtime and one webrtc-rs API shared by every
//! peer connection it creates

use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::{info, instrument};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine as CodecRegistry;
use webrtc::api::{APIBuilder, API};
use webrtc::interceptor::registry::Registry;

use signalbridge_peer::{EngineFactory, Error, EventSink, MediaEngine, Result, SessionConfig};

use crate::convert;
use crate::engine::WebRtcEngine;

pub struct WebRtcEngineFactory {
    runtime: Arc<Runtime>,
    api: Arc<API>,
}

impl std::fmt::Debug for WebRtcEngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcEngineFactory").finish_non_exhaustive()
    }
}

impl WebRtcEngineFactory {
    /// Factory with one worker thread per CPU
    pub fn new() -> Result<Self> {
        Self::with_worker_threads(num_cpus::get())
    }

    /// # Errors
    ///
    /// * `Error::InvalidConfig` - `worker_threads` is zero
    /// * `Error::EngineUnavailable` - the runtime or codec registry could not be built
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self> {
        if worker_threads == 0 {
            return Err(Error::InvalidConfig(
                "worker_threads must be greater than 0".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("engine-worker")
            .enable_all()
            .build()
            .map_err(|e| Error::EngineUnavailable(format!("Failed to start runtime: {}", e)))?;

        let api = build_api()?;
        info!(worker_threads, "webrtc engine factory ready");

        Ok(Self {
            runtime: Arc::new(runtime),
            api: Arc::new(api),
        })
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

fn build_api() -> Result<API> {
    let mut codecs = CodecRegistry::default();
    codecs
        .register_default_codecs()
        .map_err(|e| Error::EngineUnavailable(format!("Failed to register codecs: {}", e)))?;

    let interceptors = register_default_interceptors(Registry::new(), &mut codecs)
        .map_err(|e| Error::EngineUnavailable(format!("Failed to register interceptors: {}", e)))?;

    Ok(APIBuilder::new()
        .with_media_engine(codecs)
        .with_interceptor_registry(interceptors)
        .build())
}

impl EngineFactory for WebRtcEngineFactory {
    #[instrument(skip_all, fields(label = ?config.label))]
    fn create_engine(&self, config: &SessionConfig, sink: EventSink) -> Result<Arc<dyn MediaEngine>> {
        let api = self.api.clone();
        let rtc_config = convert::rtc_configuration(config);

        let pc = futures::executor::block_on(
            self.runtime
                .spawn(async move { api.new_peer_connection(rtc_config).await }),
        )
        .map_err(|e| Error::EngineUnavailable(format!("engine task failed: {}", e)))?
        .map_err(|e| Error::EngineUnavailable(format!("Failed to create peer connection: {}", e)))?;

        Ok(Arc::new(WebRtcEngine::new(
            Arc::new(pc),
            self.runtime.clone(),
            sink,
        )))
    }

    fn name(&self) -> &str {
        "webrtc"
    }
}
