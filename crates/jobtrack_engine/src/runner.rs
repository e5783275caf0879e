use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use jobtrack_core::{IngestScope, JobRequest, StreamKind, TargetSnapshot};
use jobtrack_logging::track_debug;
use reqwest::header::ACCEPT;
use url::Url;

use crate::sse::SseDecoder;
use crate::types::{decode_snapshot, GenerateBody, StartBody};
use crate::{EngineConfig, RunnerError};

/// Raw `data:` payloads of one push channel, in arrival order.
pub type FrameStream = BoxStream<'static, Result<String, RunnerError>>;

/// The remote side that runs jobs against a target resource.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    /// Asks the runner to begin `request`. Returns once the runner accepted it.
    async fn start(&self, target: &str, request: &JobRequest) -> Result<(), RunnerError>;

    /// Reads the authoritative state of `target`.
    async fn fetch_snapshot(&self, target: &str) -> Result<TargetSnapshot, RunnerError>;

    /// Connects to a push endpoint of `target`.
    async fn open_stream(&self, target: &str, stream: StreamKind)
        -> Result<FrameStream, RunnerError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobRunner {
    base_url: Url,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl ReqwestJobRunner {
    pub fn new(config: &EngineConfig) -> Result<Self, RunnerError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| RunnerError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RunnerError::InvalidUrl(config.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        // Push channels stay open for minutes; only the connect phase is bounded.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self {
            base_url,
            client,
            stream_client,
        })
    }

    fn endpoint(&self, target: &str, tail: &[&str]) -> Result<Url, RunnerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RunnerError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(target)
            .extend(tail);
        Ok(url)
    }

    fn start_url(&self, target: &str, request: &JobRequest) -> Result<Url, RunnerError> {
        match request {
            JobRequest::Identify => self.endpoint(target, &["identify"]),
            JobRequest::Ingest {
                scope: IngestScope::All,
            } => self.endpoint(target, &["ingest"]),
            JobRequest::Ingest {
                scope: IngestScope::Single(reference),
            } => self.endpoint(target, &["references", reference.as_str(), "reingest"]),
            JobRequest::Populate { .. } => self.endpoint(target, &["generate"]),
        }
    }
}

#[async_trait::async_trait]
impl JobRunner for ReqwestJobRunner {
    async fn start(&self, target: &str, request: &JobRequest) -> Result<(), RunnerError> {
        let url = self.start_url(target, request)?;
        track_debug!("POST {} ({})", url, request.kind());

        let mut builder = self.client.post(url);
        if let JobRequest::Populate { sections } = request {
            if !sections.is_empty() {
                builder = builder.json(&GenerateBody { sections });
            }
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if body.is_empty() {
            return Ok(());
        }
        // Any 2xx body without an `error` field is an acceptance.
        match serde_json::from_slice::<StartBody>(&body) {
            Ok(StartBody {
                error: Some(message),
            }) => Err(RunnerError::Rejected(message)),
            _ => Ok(()),
        }
    }

    async fn fetch_snapshot(&self, target: &str) -> Result<TargetSnapshot, RunnerError> {
        let url = self.endpoint(target, &[])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::HttpStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode_snapshot(&body)
    }

    async fn open_stream(
        &self,
        target: &str,
        stream: StreamKind,
    ) -> Result<FrameStream, RunnerError> {
        let tail = match stream {
            StreamKind::Status => "status",
            StreamKind::IngestStatus => "ingest-status",
        };
        let url = self.endpoint(target, &[tail])?;
        track_debug!("GET {} (event stream)", url);

        let response = self
            .stream_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::HttpStatus(status.as_u16()));
        }

        let mut decoder = SseDecoder::new();
        let frames = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<String, RunnerError>> = match chunk {
                Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                Err(err) => vec![Err(map_reqwest_error(err))],
            };
            futures_util::stream::iter(items)
        });
        Ok(frames.boxed())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RunnerError {
    if err.is_timeout() {
        return RunnerError::Timeout(err.to_string());
    }
    if err.is_decode() {
        return RunnerError::Decode(err.to_string());
    }
    RunnerError::Network(err.to_string())
}
