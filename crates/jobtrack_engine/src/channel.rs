use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use jobtrack_core::{ProgressEvent, StreamKind};
use jobtrack_logging::{track_debug, track_warn};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::janitor::Disposable;
use crate::runner::FrameStream;
use crate::types::decode_frame;
use crate::{RunnerError, TrackError};

/// Receives what a [`ProgressChannel`] observes. Called from the channel task.
pub trait ChannelSink: Send + Sync + 'static {
    fn on_message(&self, event: ProgressEvent);
    fn on_error(&self, reason: String);
    /// The ceiling elapsed without a terminal frame.
    fn on_timeout(&self);
}

/// One push subscription to a job's progress stream.
///
/// The channel delivers decoded frames in order, drops malformed ones, and
/// closes itself after a terminal frame, an error, or when `ceiling` elapses.
/// Nothing is delivered after [`ChannelHandle::close`].
pub struct ProgressChannel;

impl ProgressChannel {
    pub fn open<F, S>(connect: F, stream: StreamKind, ceiling: Duration, sink: S) -> ChannelHandle
    where
        F: Future<Output = Result<FrameStream, RunnerError>> + Send + 'static,
        S: ChannelSink,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = pump(connect, stream, ceiling, &sink) => {}
            }
        });
        ChannelHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn pump<F, S>(connect: F, stream: StreamKind, ceiling: Duration, sink: &S)
where
    F: Future<Output = Result<FrameStream, RunnerError>>,
    S: ChannelSink,
{
    let deadline = Instant::now() + ceiling;
    let mut frames = match timeout_at(deadline, connect).await {
        Ok(Ok(frames)) => frames,
        Ok(Err(err)) => {
            let reason = err.to_string();
            track_warn!(
                "{:?} channel failed to connect: {}",
                stream,
                TrackError::ChannelError(reason.clone())
            );
            sink.on_error(reason);
            return;
        }
        Err(_) => {
            track_warn!("{:?} channel: {}", stream, TrackError::ChannelTimeout(ceiling));
            sink.on_timeout();
            return;
        }
    };

    loop {
        match timeout_at(deadline, frames.next()).await {
            Ok(Some(Ok(data))) => match decode_frame(stream, &data) {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    sink.on_message(event);
                    if terminal {
                        track_debug!("{:?} channel saw terminal frame", stream);
                        return;
                    }
                }
                Err(err) => track_warn!("dropping frame on {:?} channel: {}", stream, err),
            },
            Ok(Some(Err(err))) => {
                let reason = err.to_string();
                track_warn!("{:?} {}", stream, TrackError::ChannelError(reason.clone()));
                sink.on_error(reason);
                return;
            }
            Ok(None) => {
                let reason = "stream ended before a terminal frame".to_string();
                track_warn!("{:?} {}", stream, TrackError::ChannelError(reason.clone()));
                sink.on_error(reason);
                return;
            }
            Err(_) => {
                track_warn!("{:?} channel: {}", stream, TrackError::ChannelTimeout(ceiling));
                sink.on_timeout();
                return;
            }
        }
    }
}

pub struct ChannelHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Stops delivery. Idempotent.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.task.take();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl Disposable for ChannelHandle {
    fn dispose(&mut self) {
        self.close();
    }

    fn is_live(&self) -> bool {
        !self.is_closed()
    }
}
