//! Cold, cancellable event stream for a single load.
//!
//! The stream is the reactive rendition of one submission: zero or more
//! progress events followed by exactly one terminal event. Nothing starts
//! until the first poll, and dropping the stream before the terminal event
//! cancels the underlying task. Events are never replayed; each stream is
//! one subscription and one load.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use crate::error::LoadError;
use crate::model::ImageRequest;
use crate::pipeline::{DispatchTarget, ImagePipeline, LoadSubmission};
use crate::task::{ImageResponse, ProgressUpdate, TaskHandle};

/// Progressive event emitted by a [`LoadStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// Intermediate progress snapshot.
    Progress(ProgressUpdate),
    /// Terminal success.
    Completed(ImageResponse),
    /// Terminal failure.
    Failed(LoadError),
}

impl LoadEvent {
    /// Machine-friendly discriminator for log consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

enum StreamState {
    Idle {
        pipeline: Arc<dyn ImagePipeline>,
        request: ImageRequest,
        dispatch: DispatchTarget,
    },
    Running(TaskHandle),
    Finished,
}

/// Lazy, single-subscriber stream of [`LoadEvent`]s.
pub struct LoadStream {
    state: StreamState,
    events: mpsc::UnboundedReceiver<LoadEvent>,
    sender: Option<mpsc::UnboundedSender<LoadEvent>>,
}

impl LoadStream {
    /// Cold stream for the given request; the load starts on first poll.
    #[must_use]
    pub fn cold(
        pipeline: Arc<dyn ImagePipeline>,
        request: ImageRequest,
        dispatch: DispatchTarget,
    ) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            state: StreamState::Idle {
                pipeline,
                request,
                dispatch,
            },
            events,
            sender: Some(sender),
        }
    }

    /// Handle of the running task, once the stream has started.
    #[must_use]
    pub const fn task(&self) -> Option<&TaskHandle> {
        match &self.state {
            StreamState::Running(handle) => Some(handle),
            StreamState::Idle { .. } | StreamState::Finished => None,
        }
    }

    /// Receive the next event; `None` after the terminal event.
    pub async fn next(&mut self) -> Option<LoadEvent> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    fn start(&mut self) {
        let state = std::mem::replace(&mut self.state, StreamState::Finished);
        match state {
            StreamState::Idle {
                pipeline,
                request,
                dispatch,
            } => {
                debug!(cache_key = %request.cache_key(), "starting image load stream");
                let sender = self
                    .sender
                    .take()
                    .unwrap_or_else(|| mpsc::unbounded_channel().0);
                let progress_tx = sender.clone();
                let on_progress: crate::task::ProgressHandler = Box::new(move |update| {
                    let _ = progress_tx.send(LoadEvent::Progress(update));
                });
                let on_completion: crate::task::CompletionHandler = Box::new(move |result| {
                    let event = match result {
                        Ok(response) => LoadEvent::Completed(response),
                        Err(error) => LoadEvent::Failed(error),
                    };
                    let _ = sender.send(event);
                });
                let handle = pipeline.submit(LoadSubmission {
                    request,
                    dispatch,
                    on_progress: Some(on_progress),
                    on_completion: Some(on_completion),
                });
                self.state = StreamState::Running(handle);
            }
            other => self.state = other,
        }
    }
}

impl Stream for LoadStream {
    type Item = LoadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if matches!(this.state, StreamState::Finished) {
            return Poll::Ready(None);
        }
        this.start();
        match this.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.state = StreamState::Finished;
                    this.events.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.state = StreamState::Finished;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for LoadStream {
    fn drop(&mut self) {
        if let StreamState::Running(handle) = &self.state {
            debug!(task = %handle.id(), "load stream dropped before completion; cancelling task");
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::LoadResult;
    use crate::model::{ImageFrame, IntoImageRequest};
    use crate::pipeline::DisplaySubmission;

    struct ScriptedPipeline {
        updates: Vec<ProgressUpdate>,
        outcome: LoadResult,
        submissions: AtomicUsize,
        last_handle: Mutex<Option<TaskHandle>>,
    }

    impl ScriptedPipeline {
        fn new(updates: Vec<ProgressUpdate>, outcome: LoadResult) -> Self {
            Self {
                updates,
                outcome,
                submissions: AtomicUsize::new(0),
                last_handle: Mutex::new(None),
            }
        }
    }

    impl ImagePipeline for ScriptedPipeline {
        fn submit(&self, submission: LoadSubmission) -> TaskHandle {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let handle = TaskHandle::new();
            *self.last_handle.lock().expect("handle mutex poisoned") = Some(handle.clone());

            let updates = self.updates.clone();
            let outcome = self.outcome.clone();
            let LoadSubmission {
                mut on_progress,
                on_completion,
                ..
            } = submission;
            tokio::spawn(async move {
                for update in updates {
                    if let Some(progress) = on_progress.as_mut() {
                        progress(update);
                    }
                    tokio::task::yield_now().await;
                }
                if let Some(done) = on_completion {
                    done(outcome);
                }
            });
            handle
        }

        fn submit_display(&self, submission: DisplaySubmission) -> Option<TaskHandle> {
            let _ = submission;
            None
        }
    }

    fn request() -> ImageRequest {
        "https://example.com/image.jpeg"
            .into_image_request()
            .expect("url should parse")
    }

    fn progress(completed_bytes: u64) -> ProgressUpdate {
        ProgressUpdate {
            completed_bytes,
            total_bytes: 100,
            preview: None,
        }
    }

    #[tokio::test]
    async fn stream_is_inert_until_first_poll() {
        let pipeline = Arc::new(ScriptedPipeline::new(
            Vec::new(),
            Ok(ImageResponse::fresh(ImageFrame::with_dimensions(1, 1))),
        ));
        let mut stream = LoadStream::cold(
            Arc::clone(&pipeline) as Arc<dyn ImagePipeline>,
            request(),
            DispatchTarget::default(),
        );
        assert_eq!(pipeline.submissions.load(Ordering::SeqCst), 0);
        assert!(stream.task().is_none());

        let event = stream.next().await.expect("terminal event expected");
        assert!(event.is_terminal());
        assert_eq!(pipeline.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn progress_precedes_exactly_one_terminal_event() {
        let pipeline = Arc::new(ScriptedPipeline::new(
            vec![progress(25), progress(100)],
            Ok(ImageResponse::fresh(ImageFrame::with_dimensions(4, 3))),
        ));
        let mut stream = LoadStream::cold(pipeline, request(), DispatchTarget::default());

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind(), "progress");
        assert_eq!(events[1].kind(), "progress");
        assert_eq!(events[2].kind(), "completed");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn failure_terminates_the_stream() {
        let pipeline = Arc::new(ScriptedPipeline::new(
            Vec::new(),
            Err(LoadError::Network {
                message: "connection reset".to_owned(),
            }),
        ));
        let mut stream = LoadStream::cold(pipeline, request(), DispatchTarget::default());

        let event = stream.next().await.expect("terminal event expected");
        assert_eq!(event.kind(), "failed");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_an_unfinished_stream_cancels_the_task() {
        let pipeline = Arc::new(ScriptedPipeline::new(
            vec![progress(10), progress(20), progress(30)],
            Ok(ImageResponse::fresh(ImageFrame::with_dimensions(1, 1))),
        ));
        let mut stream = LoadStream::cold(
            Arc::clone(&pipeline) as Arc<dyn ImagePipeline>,
            request(),
            DispatchTarget::default(),
        );

        let event = stream.next().await.expect("first progress expected");
        assert_eq!(event.kind(), "progress");
        drop(stream);

        let handle = pipeline
            .last_handle
            .lock()
            .expect("handle mutex poisoned")
            .clone()
            .expect("submission recorded");
        assert!(handle.is_cancelled());
    }
}
