use super::{Backend, Responder};
use crate::types::{Message, ProcessingEvent};
use crate::error::ErrorContext;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, warn};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Idle/processing flag plus the notification channel.
struct Lifecycle {
    processing: AtomicBool,
    events: broadcast::Sender<ProcessingEvent>,
}

impl Lifecycle {
    fn emit(&self, event: ProcessingEvent) {
        let _ = self.events.send(event);
    }

    /// Claim the instance. Fails with `Busy` if a reply is already in flight.
    fn begin(self: &Arc<Self>, input: &Message) -> Result<InFlight> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("responder busy, rejecting message");
            return Err(Error::Busy);
        }
        Ok(InFlight {
            lifecycle: Arc::clone(self),
            input: Some(input.clone()),
        })
    }
}

/// Holds the processing claim. Dropping it releases the claim; if the work never
/// completed (error, panic, cancelled future) `Failed` is emitted.
struct InFlight {
    lifecycle: Arc<Lifecycle>,
    input: Option<Message>,
}

impl InFlight {
    fn finish(mut self, reply: &Message) {
        self.input = None;
        let lifecycle = Arc::clone(&self.lifecycle);
        drop(self);
        lifecycle.emit(ProcessingEvent::Finished(reply.clone()));
    }

    fn fail(mut self, error: &Error) {
        let input = self.input.take();
        let lifecycle = Arc::clone(&self.lifecycle);
        drop(self);
        if let Some(input) = input {
            lifecycle.emit(ProcessingEvent::Failed {
                input,
                error: error.to_string(),
            });
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.lifecycle.processing.store(false, Ordering::Release);
        if let Some(input) = self.input.take() {
            self.lifecycle.emit(ProcessingEvent::Failed {
                input,
                error: "processing aborted".to_string(),
            });
        }
    }
}

/// Single-flight [`Responder`] over a [`Backend`].
///
/// Clones share the backend, the processing flag and the notification channel.
pub struct Chatbot<B> {
    lifecycle: Arc<Lifecycle>,
    backend: Arc<Mutex<B>>,
}

impl<B> Clone for Chatbot<B> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend> Chatbot<B> {
    pub fn new(backend: B) -> Self {
        Self::with_event_capacity(backend, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(backend: B, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            lifecycle: Arc::new(Lifecycle {
                processing: AtomicBool::new(false),
                events,
            }),
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    async fn run(backend: &Mutex<B>, claim: InFlight, input: Message) -> Result<Message> {
        claim
            .lifecycle
            .emit(ProcessingEvent::Started(input.clone()));

        let started = Instant::now();
        let result = backend.lock().await.exchange(&input).await;
        match result {
            Ok(text) => {
                let reply = Message::new(text, started.elapsed().as_millis() as u64);
                claim.finish(&reply);
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "backend exchange failed");
                claim.fail(&e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<B: Backend> Responder for Chatbot<B> {
    async fn process(&self, input: Message) -> Result<Message> {
        let claim = self.lifecycle.begin(&input)?;
        Self::run(&self.backend, claim, input).await
    }

    fn process_async(&self, input: Message) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                format!("process_async needs a tokio runtime: {}", e),
                ErrorContext::new().with_source("chatbot"),
            )
        })?;
        let claim = self.lifecycle.begin(&input)?;
        let backend = Arc::clone(&self.backend);
        runtime.spawn(async move {
            let work = Self::run(&backend, claim, input);
            // The claim is released by its drop guard while unwinding.
            if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                error!("backend panicked while producing a reply");
            }
        });
        Ok(())
    }

    fn is_processing(&self) -> bool {
        self.lifecycle.processing.load(Ordering::Acquire)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProcessingEvent> {
        self.lifecycle.events.subscribe()
    }
}
