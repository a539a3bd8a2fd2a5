//! In-memory generators (testing only)
//!
//! `ScriptedGenerator` replays queued responses and records every request;
//! `FailingGenerator` fails every call. Neither touches the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::llm::{GenerationError, GenerationRequest, TextGenerator};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Replays responses in order. Once the queue is empty, the `repeat`
/// response (if any) is returned forever; otherwise calls fail.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Result<String, GenerationError>>>,
    repeat: Option<Result<String, GenerationError>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `response`.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            repeat: Some(Ok(response.into())),
            ..Self::default()
        }
    }

    /// Answer from `responses` in order, then `response` forever.
    pub fn then_repeat(mut self, response: impl Into<String>) -> Self {
        self.repeat = Some(Ok(response.into()));
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        lock(&self.requests).push(request.clone());
        if let Some(next) = lock(&self.queue).pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .unwrap_or_else(|| Err(GenerationError::Other("script exhausted".to_string())))
    }
}

/// Fails every call with the same error.
#[derive(Debug)]
pub struct FailingGenerator {
    error: GenerationError,
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn new(error: GenerationError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(self.error.clone())
    }
}
