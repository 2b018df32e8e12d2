use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::chat_client::{ChatMessage, GenerationOutput};

pub const MOCK_EMBEDDING_DIMENSION: usize = 256;

/// Offline generation provider with canned replies.
///
/// Clones share the call log, so a test can keep one handle and inject the other.
#[derive(Clone)]
pub struct MockLLMClient {
    responses: Vec<String>,
    response_index: Arc<AtomicUsize>,
    fixed_output: Option<GenerationOutput>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockLLMClient {
    /// Create a new mock LLM client with default responses
    pub fn new() -> Self {
        Self {
            responses: vec![
                "Hello! I'm a mock LLM for testing purposes.".to_string(),
                "This is a simulated response from the mock LLM.".to_string(),
                "Mock response: Your request has been processed successfully.".to_string(),
            ],
            response_index: Arc::new(AtomicUsize::new(0)),
            fixed_output: None,
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock client with custom responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        let mut client = Self::new();
        client.responses = responses;
        client
    }

    /// Always reply with this exact provider output
    pub fn with_output(mut self, output: GenerationOutput) -> Self {
        self.fixed_output = Some(output);
        self
    }

    /// Make every call fail with the given message
    pub fn failing(message: &str) -> Self {
        let mut client = Self::new();
        client.failure = Some(message.to_string());
        client
    }

    /// Conversations received so far, oldest first
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Get the next response (cycles through available responses)
    fn next_response(&self) -> String {
        if self.responses.is_empty() {
            return "Mock LLM: No responses configured".to_string();
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        format!("Mock LLM: {}", self.responses[index % self.responses.len()])
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        if let Some(message) = &self.failure {
            return Err(anyhow!("{}", message));
        }

        if let Some(output) = &self.fixed_output {
            return Ok(output.clone());
        }

        Ok(GenerationOutput::Text(self.next_response()))
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::chat_client::ChatClient for MockLLMClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationOutput> {
        self.generate(messages).await
    }

    fn client_name(&self) -> &str {
        "MockLLM"
    }
}

/// Deterministic hashed bag-of-words embedder.
///
/// Texts sharing words land close together, which is enough for the demo
/// catalog to rank sensibly without a hosted model.
#[derive(Clone)]
pub struct MockEmbedder {
    dimension: usize,
    fail_after: Option<usize>,
    drop_last: bool,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(MOCK_EMBEDDING_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            fail_after: None,
            drop_last: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Succeed for the first `calls` requests, then fail every one after
    pub fn fail_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    /// Fail every request
    pub fn failing() -> Self {
        Self::new().fail_after(0)
    }

    /// Return one vector fewer than requested from batch calls
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn record_call(&self) -> Result<()> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_after {
            Some(limit) if previous >= limit => Err(anyhow!("Mock embedding provider unavailable")),
            _ => Ok(()),
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::embedding::Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.record_call()?;
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vectorize(t)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.record_call()?;
        Ok(self.vectorize(text))
    }

    fn embedder_name(&self) -> &str {
        "MockEmbedder"
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let word = word.to_lowercase();
            // Crude plural folding so "headphones" meets "headphone"
            if word.len() > 3 && word.ends_with('s') {
                word[..word.len() - 1].to_string()
            } else {
                word
            }
        })
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
