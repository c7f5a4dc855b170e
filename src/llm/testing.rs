//! Recording transport used by provider tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::client::{HttpResponse, ProviderError, Transport};

/// Replays queued responses and records every request it sees
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<std::result::Result<HttpResponse, ProviderError>>>,
    pub posts: Mutex<Vec<(String, Value)>>,
    pub headers: Mutex<Vec<Vec<(String, String)>>>,
    pub gets: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn fail(self, err: ProviderError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn post(&self, index: usize) -> (String, Value) {
        self.posts.lock().unwrap()[index].clone()
    }

    /// Headers sent with the post at `index`
    pub fn post_headers(&self, index: usize) -> Vec<(String, String)> {
        self.headers.lock().unwrap()[index].clone()
    }

    fn next(&self) -> std::result::Result<HttpResponse, ProviderError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::transport("no scripted response")))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> std::result::Result<HttpResponse, ProviderError> {
        self.posts.lock().unwrap().push((url.to_string(), body.clone()));
        self.headers
            .lock()
            .unwrap()
            .push(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        self.next()
    }

    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, ProviderError> {
        self.gets.lock().unwrap().push(url.to_string());
        self.next()
    }
}
