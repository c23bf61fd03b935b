//! Deterministic stand-ins for the remote embedding and chat APIs.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{ChatModel, LlmResponse, Message};
use std::sync::Mutex;

const DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercased word is hashed into a bucket.
#[derive(Debug, Clone, Default)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[fnv1a(&word.to_lowercase()) % DIMENSION] += 1.0;
        }
        vector
    }
}

fn fnv1a(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as usize
}

impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }
}

type Responder = Box<dyn Fn(&[Message]) -> Result<String> + Send + Sync>;

/// Chat model that answers through a closure and records every request.
pub struct ScriptedChat {
    responder: Responder,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedChat {
    pub fn new(responder: impl Fn(&[Message]) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with the same text.
    pub fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Every request made so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let reply = (self.responder)(&messages);
        self.requests.lock().unwrap().push(messages);
        reply.map(LlmResponse::text)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
