use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use serde::Deserialize;

use crate::{error::AppError, utils::config::AppConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAI,
    Hashed,
}

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
    #[cfg(any(test, feature = "test-utils"))]
    FailingAfter {
        dimension: usize,
        remaining: Arc<std::sync::atomic::AtomicUsize>,
    },
}

impl EmbeddingProvider {
    pub fn from_config(
        config: &AppConfig,
        client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match config.embedding_backend {
            EmbeddingBackend::OpenAI => {
                let client = client.ok_or_else(|| {
                    AppError::Config("OpenAI embedding backend requires an API client".into())
                })?;
                Ok(Self::new_openai(
                    client,
                    config.embedding_model.clone(),
                    config.embedding_dimensions,
                ))
            }
            EmbeddingBackend::Hashed => Ok(Self::new_hashed(config.embedding_dimensions as usize)),
        }
    }

    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::FailingAfter { .. } => "failing",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::FailingAfter { dimension, .. } => *dimension,
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::OpenAI { model, .. } => Some(model.clone()),
            EmbeddingInner::Hashed { .. } => None,
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::FailingAfter { .. } => None,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embedding = response
                    .data
                    .first()
                    .ok_or_else(|| AppError::LLMParsing("No embedding data received".into()))?
                    .embedding
                    .clone();

                check_dimension(&embedding, *dimensions as usize)?;

                Ok(embedding)
            }
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::FailingAfter {
                dimension,
                remaining,
            } => {
                use std::sync::atomic::Ordering;
                let granted = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
                match granted {
                    Ok(_) => Ok(hashed_embedding(text, *dimension)),
                    Err(_) => Err(AppError::LLMParsing(
                        "Embedding backend exhausted its scripted successes".into(),
                    )),
                }
            }
        }
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .into_iter()
                .map(|text| hashed_embedding(&text, *dimension))
                .collect()),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                if texts.is_empty() {
                    return Ok(Vec::new());
                }

                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(texts)
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embeddings: Vec<Vec<f32>> = response
                    .data
                    .into_iter()
                    .map(|item| item.embedding)
                    .collect();

                for embedding in &embeddings {
                    check_dimension(embedding, *dimensions as usize)?;
                }

                Ok(embeddings)
            }
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::FailingAfter { .. } => {
                let mut embeddings = Vec::with_capacity(texts.len());
                for text in texts {
                    embeddings.push(self.embed(&text).await?);
                }
                Ok(embeddings)
            }
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl EmbeddingProvider {
    /// Deterministic provider that succeeds `successes` times and then errors.
    /// Used to exercise the degraded reply-embedding path.
    pub fn new_failing_after(dimension: usize, successes: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::FailingAfter {
                dimension: dimension.max(1),
                remaining: Arc::new(std::sync::atomic::AtomicUsize::new(successes)),
            },
        }
    }
}

// Every stored vector must share one dimensionality, a mismatched upstream
// response is rejected rather than written.
fn check_dimension(embedding: &[f32], expected: usize) -> Result<(), AppError> {
    if embedding.len() == expected {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Embedding dimension mismatch: expected {expected}, got {}",
            embedding.len()
        )))
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
