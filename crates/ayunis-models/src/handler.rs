use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ModelError;
use crate::types::{InferenceInput, InferenceResponse, ModelProvider, StreamInferenceChunk};

pub type InferenceStream =
    Pin<Box<dyn Stream<Item = Result<StreamInferenceChunk, ModelError>> + Send>>;

/// Answers a complete inference request against one vendor.
#[async_trait]
pub trait InferenceHandler: Send + Sync {
    fn provider(&self) -> ModelProvider;

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError>;
}

/// Streams an inference request against one vendor. The returned stream is
/// lazy: nothing is read from the vendor until it is polled, and dropping it
/// releases the connection.
#[async_trait]
pub trait StreamInferenceHandler: Send + Sync {
    fn provider(&self) -> ModelProvider;

    async fn stream(&self, input: InferenceInput) -> Result<InferenceStream, ModelError>;
}
