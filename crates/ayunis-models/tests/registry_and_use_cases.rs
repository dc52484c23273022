use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ayunis_models::{
    builtin_models, retry_with_deadline, AssistantContent, GetAvailableModelsUseCase,
    GetDefaultModelQuery, GetDefaultModelUseCase, GetInferenceCommand, GetInferenceUseCase,
    GetPermittedModelQuery, GetPermittedModelUseCase, GetPermittedModelsUseCase,
    InMemoryPermittedModelsRepository, InMemoryUserDefaultModelsRepository, InferenceHandler,
    InferenceHandlerRegistry, InferenceInput, InferenceMeta, InferenceResponse, InferenceStream,
    IsModelPermittedUseCase, Message, Model, ModelError, ModelErrorCode, ModelProvider,
    ModelRegistry, PermittedModel, RetryPolicy, StreamInferenceChunk, StreamInferenceCommand,
    StreamInferenceHandler, StreamInferenceHandlerRegistry, StreamInferenceUseCase,
};
use futures_util::stream::{self, StreamExt};

struct RecordingHandler {
    provider: ModelProvider,
    reply: &'static str,
    inputs: Mutex<Vec<InferenceInput>>,
}

impl RecordingHandler {
    fn new(provider: ModelProvider, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reply,
            inputs: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InferenceHandler for RecordingHandler {
    fn provider(&self) -> ModelProvider {
        self.provider
    }

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError> {
        self.inputs.lock().expect("inputs lock").push(input);
        Ok(InferenceResponse {
            content: vec![AssistantContent::text(self.reply)],
            meta: InferenceMeta {
                input_tokens: Some(8),
                output_tokens: Some(1),
                total_tokens: Some(9),
            },
        })
    }
}

#[async_trait]
impl StreamInferenceHandler for RecordingHandler {
    fn provider(&self) -> ModelProvider {
        self.provider
    }

    async fn stream(&self, input: InferenceInput) -> Result<InferenceStream, ModelError> {
        self.inputs.lock().expect("inputs lock").push(input);
        let chunks = vec![
            Ok(StreamInferenceChunk::TextDelta {
                delta: self.reply.to_string(),
            }),
            Ok(StreamInferenceChunk::Finished {
                finish_reason: Some("stop".to_string()),
                meta: InferenceMeta::default(),
            }),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Never answers; every attempt runs until the deadline cancels it.
struct HangingHandler {
    attempts: AtomicUsize,
    retry: RetryPolicy,
    timeout: Duration,
}

#[async_trait]
impl InferenceHandler for HangingHandler {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Mistral
    }

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError> {
        let deadline = input.timeout.unwrap_or(self.timeout);
        retry_with_deadline(&self.retry, deadline, || async {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<InferenceResponse, ModelError>>().await
        })
        .await
    }
}

fn catalog() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::builtin())
}

fn permitted(
    id: &str,
    org_id: &str,
    name: &str,
    provider: ModelProvider,
    is_default: bool,
) -> PermittedModel {
    PermittedModel {
        id: id.to_string(),
        org_id: org_id.to_string(),
        model: Model::new(name, provider),
        is_default,
    }
}

#[tokio::test]
async fn get_inference_answers_simple_question() {
    let handler = RecordingHandler::new(ModelProvider::OpenAi, "4");
    let registry = InferenceHandlerRegistry::new().with(ModelProvider::OpenAi, handler.clone());
    let use_case = GetInferenceUseCase::new(catalog(), Arc::new(registry));

    let response = use_case
        .execute(GetInferenceCommand::new(
            Model::new("gpt-4o", ModelProvider::OpenAi),
            vec![Message::user("What is 2+2?")],
        ))
        .await
        .expect("inference should succeed");

    assert_eq!(response.content, vec![AssistantContent::text("4")]);
    assert_eq!(response.meta.total_tokens, Some(9));

    let inputs = handler.inputs.lock().expect("inputs lock");
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].model, Model::new("gpt-4o", ModelProvider::OpenAi));
    assert_eq!(inputs[0].messages, vec![Message::user("What is 2+2?")]);
}

#[tokio::test]
async fn get_inference_rejects_unregistered_provider() {
    let registry = InferenceHandlerRegistry::new().with(
        ModelProvider::Mistral,
        RecordingHandler::new(ModelProvider::Mistral, "ok"),
    );
    let use_case = GetInferenceUseCase::new(catalog(), Arc::new(registry));

    let error = use_case
        .execute(GetInferenceCommand::new(
            Model::new("claude-3-7-sonnet-latest", ModelProvider::Anthropic),
            vec![Message::user("hi")],
        ))
        .await
        .expect_err("anthropic is not registered");

    assert_eq!(error.code, ModelErrorCode::ModelProviderNotSupported);
    assert_eq!(error.status_code(), 400);
}

#[tokio::test]
async fn get_inference_rejects_unknown_model() {
    let registry = InferenceHandlerRegistry::new().with(
        ModelProvider::OpenAi,
        RecordingHandler::new(ModelProvider::OpenAi, "ok"),
    );
    let use_case = GetInferenceUseCase::new(catalog(), Arc::new(registry));

    let error = use_case
        .execute(GetInferenceCommand::new(
            Model::new("gpt-2", ModelProvider::OpenAi),
            vec![Message::user("hi")],
        ))
        .await
        .expect_err("gpt-2 is not in the catalog");

    assert_eq!(error.code, ModelErrorCode::ModelNotFound);
    assert_eq!(error.message, "Model 'gpt-2' not found for provider 'openai'");
}

#[tokio::test(start_paused = true)]
async fn inference_times_out_after_deadline_without_retry() {
    let handler = Arc::new(HangingHandler {
        attempts: AtomicUsize::new(0),
        retry: RetryPolicy::default(),
        timeout: Duration::from_secs(60),
    });
    let registry = InferenceHandlerRegistry::new().with(ModelProvider::Mistral, handler.clone());
    let use_case = GetInferenceUseCase::new(catalog(), Arc::new(registry));

    let error = use_case
        .execute(
            GetInferenceCommand::new(
                Model::new("mistral-large-latest", ModelProvider::Mistral),
                vec![Message::user("hello")],
            )
            .with_timeout(Duration::from_millis(5_000)),
        )
        .await
        .expect_err("deadline should elapse");

    assert_eq!(error.code, ModelErrorCode::InferenceTimeout);
    assert_eq!(error.message, "Inference timed out after 5000ms");
    assert_eq!(error.status_code(), 408);
    assert_eq!(handler.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stream_inference_yields_chunks_in_order() {
    let handler = RecordingHandler::new(ModelProvider::Anthropic, "Hello");
    let registry =
        StreamInferenceHandlerRegistry::new().with(ModelProvider::Anthropic, handler.clone());
    let use_case = StreamInferenceUseCase::new(catalog(), Arc::new(registry));

    let stream = use_case
        .execute(StreamInferenceCommand::new(
            Model::new("claude-3-7-sonnet-latest", ModelProvider::Anthropic),
            vec![Message::user("greet me")],
        ))
        .await
        .expect("stream should open");
    let chunks = stream.collect::<Vec<_>>().await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(
        chunks[0].as_ref().ok(),
        Some(&StreamInferenceChunk::TextDelta {
            delta: "Hello".to_string()
        })
    );
    assert!(matches!(chunks[1], Ok(StreamInferenceChunk::Finished { .. })));
}

#[tokio::test]
async fn stream_inference_rejects_models_that_cannot_stream() {
    let handler = RecordingHandler::new(ModelProvider::Mistral, "never");
    let registry =
        StreamInferenceHandlerRegistry::new().with(ModelProvider::Mistral, handler.clone());
    let use_case = StreamInferenceUseCase::new(catalog(), Arc::new(registry));

    let error = match use_case
        .execute(StreamInferenceCommand::new(
            Model::new("mistral-large-latest", ModelProvider::Mistral),
            vec![Message::user("hi")],
        ))
        .await
    {
        Ok(_) => panic!("mistral models cannot stream"),
        Err(error) => error,
    };

    assert_eq!(error.code, ModelErrorCode::ModelInvalid);
    assert!(handler.inputs.lock().expect("inputs lock").is_empty());
}

#[test]
fn available_models_lists_catalog() {
    let use_case = GetAvailableModelsUseCase::new(catalog());
    assert_eq!(use_case.execute().len(), builtin_models().len());
}

#[tokio::test]
async fn permitted_model_queries() {
    let repository = Arc::new(InMemoryPermittedModelsRepository::new(vec![
        permitted("pm-1", "org-1", "gpt-4o", ModelProvider::OpenAi, false),
        permitted("pm-2", "org-1", "mistral-large-latest", ModelProvider::Mistral, true),
        permitted("pm-3", "org-2", "gpt-4o", ModelProvider::OpenAi, true),
    ]));

    let all = GetPermittedModelsUseCase::new(repository.clone())
        .execute("org-1")
        .await
        .expect("list");
    assert_eq!(all.len(), 2);

    let get = GetPermittedModelUseCase::new(repository.clone());
    let by_name = get
        .execute(&GetPermittedModelQuery::ByName {
            org_id: "org-2".to_string(),
            name: "gpt-4o".to_string(),
            provider: ModelProvider::OpenAi,
        })
        .await
        .expect("by name");
    assert_eq!(by_name.id, "pm-3");

    let missing = get
        .execute(&GetPermittedModelQuery::ByName {
            org_id: "org-2".to_string(),
            name: "mistral-large-latest".to_string(),
            provider: ModelProvider::Mistral,
        })
        .await
        .expect_err("not permitted for org-2");
    assert_eq!(missing.code, ModelErrorCode::ModelNotFound);
    assert_eq!(
        missing.message,
        "Permitted model 'mistral-large-latest' with provider 'mistral' not found"
    );

    let missing_id = get
        .execute(&GetPermittedModelQuery::ById("pm-9".to_string()))
        .await
        .expect_err("unknown id");
    assert_eq!(missing_id.message, "Permitted model 'pm-9' not found");

    let is_permitted = IsModelPermittedUseCase::new(repository);
    assert!(is_permitted
        .execute("org-1", "gpt-4o", ModelProvider::OpenAi)
        .await
        .expect("lookup"));
    assert!(!is_permitted
        .execute("org-1", "gpt-4o", ModelProvider::Anthropic)
        .await
        .expect("lookup"));
}

#[tokio::test]
async fn default_model_prefers_user_then_org_then_first_permitted() {
    let permitted_models = Arc::new(InMemoryPermittedModelsRepository::new(vec![
        permitted("pm-1", "org-1", "gpt-4o", ModelProvider::OpenAi, false),
        permitted("pm-2", "org-1", "mistral-large-latest", ModelProvider::Mistral, true),
    ]));
    let user_defaults = Arc::new(InMemoryUserDefaultModelsRepository::default());
    let use_case = GetDefaultModelUseCase::new(permitted_models.clone(), user_defaults.clone());

    user_defaults.set_default(
        "user-1",
        permitted("pm-1", "org-1", "gpt-4o", ModelProvider::OpenAi, false),
    );
    let resolved = use_case
        .execute(&GetDefaultModelQuery::for_user("org-1", "user-1"))
        .await
        .expect("user default");
    assert_eq!(resolved.id, "pm-1");

    permitted_models.remove("pm-1");
    let resolved = use_case
        .execute(&GetDefaultModelQuery::for_user("org-1", "user-1"))
        .await
        .expect("org default");
    assert_eq!(resolved.id, "pm-2");

    permitted_models.insert(permitted(
        "pm-2",
        "org-1",
        "mistral-large-latest",
        ModelProvider::Mistral,
        false,
    ));
    let resolved = use_case
        .execute(&GetDefaultModelQuery::for_org("org-1"))
        .await
        .expect("first permitted");
    assert_eq!(resolved.id, "pm-2");

    let error = use_case
        .execute(&GetDefaultModelQuery::for_org("org-empty"))
        .await
        .expect_err("no models");
    assert_eq!(error.code, ModelErrorCode::DefaultModelNotFound);
    assert_eq!(error.message, "Default model not found for org 'org-empty'");
}
