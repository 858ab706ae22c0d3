//! Amazon Bedrock text generation through the Converse API.
//!
//! Every call builds a client from the caller's instance credentials, sends
//! the system prompt plus one user message, and returns the first text block
//! of the reply. Latency, token usage and the stop reason are logged.

use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput as ConverseReply, InferenceConfiguration,
    Message, SystemContentBlock,
};
use tracing::{debug, info};

use super::base::{LlmError, ModelSpec, TextGenerator};
use crate::auth::InstanceCredentials;

#[derive(Debug, Clone, Default)]
pub struct BedrockGenerator {
    /// Overrides the regional Bedrock runtime endpoint
    endpoint_url: Option<String>,
}

impl BedrockGenerator {
    pub fn new(endpoint_url: Option<String>) -> Self {
        Self { endpoint_url }
    }

    fn inference_config(model: &ModelSpec) -> InferenceConfiguration {
        InferenceConfiguration::builder()
            .temperature(model.temperature)
            .top_p(model.top_p)
            .max_tokens(model.max_tokens)
            .build()
    }

    fn user_message(input: &str) -> Result<Message, LlmError> {
        Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(input.to_string()))
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))
    }

    /// First text block of the assistant message.
    fn reply_text(reply: Option<&ConverseReply>) -> Result<String, LlmError> {
        reply
            .and_then(|r| r.as_message().ok())
            .and_then(|message| message.content().iter().find_map(|b| b.as_text().ok()))
            .cloned()
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl TextGenerator for BedrockGenerator {
    async fn generate(
        &self,
        credentials: &InstanceCredentials,
        model: &ModelSpec,
        system_prompt: &str,
        input: &str,
    ) -> Result<String, LlmError> {
        let sdk_config = credentials.sdk_config(self.endpoint_url.as_deref()).await;
        let client = BedrockClient::new(&sdk_config);

        info!(model_id = %model.id, "Generating message");
        let started = Instant::now();

        let output = client
            .converse()
            .model_id(&model.id)
            .system(SystemContentBlock::Text(system_prompt.to_string()))
            .messages(Self::user_message(input)?)
            .inference_config(Self::inference_config(model))
            .send()
            .await
            .map_err(|e| LlmError::Provider(DisplayErrorContext(&e).to_string()))?;

        let elapsed = started.elapsed();
        match output.usage() {
            Some(usage) => info!(
                model_id = %model.id,
                execution_ms = elapsed.as_millis() as u64,
                input_tokens = usage.input_tokens(),
                output_tokens = usage.output_tokens(),
                total_tokens = usage.total_tokens(),
                stop_reason = output.stop_reason().as_str(),
                "Bedrock call completed"
            ),
            None => info!(
                model_id = %model.id,
                execution_ms = elapsed.as_millis() as u64,
                stop_reason = output.stop_reason().as_str(),
                "Bedrock call completed"
            ),
        }

        let text = Self::reply_text(output.output())?;
        debug!(model_id = %model.id, chars = text.len(), "Bedrock reply");
        Ok(text)
    }

    fn provider_info(&self) -> &'static str {
        "Amazon Bedrock"
    }
}
