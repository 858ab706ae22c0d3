mod base;
pub mod bedrock;

pub use base::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P, LlmError, ModelSpec, TextGenerator,
    default_models,
};
pub use bedrock::BedrockGenerator;
