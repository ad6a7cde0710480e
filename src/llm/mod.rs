pub mod chat;
pub mod embedding;
use rllm::builder::LLMBackend;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

pub const LM_STUDIO_BASE_URL: &str = "http://localhost:1234/v1/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Ollama,
    OpenAI,
    #[serde(rename = "lm-studio")]
    LmStudio,
    Anthropic,
    Gemini,
    DeepSeek,
    XAI,
    Groq,
}

impl LlmType {
    pub fn backend(&self) -> LLMBackend {
        match self {
            LlmType::Ollama => LLMBackend::Ollama,
            LlmType::OpenAI | LlmType::LmStudio => LLMBackend::OpenAI,
            LlmType::Anthropic => LLMBackend::Anthropic,
            LlmType::Gemini => LLMBackend::Google,
            LlmType::DeepSeek => LLMBackend::DeepSeek,
            LlmType::XAI => LLMBackend::XAI,
            LlmType::Groq => LLMBackend::Groq,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            LlmType::LmStudio => Some(LM_STUDIO_BASE_URL),
            _ => None,
        }
    }

    pub fn default_chat_model(&self) -> &'static str {
        match self {
            LlmType::Ollama => "qwen3:4b",
            LlmType::OpenAI => "gpt-4o-mini",
            LlmType::LmStudio => "local-model",
            LlmType::Anthropic => "claude-3-5-haiku-latest",
            LlmType::Gemini => "gemini-1.5-flash-latest",
            LlmType::DeepSeek => "deepseek-chat",
            LlmType::XAI => "grok-2-latest",
            LlmType::Groq => "llama-3.1-8b-instant",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            LlmType::Ollama => "nomic-embed-text",
            LlmType::OpenAI => "text-embedding-3-small",
            LlmType::LmStudio => "text-embedding-nomic-embed-text-v1.5",
            LlmType::Gemini => "text-embedding-004",
            _ => "all-MiniLM-L6-v2",
        }
    }

    /// Local backends accept requests without a key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmType::Ollama | LlmType::LmStudio)
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::Ollama => "ollama",
            LlmType::OpenAI => "openai",
            LlmType::LmStudio => "lm-studio",
            LlmType::Anthropic => "anthropic",
            LlmType::Gemini => "gemini",
            LlmType::DeepSeek => "deepseek",
            LlmType::XAI => "xai",
            LlmType::Groq => "groq",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            "lm-studio" | "lmstudio" => Ok(LlmType::LmStudio),
            "anthropic" => Ok(LlmType::Anthropic),
            "gemini" | "google" => Ok(LlmType::Gemini),
            "deepseek" => Ok(LlmType::DeepSeek),
            "xai" => Ok(LlmType::XAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub embedding_model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Ollama,
            api_key: None,
            completion_model: None,
            embedding_model: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl LlmConfig {
    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.llm_type.default_base_url().map(str::to_string))
    }

    pub fn resolved_api_key(&self) -> Result<String, String> {
        match self.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Ok(key.to_string()),
            None if self.llm_type.requires_api_key() =>
                Err(format!("An API key is required for the '{}' provider", self.llm_type)),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("ollama".parse::<LlmType>().unwrap(), LlmType::Ollama);
        assert_eq!("LM-Studio".parse::<LlmType>().unwrap(), LlmType::LmStudio);
        assert_eq!("google".parse::<LlmType>().unwrap(), LlmType::Gemini);
        assert!("huggingface".parse::<LlmType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for t in [LlmType::LmStudio, LlmType::XAI, LlmType::OpenAI] {
            assert_eq!(t.to_string().parse::<LlmType>().unwrap(), t);
        }
    }

    #[test]
    fn lm_studio_defaults_to_local_openai_endpoint() {
        let config = LlmConfig { llm_type: LlmType::LmStudio, ..Default::default() };
        assert_eq!(config.resolved_base_url().as_deref(), Some(LM_STUDIO_BASE_URL));
        assert_eq!(config.resolved_api_key().unwrap(), "");

        let custom = LlmConfig {
            llm_type: LlmType::LmStudio,
            base_url: Some("http://gpu-box:1234/v1/".into()),
            ..Default::default()
        };
        assert_eq!(custom.resolved_base_url().as_deref(), Some("http://gpu-box:1234/v1/"));
    }

    #[test]
    fn hosted_providers_need_a_key() {
        let config = LlmConfig { llm_type: LlmType::OpenAI, ..Default::default() };
        assert!(config.resolved_api_key().is_err());
        let keyed = LlmConfig { api_key: Some("sk-test".into()), ..config };
        assert_eq!(keyed.resolved_api_key().unwrap(), "sk-test");
    }
}
