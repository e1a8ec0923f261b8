use std::fmt;

use serde::Deserialize;

/// Supported LLM vendors. Everything except Anthropic speaks the
/// OpenAI chat-completions wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
    Zhipu,
    DeepSeek,
    Xai,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Xai => "https://api.x.ai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-haiku-20240307",
            Provider::Zhipu => "glm-4-flash",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Xai => "grok-4-latest",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Zhipu => "zhipu",
            Provider::DeepSeek => "deepseek",
            Provider::Xai => "xai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercase_names() {
        let p: Provider = serde_json::from_str("\"deepseek\"").unwrap();
        assert_eq!(p, Provider::DeepSeek);
        assert_eq!(p.default_model(), "deepseek-chat");
        assert!(serde_json::from_str::<Provider>("\"mistral\"").is_err());
    }
}
