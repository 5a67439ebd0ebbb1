use std::fmt::Debug;

const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    headers: Vec<(String, String)>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            headers: vec![],
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature, `0.0` if not set.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum number of tokens to generate per request.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Adds an extra header sent with every request.
    ///
    /// OpenRouter, for example, identifies the calling app by the
    /// `HTTP-Referer` and `X-Title` headers.
    #[inline]
    pub fn with_header<K: Into<String>, V: Into<String>>(
        mut self,
        name: K,
        value: V,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature.unwrap_or(0.0),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            headers: self.headers,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) headers: Vec<(String, String)>,
}

impl OpenAIConfig {
    /// Returns the model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("headers", &self.headers)
            .finish()
    }
}
