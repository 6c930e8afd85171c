//! Machine translation.
//!
//! [`Translator`] is the seam the release tools translate through;
//! [`DeeplClient`] implements it against the DeepL REST API.

use kforge_common::constants::{DEEPL_API_URL, DEEPL_KEY_ENV};
use kforge_common::error::{KforgeError, Result};
use serde::{Deserialize, Serialize};

/// Source language of every text the release tools translate.
pub const SOURCE_LANGUAGE: &str = "EN";

/// How the translator should treat markup in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Plain text.
    Plain,
    /// HTML; tags are preserved and only text content is translated.
    Html,
}

/// Character usage of the current billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    /// Characters translated so far.
    pub character_count: u64,
    /// Characters allowed in the period.
    pub character_limit: u64,
}

/// A machine translation service.
pub trait Translator {
    /// Translates `texts` from English into `target_lang` (an upper-case
    /// service code such as `FR`). The result has one entry per input, in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Network` if the service call fails.
    fn translate(&self, texts: &[String], target_lang: &str, format: TextFormat) -> Result<Vec<String>>;

    /// Character usage of the current period.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Network` if the service call fails.
    fn usage(&self) -> Result<Usage>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_handling: Option<&'static str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

/// Blocking DeepL client.
#[derive(Debug, Clone)]
pub struct DeeplClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    auth_key: String,
}

impl DeeplClient {
    /// Creates a client for `endpoint` (e.g. `https://api-free.deepl.com`).
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Network` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, auth_key: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("kforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KforgeError::Network {
                url: endpoint.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint,
            auth_key: auth_key.into(),
        })
    }

    /// Creates a client for `endpoint` (the public free endpoint when
    /// `None`) with the key from `$DEEPL_AUTH_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Configuration` if the key is not set.
    pub fn from_env(endpoint: Option<&str>) -> Result<Self> {
        let key = std::env::var(DEEPL_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| KforgeError::configuration(format!("the translation API key is not set in ${DEEPL_KEY_ENV}")))?;
        Self::new(endpoint.unwrap_or(DEEPL_API_URL), key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    fn network(url: &str, message: impl Into<String>) -> KforgeError {
        KforgeError::Network {
            url: url.to_string(),
            message: message.into(),
        }
    }

    fn send<T: for<'de> Deserialize<'de>>(&self, url: &str, request: reqwest::blocking::RequestBuilder) -> Result<T> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, format!("DeepL-Auth-Key {}", self.auth_key))
            .send()
            .map_err(|e| Self::network(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Self::network(url, format!("HTTP {status}: {}", body.trim())));
        }
        response
            .json()
            .map_err(|e| Self::network(url, format!("unexpected response: {e}")))
    }
}

impl Translator for DeeplClient {
    fn translate(&self, texts: &[String], target_lang: &str, format: TextFormat) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url("/v2/translate");
        tracing::debug!(target_lang, count = texts.len(), "translating");
        let body = TranslateRequest {
            text: texts,
            source_lang: SOURCE_LANGUAGE,
            target_lang,
            tag_handling: (format == TextFormat::Html).then_some("html"),
        };
        let response: TranslateResponse = self.send(&url, self.client.post(&url).json(&body))?;
        if response.translations.len() != texts.len() {
            return Err(Self::network(
                &url,
                format!(
                    "expected {} translations, got {}",
                    texts.len(),
                    response.translations.len()
                ),
            ));
        }
        Ok(response.translations.into_iter().map(|t| t.text).collect())
    }

    fn usage(&self) -> Result<Usage> {
        let url = self.url("/v2/usage");
        self.send(&url, self.client.get(&url))
    }
}
