use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::utils;

/// Form field carrying every uploaded source image.
pub const FILES_FIELD: &str = "files";
pub const STYLE_FIELD: &str = "style";
pub const ASPECT_RATIO_FIELD: &str = "aspect_ratio";
pub const REFERENCE_URL_FIELD: &str = "reference_url";
pub const CUSTOM_PROMPT_FIELD: &str = "custom_prompt";
pub const API_KEY_FIELD: &str = "api_key";

pub const INPUT_TOKENS_HEADER: &str = "x-input-tokens";
pub const OUTPUT_TOKENS_HEADER: &str = "x-output-tokens";

#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| utils::detect_mime_type(&file_name));
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }
}

/// One `POST /generate` submission. Optional fields are only sent when
/// they hold a non-blank value.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub files: Vec<UploadFile>,
    pub style: String,
    pub aspect_ratio: String,
    pub reference_url: Option<String>,
    pub custom_prompt: Option<String>,
    pub api_key: Option<String>,
}

impl GenerateRequest {
    /// Text fields of the multipart body, in the order they are appended.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (STYLE_FIELD, self.style.clone()),
            (ASPECT_RATIO_FIELD, self.aspect_ratio.clone()),
        ];

        let optional = [
            (REFERENCE_URL_FIELD, &self.reference_url),
            (CUSTOM_PROMPT_FIELD, &self.custom_prompt),
            (API_KEY_FIELD, &self.api_key),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().filter(|value| !value.trim().is_empty()) {
                fields.push((name, value.to_string()));
            }
        }

        fields
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(utils::parse_token_count)
                .unwrap_or(0)
        };

        Self {
            input_tokens: read(INPUT_TOKENS_HEADER),
            output_tokens: read(OUTPUT_TOKENS_HEADER),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerateResponse {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct StudioClient {
    pub(crate) base_url: String,
    pub(crate) http: reqwest::Client,
}

impl StudioClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

pub type GenerateFn = Arc<dyn Fn(GenerateRequest) -> BoxFuture<GenerateResponse> + Send + Sync>;

pub type AnalyzeFn = Arc<dyn Fn(String) -> BoxFuture<String> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn request() -> GenerateRequest {
        GenerateRequest {
            files: vec![UploadFile::new("ring.jpg", None, vec![1, 2, 3])],
            style: "dark".into(),
            aspect_ratio: "16:9".into(),
            reference_url: None,
            custom_prompt: None,
            api_key: None,
        }
    }

    #[test]
    fn text_fields_skip_absent_optionals() {
        let fields = request().text_fields();
        assert_eq!(
            fields,
            vec![("style", "dark".to_string()), ("aspect_ratio", "16:9".to_string())]
        );
    }

    #[test]
    fn text_fields_skip_blank_optionals_and_keep_filled_ones() {
        let mut req = request();
        req.reference_url = Some("   ".into());
        req.custom_prompt = Some("marble background".into());
        req.api_key = Some("key-123".into());

        let names: Vec<&str> = req.text_fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["style", "aspect_ratio", "custom_prompt", "api_key"]);
    }

    #[test]
    fn upload_file_guesses_mime_from_name() {
        let file = UploadFile::new("necklace.png", Some(" ".into()), Vec::new());
        assert_eq!(file.mime_type, "image/png");
    }

    #[test]
    fn token_usage_reads_headers_and_defaults_to_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(INPUT_TOKENS_HEADER, HeaderValue::from_static("1200"));
        headers.insert(OUTPUT_TOKENS_HEADER, HeaderValue::from_static("n/a"));

        let usage = TokenUsage::from_headers(&headers);
        assert_eq!(usage.input_tokens, 1200);
        assert_eq!(usage.output_tokens, 0);

        assert_eq!(TokenUsage::from_headers(&HeaderMap::new()), TokenUsage::default());
    }

    #[test]
    fn client_endpoint_joins_without_double_slash() {
        let client = StudioClient::new("http://localhost:8000/");
        assert_eq!(client.endpoint("/generate"), "http://localhost:8000/generate");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
