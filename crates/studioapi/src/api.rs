use anyhow::{Context, Result, anyhow};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use tracing::debug;

use crate::models::{AnalyzeRequest, AnalyzeResponse, ErrorBody};
use crate::types::{
    AnalyzeFn, BoxFuture, FILES_FIELD, GenerateFn, GenerateRequest, GenerateResponse, StudioClient,
    TokenUsage,
};
use crate::utils::is_image_mime;

const GENERATE_PATH: &str = "generate";
const ANALYZE_PATH: &str = "analyze-reference";
const FALLBACK_IMAGE_MIME: &str = "image/png";

pub fn build_multipart(request: &GenerateRequest) -> Result<Form> {
    let mut form = Form::new();

    for file in &request.files {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .with_context(|| format!("Invalid mime type '{}'", file.mime_type))?;
        form = form.part(FILES_FIELD, part);
    }

    for (name, value) in request.text_fields() {
        form = form.text(name, value);
    }

    Ok(form)
}

pub async fn send_generate_request(
    api_client: &StudioClient,
    request: GenerateRequest,
) -> Result<GenerateResponse> {
    if request.files.is_empty() {
        return Err(anyhow!("At least one source image is required"));
    }

    let url = api_client.endpoint(GENERATE_PATH);
    debug!(
        %url,
        files = request.files.len(),
        style = %request.style,
        aspect_ratio = %request.aspect_ratio,
        has_api_key = request.api_key.is_some(),
        "sending generate request"
    );

    let form = build_multipart(&request)?;
    let response = api_client
        .http
        .post(&url)
        .multipart(form)
        .send()
        .await
        .context("HTTP request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "Generation failed: status {} {}",
            status,
            error_detail(&body)
        ));
    }

    let usage = TokenUsage::from_headers(response.headers());
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .context("Reading response body failed")?;

    let mime_type = check_image_body(content_type.as_deref(), &bytes)?;

    Ok(GenerateResponse {
        mime_type,
        bytes: bytes.to_vec(),
        usage,
    })
}

pub async fn send_analyze_request(api_client: &StudioClient, url: &str) -> Result<String> {
    let endpoint = api_client.endpoint(ANALYZE_PATH);
    let body = AnalyzeRequest {
        url: url.to_string(),
    };

    let response_text = api_client
        .http
        .post(&endpoint)
        .json(&body)
        .send()
        .await
        .context("HTTP request (analyze-reference) failed")?
        .error_for_status()
        .context("Non-success status returned")?
        .text()
        .await
        .context("Reading analyze-reference response body failed")?;

    let parsed: AnalyzeResponse = serde_json::from_str(&response_text).with_context(|| {
        format!(
            "Failed to decode analyze-reference JSON. Raw response: {}",
            response_text
        )
    })?;

    parsed
        .image_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Reference analysis returned no image URL"))
}

/// The response body must be a non-empty image. A missing content type
/// or a generic binary one is accepted and treated as PNG.
pub fn check_image_body(content_type: Option<&str>, bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(anyhow!("Service returned an empty image body"));
    }

    let mime = content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match mime {
        None | Some("application/octet-stream") => Ok(FALLBACK_IMAGE_MIME.to_string()),
        Some(value) if is_image_mime(value) => Ok(value.to_ascii_lowercase()),
        Some(value) => Err(anyhow!("Service returned '{}' instead of an image", value)),
    }
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .unwrap_or_else(|| body.trim().to_string())
}

pub fn generate_fn(client: StudioClient) -> GenerateFn {
    Arc::new(move |request: GenerateRequest| -> BoxFuture<GenerateResponse> {
        let client = client.clone();
        Box::pin(async move { send_generate_request(&client, request).await })
    })
}

pub fn analyze_fn(client: StudioClient) -> AnalyzeFn {
    Arc::new(move |url: String| -> BoxFuture<String> {
        let client = client.clone();
        Box::pin(async move { send_analyze_request(&client, &url).await })
    })
}
