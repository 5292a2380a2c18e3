use isahc::http::header::CONTENT_TYPE;
use isahc::{AsyncReadResponseExt, HttpClient, Request};
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::server::{SavedResponse, TagsBody, TagsResponse};
use crate::tagset::TagSet;

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("Could not reach tag service.")]
    Http(#[from] isahc::Error),

    #[error("Could not build tag service request.")]
    Request(#[from] isahc::http::Error),

    #[error("Could not read tag service response.")]
    Body(#[from] std::io::Error),

    #[error("Tag service answered with an unexpected body.")]
    Decode(#[from] serde_json::Error),

    #[error("Tag service failed ({status}): {message}")]
    Status { status: u16, message: String },
}

/// HTTP client of the tag service.
#[derive(Debug, Clone)]
pub struct TagServiceClient {
    http_client: HttpClient,
    base: String,
}

impl TagServiceClient {
    pub fn new(http_client: HttpClient, base: impl Into<String>) -> TagServiceClient {
        TagServiceClient {
            http_client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn tags_url(&self, folder_id: &str) -> String {
        format!("{}/tags/{}", self.base, urlencoding::encode(folder_id))
    }

    pub async fn get_tags(&self, folder_id: &str) -> Result<TagSet, ApiError> {
        let request = Request::get(self.tags_url(folder_id)).body(())?;
        let response: TagsResponse = self.call(request).await?;
        Ok(response.tags)
    }

    /// Replace tags of `folder_id`, returning what the service stored.
    pub async fn set_tags(&self, folder_id: &str, tags: &[String]) -> Result<TagSet, ApiError> {
        let body = serde_json::to_vec(&TagsBody {
            tags: Some(tags.to_vec()),
        })?;
        let request = Request::post(self.tags_url(folder_id))
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(body)?;
        let response: SavedResponse = self.call(request).await?;
        Ok(response.tags)
    }

    pub async fn all_tags(&self) -> Result<Vec<String>, ApiError> {
        let request = Request::get(format!("{}/all-tags", self.base)).body(())?;
        self.call(request).await
    }

    async fn call<B, T>(&self, request: Request<B>) -> Result<T, ApiError>
    where
        B: Into<isahc::AsyncBody>,
        T: DeserializeOwned,
    {
        let mut response = self.http_client.send_async(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
