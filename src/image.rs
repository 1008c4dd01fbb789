use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::Client;
use thiserror::Error;

use crate::error::HttpError;
use crate::impl_into_response;

pub const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to fetch image: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Image host returned HTTP {0}")]
    Status(u16),

    #[error("Invalid icon code: {0}")]
    InvalidIconCode(String),
}

impl HttpError for ImageError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIconCode(_) => StatusCode::BAD_REQUEST,
            Self::Status(404) => StatusCode::NOT_FOUND,
            Self::RequestError(_) | Self::Status(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIconCode(_) => "INVALID_ICON_CODE",
            Self::Status(404) => "ICON_NOT_FOUND",
            Self::RequestError(_) | Self::Status(_) => "IMAGE_FETCH_FAILED",
        }
    }
}

impl_into_response!(ImageError);

/// URL of the 2x PNG for a weather icon code such as "01d"
pub fn icon_url(base_url: &str, icon_code: &str) -> Result<String, ImageError> {
    if icon_code.is_empty() || !icon_code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ImageError::InvalidIconCode(icon_code.to_string()));
    }
    Ok(format!(
        "{}/{}@2x.png",
        base_url.trim_end_matches('/'),
        icon_code
    ))
}

#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Bytes, ImageError>;
}

pub struct HttpImageLoader {
    client: Client,
}

impl HttpImageLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<Bytes, ImageError> {
        tracing::debug!(url = %url, "Loading image");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_icon_url() {
        assert_eq!(
            icon_url(ICON_BASE_URL, "10d").unwrap(),
            "https://openweathermap.org/img/wn/10d@2x.png"
        );
        assert_eq!(
            icon_url("http://localhost:9000/", "01n").unwrap(),
            "http://localhost:9000/01n@2x.png"
        );
    }

    #[test]
    fn test_icon_url_rejects_bad_codes() {
        assert!(matches!(
            icon_url(ICON_BASE_URL, ""),
            Err(ImageError::InvalidIconCode(_))
        ));
        assert!(matches!(
            icon_url(ICON_BASE_URL, "../etc"),
            Err(ImageError::InvalidIconCode(_))
        ));
    }

    #[tokio::test]
    async fn test_load_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/01d@2x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .mount(&server)
            .await;

        let loader = HttpImageLoader::new(Client::new());
        let url = icon_url(&server.uri(), "01d").unwrap();
        let bytes = loader.load(&url).await.unwrap();

        assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_load_missing_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let loader = HttpImageLoader::new(Client::new());
        let err = loader
            .load(&format!("{}/zz@2x.png", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::Status(404)));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
