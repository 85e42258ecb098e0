//! Match image resolution
//!
//! A match may carry its face crop inline or only point at it. Failing to get
//! an image is never an error; the match is then presented as text only.

use super::models::Match;
use crate::network::HttpClient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};
use url::Url;

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

impl Match {
    /// Decode an inline `data:image/...;base64,` payload
    pub fn inline_image(&self) -> Option<Vec<u8>> {
        let data_uri = self.base64.as_deref()?;
        if !data_uri.starts_with("data:image") {
            return None;
        }
        let (_, payload) = data_uri.split_once(',')?;

        match STANDARD.decode(payload.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Base64 decode error for {}: {}", self.url, e);
                None
            }
        }
    }

    /// Candidate image URLs, most specific first
    pub fn image_urls(&self) -> Vec<Url> {
        [
            self.image_url.as_deref(),
            self.thumb_url.as_deref(),
            Some(self.url.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter_map(|raw| Url::parse(raw).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
    }
}

/// Get image bytes for a match: inline payload first, then each candidate URL
pub async fn resolve_image(client: &HttpClient, face: &Match) -> Option<Vec<u8>> {
    if let Some(bytes) = face.inline_image() {
        return Some(bytes);
    }

    for url in face.image_urls() {
        match client.fetch(&url).await {
            Ok(response)
                if response.status == 200
                    && looks_like_image(&url, response.content_type.as_deref()) =>
            {
                return Some(response.body);
            }
            Ok(response) => {
                debug!("No image at {} (HTTP {})", url, response.status);
            }
            Err(e) => {
                warn!("Failed to fetch image from {}: {}", url, e);
            }
        }
    }

    None
}

fn looks_like_image(url: &Url, content_type: Option<&str>) -> bool {
    if content_type.map_or(false, |ct| ct.contains("image")) {
        return true;
    }
    let path = url.path().to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_inline_image_decodes_data_uri() {
        let mut face = Match::new(88.0, "https://example.com/p/1");
        face.base64 = Some("data:image/jpeg;base64,/9j/4A==".to_string());
        assert_eq!(face.inline_image(), Some(vec![0xff, 0xd8, 0xff, 0xe0]));
    }

    #[test]
    fn test_inline_image_rejects_garbage() {
        let mut face = Match::new(88.0, "https://example.com/p/1");
        face.base64 = Some("data:image/jpeg;base64,@@@".to_string());
        assert!(face.inline_image().is_none());

        face.base64 = Some("not a data uri".to_string());
        assert!(face.inline_image().is_none());
    }

    #[test]
    fn test_image_urls_skip_non_http() {
        let mut face = Match::new(70.0, "ftp://example.com/x.jpg");
        face.thumb_url = Some("https://cdn.example.com/t.jpg".to_string());
        face.image_url = Some("not a url".to_string());

        let urls: Vec<String> = face.image_urls().iter().map(|u| u.to_string()).collect();
        assert_eq!(urls, vec!["https://cdn.example.com/t.jpg"]);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/face"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]),
            )
            .mount(&server)
            .await;

        let client = HttpClient::with_settings(&ServiceSettings::default()).unwrap();
        let mut face = Match::new(91.0, format!("{}/face", server.uri()));
        face.image_url = Some(format!("{}/missing.jpg", server.uri()));

        let bytes = resolve_image(&client, &face).await;
        assert_eq!(bytes, Some(vec![0x89, 0x50, 0x4e, 0x47]));
    }

    #[tokio::test]
    async fn test_resolve_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = HttpClient::with_settings(&ServiceSettings::default()).unwrap();
        let face = Match::new(60.0, format!("{}/profile", server.uri()));

        assert!(resolve_image(&client, &face).await.is_none());
    }
}
