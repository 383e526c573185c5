//! UploadThing client for deleting recording media.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::{required_secret, secret_header, DeleteFilesResult, ObjectStorage};
use async_trait::async_trait;
use log::*;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use service::config::Config;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesRequest {
    file_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesResponse {
    success: bool,
    #[serde(default)]
    deleted_count: usize,
}

pub struct UploadThingClient {
    client: reqwest::Client,
    base_url: String,
}

impl UploadThingClient {
    pub fn new(api_key: &SecretString, base_url: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-uploadthing-api-key", secret_header("", api_key)?);

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let api_key = required_secret("UploadThing API key", config.uploadthing_api_key())?;
        Self::new(&api_key, config.uploadthing_base_url())
    }
}

/// The storage key of a file is the last path segment of its URL
/// (`https://utfs.io/f/<key>`); bare keys are passed through.
pub fn file_key(file_url: &str) -> &str {
    let without_query = file_url.split(['?', '#']).next().unwrap_or(file_url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
}

#[async_trait]
impl ObjectStorage for UploadThingClient {
    async fn delete_files(&self, file_urls: &[String]) -> Result<DeleteFilesResult, Error> {
        let file_keys: Vec<String> = file_urls
            .iter()
            .map(|url| file_key(url).to_string())
            .filter(|key| !key.is_empty())
            .collect();

        if file_keys.is_empty() {
            return Ok(DeleteFilesResult {
                success: true,
                deleted_count: 0,
            });
        }

        let url = format!("{}/v6/deleteFiles", self.base_url);
        info!("Deleting {} files from UploadThing", file_keys.len());

        let response = self
            .client
            .post(&url)
            .json(&DeleteFilesRequest { file_keys })
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to call UploadThing deleteFiles: {e:?}");
                Error::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("UploadThing API: {status} - {error_text}");
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(format!(
                    "UploadThing deleteFiles returned {status}"
                ))),
            });
        }

        let body: DeleteFilesResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse UploadThing response: {e:?}");
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                    "Invalid response from UploadThing".to_string(),
                )),
            }
        })?;

        debug!(
            "UploadThing deleteFiles success={} deleted={}",
            body.success, body.deleted_count
        );

        Ok(DeleteFilesResult {
            success: body.success,
            deleted_count: body.deleted_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> UploadThingClient {
        UploadThingClient::new(&SecretString::new("sk_live_test".to_string()), &server.url())
            .unwrap()
    }

    #[test]
    fn file_key_is_the_last_url_segment() {
        assert_eq!(file_key("https://utfs.io/f/abc123.mp4"), "abc123.mp4");
        assert_eq!(file_key("https://utfs.io/f/abc123?download=1"), "abc123");
        assert_eq!(file_key("abc123"), "abc123");
    }

    #[tokio::test]
    async fn delete_files_sends_keys_in_one_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v6/deleteFiles")
            .match_header("x-uploadthing-api-key", "sk_live_test")
            .match_body(Matcher::Json(json!({ "fileKeys": ["a.mp4", "b.mp4"] })))
            .with_status(200)
            .with_body(json!({ "success": true, "deletedCount": 2 }).to_string())
            .expect(1)
            .create_async()
            .await;

        let result = client(&server)
            .delete_files(&[
                "https://utfs.io/f/a.mp4".to_string(),
                "https://utfs.io/f/b.mp4".to_string(),
            ])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            result,
            DeleteFilesResult {
                success: true,
                deleted_count: 2
            }
        );
    }

    #[tokio::test]
    async fn an_empty_batch_makes_no_request() {
        let server = mockito::Server::new_async().await;

        let result = client(&server).delete_files(&[]).await.unwrap();

        assert!(result.success);
        assert_eq!(result.deleted_count, 0);
    }

    #[tokio::test]
    async fn http_failures_are_retryable_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v6/deleteFiles")
            .with_status(500)
            .create_async()
            .await;

        let err = client(&server)
            .delete_files(&["https://utfs.io/f/a.mp4".to_string()])
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
