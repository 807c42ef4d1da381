use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::Instrument;
use url::Url;

use super::AuthorService;
use crate::configuration::AuthorServiceConfig;
use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::KeySpace;

/// Client of the remote author service: `GET {url}/author/{id}`.
#[derive(Clone, Debug)]
pub struct HttpAuthorService {
    http_client: reqwest::Client,
    url: Url,
}

impl HttpAuthorService {
    pub fn new(config: &AuthorServiceConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Some(Duration::from_secs(5)))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }

    /// `{url}/author/{id}`, keeping any path the base url already has.
    fn author_url(&self, id: AuthorId) -> Result<Url, FetchError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FetchError::backend(KeySpace::AuthorById, "author service url cannot be a base")
            })?
            .pop_if_empty()
            .push("author")
            .push(&id.to_string());
        Ok(url)
    }
}

#[async_trait]
impl AuthorService for HttpAuthorService {
    async fn fetch_one(&self, id: AuthorId) -> Result<Option<Author>, FetchError> {
        let url = self.author_url(id)?;
        let span = tracing::info_span!("author_service", author.id = id, http.url = %url);
        async move {
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|error| FetchError::backend(KeySpace::AuthorById, error))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                tracing::debug!("author not found");
                return Ok(None);
            }
            if !status.is_success() {
                return Err(FetchError::BackendFailure {
                    key_space: KeySpace::AuthorById,
                    status_code: Some(status.as_u16()),
                    reason: status.to_string(),
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|error| FetchError::backend(KeySpace::AuthorById, error))?;
            serde_json::from_slice(&body)
                .map(Some)
                .map_err(|error| FetchError::MalformedResponse {
                    key_space: KeySpace::AuthorById,
                    reason: error.to_string(),
                })
        }
        .instrument(span)
        .await
    }
}
