//! Client for the email-marketing API (contacts and "grupos").
use crate::config::{RemoteConfig, RetryPolicy};
use crate::errors::ApiError;
use crate::executor::{RawResponse, RequestExecutor, RequestSpec};
use crate::types::{ContactId, SegmentId, SegmentName};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Error message the API uses when a contact with the same email exists.
pub const DUPLICATE_CONTACT_MARKER: &str = "Já existe um contato com este email";

const SNIPPET_CHARS: usize = 100;

/// Operations the registration pipeline needs from the marketing platform.
#[async_trait]
pub trait MarketingApi: Send + Sync {
    /// Fails with `ApiError::Configuration` when no credential is available.
    fn ensure_configured(&self) -> Result<(), ApiError>;

    async fn search_contact(&self, email: &str) -> Result<Option<ContactId>, ApiError>;

    /// Fails with `ApiError::DuplicateContact` when the email is already registered.
    async fn create_contact(&self, name: &str, email: &str) -> Result<ContactId, ApiError>;

    async fn search_segment(&self, name: &SegmentName) -> Result<Option<SegmentId>, ApiError>;

    async fn create_segment(&self, name: &SegmentName) -> Result<SegmentId, ApiError>;

    async fn subscribe(&self, contact: &ContactId, segments: &[SegmentId]) -> Result<(), ApiError>;
}

/// A response body, decoded only as far as "is it JSON".
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Structured(Value),
    Malformed(String),
}

impl Decoded {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Decoded::Structured(value),
            Err(_) => Decoded::Malformed(body.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ContactRecord {
    id: ContactId,
}

#[derive(Deserialize)]
struct SegmentRecord {
    id: SegmentId,
    nome: Option<String>,
}

#[derive(Deserialize)]
struct Listing<T> {
    data: Option<Vec<T>>,
}

#[derive(Deserialize)]
struct Created<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct RemoteClient {
    executor: RequestExecutor,
    base_url: Url,
    credential: Option<String>,
    max_attempts: u32,
}

impl RemoteClient {
    /// Builds the client. The credential is read here, once; a missing
    /// credential is reported on use, before any request is sent.
    pub fn new(config: &RemoteConfig, retry: RetryPolicy) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(ApiError::ClientBuild)?;

        Ok(RemoteClient {
            max_attempts: retry.max_attempts,
            executor: RequestExecutor::new(client, retry),
            base_url: config.base_url.clone(),
            credential: config.credential(),
        })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let key = self.credential.as_deref().ok_or(ApiError::Configuration)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("chave", key);
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Turns a raw response into JSON, mapping throttling, error envelopes and
    /// non-JSON bodies to their error kinds.
    fn interpret(&self, response: RawResponse) -> Result<Value, ApiError> {
        let status = response.status;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimitExceeded {
                attempts: self.max_attempts,
            });
        }

        match Decoded::from_body(&response.body) {
            Decoded::Malformed(raw) => Err(ApiError::MalformedResponse {
                status,
                snippet: raw.chars().take(SNIPPET_CHARS).collect(),
            }),
            Decoded::Structured(value) if status.is_success() => Ok(value),
            Decoded::Structured(value) => {
                let message = serde_json::from_value::<ErrorEnvelope>(value)
                    .ok()
                    .and_then(|envelope| envelope.error.message)
                    .unwrap_or_else(|| format!("HTTP {status}"));
                Err(ApiError::Rejection { status, message })
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let response = self.executor.execute(&spec).await?;
        let status = response.status;
        let value = self.interpret(response)?;
        serde_json::from_value(value.clone()).map_err(|_| ApiError::MalformedResponse {
            status,
            snippet: value.to_string().chars().take(SNIPPET_CHARS).collect(),
        })
    }
}

#[async_trait]
impl MarketingApi for RemoteClient {
    fn ensure_configured(&self) -> Result<(), ApiError> {
        match self.credential {
            Some(_) => Ok(()),
            None => Err(ApiError::Configuration),
        }
    }

    async fn search_contact(&self, email: &str) -> Result<Option<ContactId>, ApiError> {
        let url = self.endpoint(&["contatos"], &[("email", email)])?;
        let listing: Listing<ContactRecord> = self.call(RequestSpec::get(url)).await?;

        Ok(listing
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|record| record.id))
    }

    async fn create_contact(&self, name: &str, email: &str) -> Result<ContactId, ApiError> {
        let url = self.endpoint(&["contatos"], &[])?;
        let spec = RequestSpec::post_json(url, json!({ "nome": name, "email": email }));

        match self.call::<Created<ContactRecord>>(spec).await {
            Ok(created) => Ok(created.data.id),
            Err(ApiError::Rejection { message, .. })
                if message.contains(DUPLICATE_CONTACT_MARKER) =>
            {
                Err(ApiError::DuplicateContact)
            }
            Err(err) => Err(err),
        }
    }

    async fn search_segment(&self, name: &SegmentName) -> Result<Option<SegmentId>, ApiError> {
        let url = self.endpoint(&["grupos"], &[("nome", name.as_str())])?;
        let listing: Listing<SegmentRecord> = self.call(RequestSpec::get(url)).await?;

        // The search may be fuzzy; only an exact name is the same segment.
        // Records without a name are trusted as matches.
        Ok(listing
            .data
            .unwrap_or_default()
            .into_iter()
            .find(|record| record.nome.as_deref().is_none_or(|n| n == name.as_str()))
            .map(|record| record.id))
    }

    async fn create_segment(&self, name: &SegmentName) -> Result<SegmentId, ApiError> {
        let url = self.endpoint(&["grupos"], &[])?;
        let spec = RequestSpec::post_json(url, json!({ "nome": name.as_str() }));
        let created: Created<SegmentRecord> = self.call(spec).await?;
        Ok(created.data.id)
    }

    async fn subscribe(&self, contact: &ContactId, segments: &[SegmentId]) -> Result<(), ApiError> {
        let url = self.endpoint(&["contatos", contact.as_str(), "inscrever"], &[])?;
        let ids = segments
            .iter()
            .map(SegmentId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let spec = RequestSpec::post_json(url, json!({ "idGrupos": ids }));

        let response = self.executor.execute(&spec).await?;
        // Success bodies vary between endpoints versions; only failures are decoded.
        if response.status.is_success() {
            return Ok(());
        }
        self.interpret(response).map(|_| ())
    }
}
