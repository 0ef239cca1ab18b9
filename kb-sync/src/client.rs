use crate::auth::Session;
use crate::error::{KbResult, KbSyncError};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PUBLISH_ACTION: &str = "PUBLISH_ARTICLE";

/// Knowledge base REST surface used by the sync engine. Paths are relative
/// to `/services/data/{version}` on the session's instance.
#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    /// Runs a query and returns every record, following pagination.
    async fn query(&self, session: &Session, soql: &str) -> KbResult<Vec<Value>>;

    async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>
    ) -> KbResult<Value>;

    /// Opens a new draft version of a published article and returns its id.
    async fn create_draft_from_master(&self, session: &Session, master_id: &str) -> KbResult<String>;

    async fn publish(&self, session: &Session, version_ids: &[String]) -> KbResult<()>;
}

pub struct HttpKnowledgeClient {
    client: Client,
    api_version: String
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default = "default_done")]
    done: bool,
    next_records_url: Option<String>
}

fn default_done() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionOutcome {
    is_success: bool,
    errors: Option<Vec<Value>>
}

impl HttpKnowledgeClient {
    pub fn new(api_version: impl Into<String>, timeout: Duration) -> KbResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KbSyncError::HttpError)?;

        Ok(Self {
            client,
            api_version: api_version.into()
        })
    }

    fn base_url(&self, session: &Session) -> String {
        format!("{}/services/data/{}", session.instance_url, self.api_version)
    }

    async fn send(
        &self,
        session: &Session,
        method: Method,
        url: &str,
        body: Option<&Value>
    ) -> KbResult<Value> {
        debug!(method = %method, url = %url, "Making knowledge API request");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&session.access_token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::read_response(url, response).await
    }

    async fn read_response(url: &str, response: Response) -> KbResult<Value> {
        match response.status() {
            StatusCode::NO_CONTENT => Ok(Value::Null),
            status if status.is_success() => {
                let text = response.text().await?;
                if text.trim().is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(serde_json::from_str(&text)?)
                }
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(KbSyncError::RateLimited {
                    retry_after_seconds: retry_after
                })
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(KbSyncError::Unauthorized(error_message(&body)))
            }
            StatusCode::NOT_FOUND => Err(KbSyncError::NotFound(url.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(KbSyncError::ApiError {
                    status: status.as_u16(),
                    message: error_message(&body)
                })
            }
        }
    }
}

/// Flattens the `[{"errorCode", "message"}]` error body into one line.
fn error_message(body: &str) -> String {
    let Ok(Value::Array(errors)) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            let message = e.get("message").and_then(Value::as_str).unwrap_or_default();
            match e.get("errorCode").and_then(Value::as_str) {
                Some(code) => format!("{code}: {message}"),
                None => message.to_string()
            }
        })
        .collect();
    if messages.is_empty() {
        body.to_string()
    } else {
        messages.join("; ")
    }
}

#[async_trait]
impl KnowledgeApi for HttpKnowledgeClient {
    async fn query(&self, session: &Session, soql: &str) -> KbResult<Vec<Value>> {
        let mut url = format!("{}/query?q={}", self.base_url(session), urlencoding::encode(soql));
        let mut records = Vec::new();

        loop {
            let body = self.send(session, Method::GET, &url, None).await?;
            let page: QueryPage = serde_json::from_value(body)?;
            records.extend(page.records);

            match page.next_records_url {
                Some(next) if !page.done => {
                    url = format!("{}{}", session.instance_url, next);
                }
                _ => break
            }
        }

        Ok(records)
    }

    async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>
    ) -> KbResult<Value> {
        let url = format!("{}{}", self.base_url(session), path);
        self.send(session, method, &url, body).await
    }

    async fn create_draft_from_master(&self, session: &Session, master_id: &str) -> KbResult<String> {
        let body = json!({ "articleId": master_id });
        let response = self
            .request(
                session,
                Method::POST,
                "/knowledgeManagement/articleVersions/masterVersions",
                Some(&body)
            )
            .await?;

        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                KbSyncError::UnexpectedResponse(format!(
                    "draft creation for {master_id} returned no id"
                ))
            })
    }

    async fn publish(&self, session: &Session, version_ids: &[String]) -> KbResult<()> {
        let body = json!({
            "inputs": [{
                "articleVersionIdList": version_ids,
                "pubAction": PUBLISH_ACTION
            }]
        });
        let response = self
            .request(
                session,
                Method::POST,
                "/actions/standard/publishKnowledge",
                Some(&body)
            )
            .await?;

        let outcomes: Vec<ActionOutcome> = serde_json::from_value(response)?;
        let rejected: Vec<ActionOutcome> = outcomes.into_iter().filter(|o| !o.is_success).collect();
        if rejected.is_empty() {
            return Ok(());
        }

        let mut errors: Vec<String> = rejected
            .into_iter()
            .flat_map(|o| o.errors.unwrap_or_default())
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string())
            })
            .collect();
        if errors.is_empty() {
            errors.push("publish action reported failure".to_string());
        }

        Err(KbSyncError::UnexpectedResponse(format!(
            "publish rejected: {}",
            errors.join("; ")
        )))
    }
}

pub fn create_knowledge_client(
    api_version: &str,
    timeout: Duration
) -> KbResult<Arc<dyn KnowledgeApi>> {
    Ok(Arc::new(HttpKnowledgeClient::new(api_version, timeout)?))
}
