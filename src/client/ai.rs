use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{
    api::{HistoryApi, NewHistory},
    config::ClientConfig,
    ClientError,
};
use crate::history::repo_types::{HistoryEntry, SearchMode};

const SEARCH_ENDPOINT: &str = "/search";
const FULL_PIPELINE_ENDPOINT: &str = "/full-pipeline";

pub const DEFAULT_NUM_CANDIDATES: u32 = 5;
const TITLE_MAX_CHARS: usize = 60;
// Sourcing and outreach generation can take minutes.
const PIPELINE_TIMEOUT_SECS: u64 = 400;

#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    description: &'a str,
    num_candidates: u32,
}

/// Display view over the opaque document the AI service returns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PipelineResults {
    Candidates(Vec<Value>),
    Full {
        #[serde(default)]
        candidates: Vec<Value>,
        #[serde(default)]
        scored_candidates: Vec<Value>,
        #[serde(default)]
        outreach_messages: Vec<Value>,
    },
}

impl PipelineResults {
    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }

    pub fn candidates(&self) -> &[Value] {
        match self {
            PipelineResults::Candidates(c) => c,
            PipelineResults::Full { candidates, .. } => candidates,
        }
    }
}

/// Anything that turns a job description into a results document.
#[async_trait]
pub trait CandidatePipeline: Send + Sync {
    async fn run(
        &self,
        mode: SearchMode,
        description: &str,
        num_candidates: u32,
    ) -> Result<Value, ClientError>;
}

pub struct AiClient {
    client: Client,
    base_url: String,
}

impl AiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PIPELINE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, endpoint: &str, description: &str, n: u32) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let res = self
            .client
            .post(&url)
            .json(&PipelineRequest {
                description,
                num_candidates: n,
            })
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("AI service call to {endpoint} failed"));
            return Err(ClientError::Status { status, message });
        }
        Ok(res.json::<Value>().await?)
    }

    pub async fn search(&self, description: &str, n: u32) -> Result<Value, ClientError> {
        self.post(SEARCH_ENDPOINT, description, n).await
    }

    pub async fn full_pipeline(&self, description: &str, n: u32) -> Result<Value, ClientError> {
        self.post(FULL_PIPELINE_ENDPOINT, description, n).await
    }
}

#[async_trait]
impl CandidatePipeline for AiClient {
    async fn run(
        &self,
        mode: SearchMode,
        description: &str,
        num_candidates: u32,
    ) -> Result<Value, ClientError> {
        match mode {
            SearchMode::Quick => self.search(description, num_candidates).await,
            SearchMode::Full => self.full_pipeline(description, num_candidates).await,
        }
    }
}

/// First non-blank line of the job description, cut to a label-sized length.
pub fn default_title(jd: &str) -> String {
    let Some(line) = jd.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return "Untitled search".into();
    };
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Run the pipeline for `jd` and store what it returned in the user's history.
#[instrument(skip(pipeline, api, token, jd))]
pub async fn record_search(
    pipeline: &dyn CandidatePipeline,
    api: &dyn HistoryApi,
    token: &str,
    mode: SearchMode,
    jd: &str,
    title: Option<&str>,
    num_candidates: u32,
) -> Result<HistoryEntry, ClientError> {
    let results = pipeline.run(mode, jd, num_candidates).await?;
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_title(jd));
    let entry = api
        .add_history(
            token,
            &NewHistory {
                title,
                jd: jd.to_string(),
                mode,
                results,
            },
        )
        .await?;
    info!(entry_id = %entry.id, "search recorded");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::api::HistorySummary;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    async fn spawn_ai_stub() -> AiClient {
        let app = Router::new()
            .route(
                SEARCH_ENDPOINT,
                post(|Json(body): Json<Value>| async move {
                    Json(json!([{
                        "name": "Ada",
                        "description": body["description"],
                        "num_candidates": body["num_candidates"]
                    }]))
                }),
            )
            .route(
                FULL_PIPELINE_ENDPOINT,
                post(|Json(body): Json<Value>| async move {
                    if body["description"] == "explode" {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({ "detail": "Pipeline error: model timed out" })),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "candidates": [{ "name": "Ada" }],
                            "scored_candidates": [{ "name": "Ada", "score": 9.1 }],
                            "outreach_messages": [{ "candidate": "Ada", "message": "Hi" }]
                        })),
                    )
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        AiClient::new(&ClientConfig {
            api_base_url: String::new(),
            ai_base_url: format!("http://{addr}/"),
        })
        .unwrap()
    }

    struct CannedPipeline(Value);

    #[async_trait]
    impl CandidatePipeline for CannedPipeline {
        async fn run(&self, _: SearchMode, _: &str, _: u32) -> Result<Value, ClientError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingApi {
        added: Mutex<Vec<NewHistory>>,
    }

    #[async_trait]
    impl HistoryApi for RecordingApi {
        async fn list_history(&self, _: &str) -> Result<Vec<HistorySummary>, ClientError> {
            Ok(Vec::new())
        }

        async fn get_history(&self, _: &str, _: Uuid) -> Result<HistoryEntry, ClientError> {
            Err(ClientError::NotSignedIn)
        }

        async fn add_history(
            &self,
            _: &str,
            entry: &NewHistory,
        ) -> Result<HistoryEntry, ClientError> {
            self.added.lock().unwrap().push(entry.clone());
            Ok(HistoryEntry {
                id: Uuid::new_v4(),
                title: entry.title.clone(),
                jd: entry.jd.clone(),
                mode: entry.mode,
                results: entry.results.clone(),
                timestamp: OffsetDateTime::now_utc(),
            })
        }

        async fn delete_history(&self, _: &str, _: Uuid) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[test]
    fn results_view_distinguishes_shapes() {
        let quick = json!([{ "name": "Ada" }, { "name": "Linus" }]);
        let full = json!({
            "candidates": [{ "name": "Ada" }],
            "scored_candidates": [{ "name": "Ada", "score": 9.1 }],
            "outreach_messages": [{ "candidate": "Ada", "message": "Hi" }]
        });
        let q = PipelineResults::from_value(&quick).unwrap();
        let f = PipelineResults::from_value(&full).unwrap();
        assert!(matches!(q, PipelineResults::Candidates(_)));
        assert_eq!(q.candidates().len(), 2);
        match f {
            PipelineResults::Full {
                ref scored_candidates,
                ref outreach_messages,
                ..
            } => {
                assert_eq!(scored_candidates.len(), 1);
                assert_eq!(outreach_messages.len(), 1);
            }
            _ => panic!("expected full pipeline shape"),
        }
        assert!(PipelineResults::from_value(&json!("nope")).is_none());
    }

    #[test]
    fn default_title_uses_first_line() {
        assert_eq!(default_title("\n  Senior Rust Engineer \nRemote"), "Senior Rust Engineer");
        assert_eq!(default_title("   \n"), "Untitled search");
        let long = "x".repeat(100);
        let title = default_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn pipeline_request_wire_shape() {
        let body = serde_json::to_value(PipelineRequest {
            description: "jd",
            num_candidates: DEFAULT_NUM_CANDIDATES,
        })
        .unwrap();
        assert_eq!(body, json!({ "description": "jd", "num_candidates": 5 }));
    }

    #[tokio::test]
    async fn record_search_stores_pipeline_output_verbatim() {
        let output = json!({ "candidates": [{ "name": "Ada", "extra": { "deep": [1, 2] } }] });
        let pipeline = CannedPipeline(output.clone());
        let api = RecordingApi::default();

        let entry = record_search(
            &pipeline,
            &api,
            "token",
            SearchMode::Full,
            "React Developer\nBuild UIs",
            None,
            6,
        )
        .await
        .unwrap();

        assert_eq!(entry.title, "React Developer");
        assert_eq!(entry.results, output);
        let added = api.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].mode, SearchMode::Full);
    }

    #[tokio::test]
    async fn ai_client_posts_description_and_candidate_count() {
        let ai = spawn_ai_stub().await;

        let quick = ai.run(SearchMode::Quick, "Rust dev", 3).await.unwrap();
        assert_eq!(
            quick,
            json!([{ "name": "Ada", "description": "Rust dev", "num_candidates": 3 }])
        );

        let full = ai.run(SearchMode::Full, "Rust dev", 5).await.unwrap();
        match PipelineResults::from_value(&full).unwrap() {
            PipelineResults::Full {
                scored_candidates, ..
            } => assert_eq!(scored_candidates.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn ai_client_surfaces_detail_on_failure() {
        let ai = spawn_ai_stub().await;

        match ai.full_pipeline("explode", 5).await.unwrap_err() {
            ClientError::Status { status, message } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(message, "Pipeline error: model timed out");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
