// src/judge/judge0.rs

//! HTTP adapter for a Judge0-compatible judging service.
//!
//! Every text field travels base64-encoded (`base64_encoded=true`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::AppError;

use super::{BatchItem, CaseResult, JudgeClient, RunOutcome, RunRequest, decode_text, encode_text};

const AUTH_HEADER: &str = "X-Auth-Token";
const BATCH_FIELDS: &str = "token,status,time,memory";

#[derive(Debug, Serialize)]
struct WireSubmission {
    language_id: i32,
    source_code: String,
    stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_time_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_extra_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wall_time_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit: Option<i64>,
}

impl From<BatchItem> for WireSubmission {
    fn from(item: BatchItem) -> Self {
        Self {
            language_id: item.language_id,
            source_code: encode_text(&item.source_code),
            stdin: encode_text(&item.stdin),
            expected_output: Some(encode_text(&item.expected_output)),
            cpu_time_limit: Some(item.cpu_time_limit),
            cpu_extra_time: Some(item.cpu_extra_time),
            wall_time_limit: Some(item.wall_time_limit),
            memory_limit: Some(item.memory_limit),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireBatch {
    submissions: Vec<WireSubmission>,
}

/// Batch creation answers one object per item: a token, or field errors.
#[derive(Debug, Deserialize)]
struct WireToken {
    token: Option<String>,
    #[serde(flatten)]
    errors: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    id: i32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    token: String,
    status: Option<WireStatus>,
    #[serde(default, deserialize_with = "string_or_number")]
    time: Option<String>,
    #[serde(default)]
    memory: Option<i64>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBatchResults {
    submissions: Vec<WireResult>,
}

/// The judge reports `time` as a decimal string; some builds send a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn decode_optional(field: Option<String>) -> Result<Option<String>, AppError> {
    field.as_deref().map(decode_text).transpose()
}

/// Judge0 client over `reqwest`.
#[derive(Clone)]
pub struct Judge0Client {
    http: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl Judge0Client {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        // Url::join drops the last path segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::InternalServerError(format!("Invalid judge URL: {}", e)))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<T, AppError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamJudgeError(format!(
                "Judge answered {}: {}",
                status, body
            )));
        }
        let parsed = response.json::<T>().await?;
        Ok(parsed)
    }
}

#[async_trait]
impl JudgeClient for Judge0Client {
    async fn submit_one(&self, request: RunRequest) -> Result<RunOutcome, AppError> {
        let url = self.endpoint(
            "submissions",
            &[("base64_encoded", "true"), ("wait", "true")],
        )?;
        let body = WireSubmission {
            language_id: request.language_id,
            source_code: encode_text(&request.source_code),
            stdin: encode_text(&request.stdin),
            expected_output: None,
            cpu_time_limit: None,
            cpu_extra_time: None,
            wall_time_limit: None,
            memory_limit: None,
        };

        let result: WireResult = self.send(self.http.post(url).json(&body)).await?;
        let status = result.status.ok_or_else(|| {
            AppError::UpstreamJudgeError("Judge result without status".to_string())
        })?;

        Ok(RunOutcome {
            token: result.token,
            status_id: status.id,
            status_description: status.description,
            stdout: decode_optional(result.stdout)?,
            stderr: decode_optional(result.stderr)?,
            compile_output: decode_optional(result.compile_output)?,
            time: result.time,
            memory: result.memory,
        })
    }

    async fn submit_batch(&self, items: Vec<BatchItem>) -> Result<Vec<String>, AppError> {
        let url = self.endpoint("submissions/batch", &[("base64_encoded", "true")])?;
        let expected = items.len();
        let body = WireBatch {
            submissions: items.into_iter().map(WireSubmission::from).collect(),
        };

        let created: Vec<WireToken> = self.send(self.http.post(url).json(&body)).await?;
        if created.len() != expected {
            return Err(AppError::UpstreamJudgeError(format!(
                "Judge returned {} tokens for {} submissions",
                created.len(),
                expected
            )));
        }

        created
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.token.ok_or_else(|| {
                    AppError::UpstreamJudgeError(format!(
                        "Judge rejected batch item {}: {}",
                        index,
                        serde_json::Value::Object(entry.errors)
                    ))
                })
            })
            .collect()
    }

    async fn fetch_batch(&self, tokens: &[String]) -> Result<Vec<CaseResult>, AppError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let joined = tokens.join(",");
        let url = self.endpoint(
            "submissions/batch",
            &[
                ("tokens", joined.as_str()),
                ("base64_encoded", "true"),
                ("fields", BATCH_FIELDS),
            ],
        )?;

        let results: WireBatchResults = self.send(self.http.get(url)).await?;
        if results.submissions.len() != tokens.len() {
            return Err(AppError::UpstreamJudgeError(format!(
                "Judge returned {} results for {} tokens",
                results.submissions.len(),
                tokens.len()
            )));
        }

        Ok(results
            .submissions
            .into_iter()
            .zip(tokens)
            .map(|(result, token)| {
                let (status_id, status_description) = match result.status {
                    Some(status) => (status.id, status.description),
                    // No status yet means the judge has not picked it up.
                    None => (1, "In Queue".to_string()),
                };
                CaseResult {
                    token: if result.token.is_empty() {
                        token.clone()
                    } else {
                        result.token
                    },
                    status_id,
                    status_description,
                    time: result.time,
                    memory: result.memory,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::{Value, json};

    use super::*;

    fn client(base: &str) -> Judge0Client {
        Judge0Client::new(base, None, Duration::from_secs(1)).unwrap()
    }

    /// Serves `router` on a random local port; returns the judge base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    /// Batch creation endpoint answering `created`, guarded by `X-Auth-Token: secret`.
    fn creating_judge(created: Value) -> Router {
        Router::new().route(
            "/api/submissions/batch",
            post(
                move |Query(query): Query<HashMap<String, String>>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let created = created.clone();
                    async move {
                        let authorized = headers
                            .get("x-auth-token")
                            .is_some_and(|v| v.as_bytes() == b"secret");
                        if !authorized {
                            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "denied"})));
                        }
                        let encoded = query.get("base64_encoded").map(String::as_str) == Some("true")
                            && body["submissions"][0]["source_code"] == "cHJpbnQoMSk=";
                        if !encoded {
                            return (StatusCode::BAD_REQUEST, Json(json!({"error": "not base64"})));
                        }
                        (StatusCode::CREATED, Json(created))
                    }
                },
            ),
        )
    }

    /// Batch status endpoint answering `results` for the expected token list.
    fn polling_judge(results: Value) -> Router {
        Router::new().route(
            "/api/submissions/batch",
            get(move |Query(query): Query<HashMap<String, String>>| {
                let results = results.clone();
                async move {
                    let wanted = query.get("tokens").map(String::as_str) == Some("a,b")
                        && query.get("fields").map(String::as_str) == Some(BATCH_FIELDS);
                    if !wanted {
                        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad query"})));
                    }
                    (StatusCode::OK, Json(results))
                }
            }),
        )
    }

    fn items(count: usize) -> Vec<BatchItem> {
        (0..count)
            .map(|i| BatchItem {
                language_id: 71,
                source_code: "print(1)".to_string(),
                stdin: format!("{}\n", i),
                expected_output: "1\n".to_string(),
                cpu_time_limit: 2.0,
                cpu_extra_time: 0.5,
                wall_time_limit: 4.0,
                memory_limit: 131072,
            })
            .collect()
    }

    fn tokens() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn upstream_message(err: AppError) -> String {
        match err {
            AppError::UpstreamJudgeError(msg) => msg,
            other => panic!("expected an upstream judge error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_batch_over_http() {
        let base = serve(creating_judge(json!([{"token": "t1"}, {"token": "t2"}]))).await;
        let judge =
            Judge0Client::new(&base, Some("secret".to_string()), Duration::from_secs(5)).unwrap();

        let tokens = judge.submit_batch(items(2)).await.unwrap();
        assert_eq!(tokens, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_rejected_request_is_upstream_error() {
        let base = serve(creating_judge(json!([{"token": "t1"}]))).await;
        let err = client(&base).submit_batch(items(1)).await.unwrap_err();
        assert!(upstream_message(err).contains("401"));
    }

    #[tokio::test]
    async fn test_submit_batch_token_count_mismatch() {
        let base = serve(creating_judge(json!([{"token": "t1"}]))).await;
        let judge =
            Judge0Client::new(&base, Some("secret".to_string()), Duration::from_secs(5)).unwrap();

        let err = judge.submit_batch(items(2)).await.unwrap_err();
        assert!(upstream_message(err).contains("1 tokens for 2 submissions"));
    }

    #[tokio::test]
    async fn test_submit_batch_item_rejected() {
        let created = json!([{"token": "t1"}, {"language_id": ["can't be blank"]}]);
        let base = serve(creating_judge(created)).await;
        let judge =
            Judge0Client::new(&base, Some("secret".to_string()), Duration::from_secs(5)).unwrap();

        let msg = upstream_message(judge.submit_batch(items(2)).await.unwrap_err());
        assert!(msg.contains("batch item 1"));
        assert!(msg.contains("language_id"));
    }

    #[tokio::test]
    async fn test_fetch_batch_without_status_is_queued() {
        let results = json!({"submissions": [
            {"time": null, "memory": null},
            {"token": "b", "status": {"id": 4, "description": "Wrong Answer"}, "time": "0.25", "memory": 900}
        ]});
        let base = serve(polling_judge(results)).await;

        let fetched = client(&base).fetch_batch(&tokens()).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].token, "a");
        assert_eq!(fetched[0].status_id, 1);
        assert_eq!(fetched[0].status_description, "In Queue");
        assert!(fetched[0].status().is_live());
        assert_eq!(fetched[1].token, "b");
        assert_eq!(fetched[1].status_id, 4);
        assert_eq!(fetched[1].time.as_deref(), Some("0.25"));
        assert_eq!(fetched[1].memory, Some(900));
    }

    #[tokio::test]
    async fn test_fetch_batch_result_count_mismatch() {
        let results = json!({"submissions": [
            {"token": "a", "status": {"id": 3, "description": "Accepted"}}
        ]});
        let base = serve(polling_judge(results)).await;

        let err = client(&base).fetch_batch(&tokens()).await.unwrap_err();
        assert!(upstream_message(err).contains("1 results for 2 tokens"));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let judge = client("http://judge.local/api");
        let url = judge
            .endpoint("submissions/batch", &[("base64_encoded", "true")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://judge.local/api/submissions/batch?base64_encoded=true"
        );
    }

    #[test]
    fn test_batch_item_is_base64_on_the_wire() {
        let wire = WireSubmission::from(BatchItem {
            language_id: 71,
            source_code: "print(1)".to_string(),
            stdin: "1\n".to_string(),
            expected_output: "1\n".to_string(),
            cpu_time_limit: 2.0,
            cpu_extra_time: 0.5,
            wall_time_limit: 4.0,
            memory_limit: 131072,
        });
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["source_code"], "cHJpbnQoMSk=");
        assert_eq!(json["stdin"], "MQo=");
        assert_eq!(json["expected_output"], "MQo=");
        assert_eq!(json["wall_time_limit"], 4.0);
        assert_eq!(json["memory_limit"], 131072);
    }

    #[test]
    fn test_scratch_run_omits_limits() {
        let wire = WireSubmission {
            language_id: 71,
            source_code: encode_text("x"),
            stdin: encode_text(""),
            expected_output: None,
            cpu_time_limit: None,
            cpu_extra_time: None,
            wall_time_limit: None,
            memory_limit: None,
        };
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("expected_output").is_none());
        assert!(json.get("cpu_time_limit").is_none());
    }

    #[test]
    fn test_parse_batch_results() {
        let body = r#"{"submissions":[
            {"token":"a","status":{"id":3,"description":"Accepted"},"time":"0.012","memory":1024},
            {"token":"b","status":{"id":2,"description":"Processing"},"time":null,"memory":null},
            {"token":"c","status":{"id":4,"description":"Wrong Answer"},"time":0.5,"memory":900}
        ]}"#;
        let parsed: WireBatchResults = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.submissions.len(), 3);
        assert_eq!(parsed.submissions[0].time.as_deref(), Some("0.012"));
        assert_eq!(parsed.submissions[1].time, None);
        assert_eq!(parsed.submissions[2].time.as_deref(), Some("0.5"));
        assert_eq!(parsed.submissions[2].status.as_ref().map(|s| s.id), Some(4));
    }

    #[test]
    fn test_parse_batch_token_errors() {
        let body = r#"[{"token":"a"},{"language_id":["can't be blank"]}]"#;
        let parsed: Vec<WireToken> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].token.as_deref(), Some("a"));
        assert!(parsed[1].token.is_none());
        assert!(parsed[1].errors.contains_key("language_id"));
    }
}
