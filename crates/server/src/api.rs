//! Request and response contract for the HTTP collaborator.
//!
//! The HTTP layer hands over either a JSON body or query parameters; both
//! end up as a validated `RecommendRequest`. Responses serialize to
//! `{"user_id": .., "recommendations": [..], "method": ".."}`.

use data_loader::{ArticleId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::config::EngineConfig;
use crate::engine::{RecommendationEngine, RecommendationMethod, RecommendationResult};
use crate::error::{EngineError, Result};

/// A validated recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendRequest {
    pub user_id: UserId,
    pub k: usize,
}

impl RecommendRequest {
    /// Parse a JSON body. `user_id` may be an integer or a numeric string.
    pub fn from_json_str(body: &str, config: &EngineConfig) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| EngineError::InvalidRequest(format!("body is not valid JSON: {}", e)))?;
        Self::from_json(&value, config)
    }

    pub fn from_json(value: &Value, config: &EngineConfig) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| EngineError::InvalidRequest("body must be a JSON object".to_string()))?;
        let user_id = match object.get("user_id") {
            None | Some(Value::Null) => return Err(missing_user_id()),
            Some(raw) => parse_user_id(raw)?,
        };
        let k = match object.get("k") {
            None | Some(Value::Null) => config.default_k,
            Some(raw) => parse_k(raw)?,
        };
        Self::checked(user_id, k, config)
    }

    /// Parse query parameters, e.g. `?user_id=123&k=5`
    pub fn from_params(user_id: Option<&str>, k: Option<&str>, config: &EngineConfig) -> Result<Self> {
        let user_id = match user_id {
            None => return Err(missing_user_id()),
            Some(raw) => parse_user_id(&Value::String(raw.to_string()))?,
        };
        let k = match k {
            None => config.default_k,
            Some(raw) => parse_k(&Value::String(raw.to_string()))?,
        };
        Self::checked(user_id, k, config)
    }

    fn checked(user_id: UserId, k: usize, config: &EngineConfig) -> Result<Self> {
        if k == 0 || k > config.max_k {
            return Err(EngineError::InvalidRequest(format!(
                "k must be between 1 and {}, got {}",
                config.max_k, k
            )));
        }
        Ok(Self { user_id, k })
    }
}

fn missing_user_id() -> EngineError {
    EngineError::InvalidRequest("user_id is required".to_string())
}

fn parse_user_id(raw: &Value) -> Result<UserId> {
    let parsed = match raw {
        Value::Number(n) => n.as_u64().and_then(|id| UserId::try_from(id).ok()),
        Value::String(s) => s.trim().parse::<UserId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EngineError::InvalidRequest(format!("user_id must be a non-negative integer, got {}", raw)))
}

fn parse_k(raw: &Value) -> Result<usize> {
    let parsed = match raw {
        Value::Number(n) => n.as_u64().and_then(|k| usize::try_from(k).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EngineError::InvalidRequest(format!("k must be a positive integer, got {}", raw)))
}

/// Wire form of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub user_id: UserId,
    pub recommendations: Vec<ArticleId>,
    pub method: RecommendationMethod,
}

impl From<&RecommendationResult> for RecommendResponse {
    fn from(result: &RecommendationResult) -> Self {
        Self {
            user_id: result.user_id,
            recommendations: result.article_ids(),
            method: result.method,
        }
    }
}

/// Wire form of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(error: &EngineError) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Validate a JSON body and answer it
#[instrument(skip(engine, body))]
pub async fn handle_json(engine: &RecommendationEngine, body: &str) -> Result<RecommendResponse> {
    let request = RecommendRequest::from_json_str(body, engine.config())?;
    let result = engine.recommend(request.user_id, request.k).await?;
    Ok(RecommendResponse::from(&result))
}
