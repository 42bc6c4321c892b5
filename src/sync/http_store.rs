//! Match store reached through cloud-function calls over HTTP.

use super::store::{AuthoritativeStore, StoreError, StoreErrorKind};
use super::wire::{
    GetMatchState, HeartbeatRequest, HeartbeatResponse, MatchStateData, MatchStateResponse,
    ResetMatchState, UpdateMatchState,
};
use crate::config::{AUTH_TOKEN_ENV, ConfigError, SyncConfig};
use serde::{Deserialize, Serialize};
use strictly_tictactoe::Role;
use tracing::{debug, error, info, instrument, warn};

const EXECUTE_PATH: &str = "Client/ExecuteCloudScript";

/// Body of a cloud-function invocation.
#[derive(Debug, Serialize)]
struct CloudScriptRequest<'a, P: Serialize> {
    #[serde(rename = "FunctionName")]
    function_name: &'a str,
    #[serde(rename = "FunctionParameter")]
    function_parameter: &'a P,
    #[serde(rename = "GeneratePlayStreamEvent")]
    generate_play_stream_event: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct CloudScriptError {
    #[serde(rename = "Error", default)]
    error: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CloudScriptResult {
    #[serde(rename = "FunctionResult", default)]
    function_result: Option<serde_json::Value>,
    #[serde(rename = "Error", default)]
    error: Option<CloudScriptError>,
}

#[derive(Debug, Clone, Deserialize)]
struct CloudScriptEnvelope {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Option<CloudScriptResult>,
}

/// HTTP client for the hosted match store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    /// Creates a client for `base_url`.
    #[instrument(skip(auth_token), fields(base_url = %base_url))]
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        info!(authenticated = auth_token.is_some(), "Creating HTTP match store client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    /// Creates a client from `config.store_url` and the auth token in the
    /// environment.
    #[instrument(skip(config))]
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .store_url()
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::new("store_url is not configured".to_string()))?;
        let auth_token = std::env::var(AUTH_TOKEN_ENV).ok();
        if auth_token.is_none() {
            warn!(env = AUTH_TOKEN_ENV, "No auth token set, calling store anonymously");
        }
        Ok(Self::new(base_url, auth_token))
    }

    /// Invokes a cloud function and returns its `FunctionResult`.
    #[instrument(skip(self, parameter))]
    async fn execute<P: Serialize + Sync>(
        &self,
        function_name: &str,
        parameter: &P,
        generate_play_stream_event: bool,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let body = CloudScriptRequest {
            function_name,
            function_parameter: parameter,
            generate_play_stream_event,
        };

        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, EXECUTE_PATH))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Authorization", token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Failed to reach store");
            StoreError::from(e)
        })?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, body = %text, "Store response");

        if !status.is_success() {
            return Err(StoreError::new(
                StoreErrorKind::Rejected,
                format!("{} returned HTTP {}: {}", function_name, status, text),
            ));
        }

        let envelope: CloudScriptEnvelope = serde_json::from_str(&text)?;
        let result = envelope.data.ok_or_else(|| {
            error!(code = envelope.code, status = %envelope.status, "Missing data in store response");
            StoreError::malformed(format!("{} response has no data", function_name))
        })?;
        if let Some(err) = result.error {
            return Err(StoreError::new(
                StoreErrorKind::Rejected,
                format!("{} failed: {} {}", function_name, err.error, err.message),
            ));
        }
        Ok(result.function_result)
    }
}

#[async_trait::async_trait]
impl AuthoritativeStore for HttpStore {
    #[instrument(skip(self))]
    async fn get_match_state(&self, match_id: &str) -> Result<MatchStateData, StoreError> {
        let request = GetMatchState {
            match_id: match_id.to_string(),
        };
        let result = self
            .execute("getMatchState", &request, false)
            .await?
            .ok_or_else(|| StoreError::malformed("No match state data returned"))?;
        let response: MatchStateResponse = serde_json::from_value(result)?;
        response
            .data
            .ok_or_else(|| StoreError::malformed(format!("Empty match state: {}", response.message)))
    }

    #[instrument(skip(self, request), fields(match_id = %request.match_id, turn_count = request.turn_count))]
    async fn update_match_state(&self, request: UpdateMatchState) -> Result<(), StoreError> {
        self.execute("updateMatchState", &request, true).await?;
        info!(board = %request.board_state, "Updated state on server");
        Ok(())
    }

    #[instrument(skip(self, request), fields(match_id = %request.match_id))]
    async fn reset_match_state(&self, request: ResetMatchState) -> Result<(), StoreError> {
        self.execute("resetMatchState", &request, true).await?;
        info!("Match state reset on server");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn heartbeat(&self, match_id: &str, role: Role) -> Result<f64, StoreError> {
        let request = HeartbeatRequest {
            match_id: match_id.to_string(),
            role: role.to_string(),
        };
        let result = self
            .execute("heartbeat", &request, false)
            .await?
            .ok_or_else(|| StoreError::malformed("No heartbeat result returned"))?;
        let response: HeartbeatResponse = serde_json::from_value(result)?;
        Ok(response.ping_difference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_shape() {
        let parameter = GetMatchState {
            match_id: "a_b".to_string(),
        };
        let body = CloudScriptRequest {
            function_name: "getMatchState",
            function_parameter: &parameter,
            generate_play_stream_event: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["FunctionName"], "getMatchState");
        assert_eq!(json["FunctionParameter"]["matchId"], "a_b");
        assert_eq!(json["GeneratePlayStreamEvent"], false);
    }

    #[test]
    fn test_envelope_with_result() {
        let text = r#"{"code":200,"status":"OK","data":{"FunctionName":"getMatchState",
            "FunctionResult":{"message":"ok","data":{"boardState":"X--------","turn":"O",
            "turnCount":"1","winner":""}}}}"#;
        let envelope: CloudScriptEnvelope = serde_json::from_str(text).unwrap();
        let result = envelope.data.unwrap().function_result.unwrap();
        let response: MatchStateResponse = serde_json::from_value(result).unwrap();
        let snapshot = response.data.unwrap().to_snapshot().unwrap();
        assert_eq!(snapshot.state.move_count(), 1);
    }

    #[test]
    fn test_envelope_with_script_error() {
        let text = r#"{"code":200,"status":"OK","data":{"Error":{"Error":"JavascriptException",
            "Message":"boom"}}}"#;
        let envelope: CloudScriptEnvelope = serde_json::from_str(text).unwrap();
        let err = envelope.data.unwrap().error.unwrap();
        assert_eq!(err.error, "JavascriptException");
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(HttpStore::from_config(&SyncConfig::new()).is_err());
        let store = HttpStore::from_config(&SyncConfig::new().with_store_url("http://localhost:1/"))
            .unwrap();
        assert_eq!(store.base_url, "http://localhost:1");
    }
}
