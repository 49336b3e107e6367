//! ============================================================================
//! Atlas Card Store - Remote card collection via App Services
//! ============================================================================
//! Talks to the App Services client API:
//! - anonymous login for an access token (cached, refreshed once on 401)
//! - `createCardIfNotExists` function for the atomic create
//! - `mongodb-atlas` service `findOne` / `find` for reads
//!
//! The unique index on `walletAddress` lives in the remote collection; the
//! create function reports a violation as `card_exists`.
//! ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::store::{CardStore, StoreError};
use super::types::{Card, CardMetadata, NewCard};
use crate::config::StoreConfig;
use crate::gate::Tier;
use crate::types::WalletIdentity;

/// Remote card store backed by an App Services application
pub struct AtlasCardStore {
    client: Client,
    timeout: Duration,
    base_url: String,
    app_id: String,
    service: String,
    database: String,
    collection: String,
    create_function: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Reply of the create function: `{ ok, error?, card? }`
#[derive(Debug, Deserialize)]
struct CreateResponse {
    ok: bool,
    error: Option<String>,
    card: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardDocument {
    wallet_address: String,
    display_name: Option<String>,
    tier: Option<String>,
    metadata: Option<Value>,
    created_at: Option<Value>,
    updated_at: Option<Value>,
}

impl AtlasCardStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let app_id = config
            .atlas_app_id
            .clone()
            .ok_or_else(|| StoreError::Backend("HALOCARD_ATLAS_APP_ID not set".to_string()))?;

        let timeout = Duration::from_secs(config.atlas_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            base_url: config.atlas_base_url.trim_end_matches('/').to_string(),
            app_id,
            service: config.atlas_service.clone(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            create_function: config.create_function.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Per-request timeout applied to every App Services call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn app_url(&self, path: &str) -> String {
        format!("{}/api/client/v2.0/app/{}/{}", self.base_url, self.app_id, path)
    }

    async fn login(&self) -> Result<String, StoreError> {
        debug!("Logging in anonymously to App Services app {}", self.app_id);

        let response = self
            .client
            .post(self.app_url("auth/providers/anon-user/login"))
            .header("Content-Type", "application/json")
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to log in: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read login response: {}", e)))?;

        if !status.is_success() {
            return Err(StoreError::Backend(format!("Login failed ({}): {}", status, body)));
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Backend(format!("Failed to parse login response: {}", e)))?;

        *self.access_token.write().await = Some(login.access_token.clone());
        info!("App Services session established");
        Ok(login.access_token)
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.login().await
    }

    /// POST to functions/call. A 401 means the function never ran, so one
    /// fresh login and resend is safe.
    async fn call(&self, body: &Value) -> Result<Value, StoreError> {
        let token = self.access_token().await?;
        match self.send_call(&token, body).await? {
            CallReply::Unauthorized => {
                debug!("Access token rejected, logging in again");
                *self.access_token.write().await = None;
                let token = self.login().await?;
                match self.send_call(&token, body).await? {
                    CallReply::Unauthorized => Err(StoreError::Backend(
                        "App Services rejected a fresh access token".to_string(),
                    )),
                    CallReply::Body(value) => Ok(value),
                }
            }
            CallReply::Body(value) => Ok(value),
        }
    }

    async fn send_call(&self, token: &str, body: &Value) -> Result<CallReply, StoreError> {
        let response = self
            .client
            .post(self.app_url("functions/call"))
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to call App Services: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(CallReply::Unauthorized);
        }

        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(StoreError::from_message(format!(
                "App Services error ({}): {}",
                status, text
            )));
        }

        let value = serde_json::from_str(&text).map_err(|e| {
            StoreError::Backend(format!("Failed to parse response: {} - body: {}", e, text))
        })?;
        Ok(CallReply::Body(value))
    }

    fn find_one_request(&self, wallet: &WalletIdentity) -> Value {
        json!({
            "name": "findOne",
            "service": self.service,
            "arguments": [{
                "database": self.database,
                "collection": self.collection,
                "query": { "walletAddress": wallet.as_str() },
            }],
        })
    }

    fn find_recent_request(&self, limit: usize) -> Value {
        json!({
            "name": "find",
            "service": self.service,
            "arguments": [{
                "database": self.database,
                "collection": self.collection,
                "query": {},
                "sort": { "createdAt": -1 },
                "limit": limit,
            }],
        })
    }

    fn create_request(&self, card: &NewCard) -> Value {
        json!({
            "name": self.create_function,
            "arguments": [
                card.wallet_address.as_str(),
                card.display_name,
                card.tier.display_name(),
                card.metadata,
            ],
        })
    }
}

enum CallReply {
    Unauthorized,
    Body(Value),
}

#[async_trait]
impl CardStore for AtlasCardStore {
    async fn find_one(&self, wallet: &WalletIdentity) -> Result<Option<Card>, StoreError> {
        let reply = self.call(&self.find_one_request(wallet)).await?;
        if reply.is_null() {
            return Ok(None);
        }
        decode_document(reply).map(Some).map_err(StoreError::Backend)
    }

    async fn insert_if_absent(&self, card: NewCard) -> Result<Card, StoreError> {
        let reply = self.call(&self.create_request(&card)).await?;
        let response: CreateResponse = serde_json::from_value(reply)
            .map_err(|e| StoreError::Backend(format!("Unexpected create response: {}", e)))?;

        if !response.ok {
            let message = response.error.unwrap_or_else(|| "server_error".to_string());
            return Err(StoreError::from_message(message));
        }

        info!("Created card for {} via {}", card.wallet_address.short(), self.create_function);
        match response.card {
            Some(doc) => decode_document(doc).map_err(StoreError::Backend),
            // Function acknowledged without echoing the document
            None => Ok(card.into_card(Utc::now())),
        }
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Card>, StoreError> {
        let reply = self.call(&self.find_recent_request(limit)).await?;
        let docs = match reply {
            Value::Array(docs) => docs,
            Value::Null => Vec::new(),
            other => {
                return Err(StoreError::Backend(format!(
                    "Expected an array of cards, got: {}",
                    other
                )))
            }
        };

        let mut cards = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode_document(doc) {
                Ok(card) => cards.push(card),
                Err(e) => warn!("Skipping undecodable card document: {}", e),
            }
        }
        Ok(cards)
    }

    fn backend_name(&self) -> &'static str {
        "atlas"
    }
}

/// Turn a stored document (EJSON, `_id` included) into a Card
fn decode_document(doc: Value) -> Result<Card, String> {
    let doc: CardDocument =
        serde_json::from_value(doc).map_err(|e| format!("Invalid card document: {}", e))?;

    let wallet_address = WalletIdentity::parse(&doc.wallet_address).map_err(|e| e.to_string())?;

    let tier = match doc.tier.as_deref() {
        Some(raw) => raw.parse::<Tier>().unwrap_or_else(|e| {
            warn!("{} on card {} - showing as Angel", e, wallet_address.short());
            Tier::Angel
        }),
        None => Tier::Angel,
    };

    let metadata = match doc.metadata {
        Some(Value::Object(map)) => CardMetadata::from(map.into_iter().collect::<BTreeMap<_, _>>()),
        _ => CardMetadata::new(),
    };

    Ok(Card {
        wallet_address,
        display_name: doc.display_name,
        tier,
        metadata,
        created_at: doc.created_at.as_ref().and_then(parse_ejson_date).unwrap_or_default(),
        updated_at: doc.updated_at.as_ref().and_then(parse_ejson_date),
    })
}

/// Accepts RFC 3339 strings and the EJSON `$date` forms
fn parse_ejson_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return parse_ejson_date(inner);
            }
            map.get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
        }
        _ => None,
    }
}
