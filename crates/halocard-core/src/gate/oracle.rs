//! ============================================================================
//! Balance Oracle - SPL token balance lookups over Solana JSON-RPC
//! ============================================================================
//! Calls `getTokenAccountsByOwner` filtered by mint with jsonParsed encoding
//! and reads the first returned account. No accounts means zero balance.
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::types::TokenBalance;
use crate::types::WalletIdentity;

/// Failure talking to the balance oracle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    Malformed(String),
}

/// Source of token balances
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Balance of `mint` held by `owner`. `Ok(None)` when the owner has no
    /// token account for the mint.
    async fn token_balance(
        &self,
        owner: &WalletIdentity,
        mint: &str,
    ) -> Result<Option<TokenBalance>, OracleError>;
}

/// Oracle backed by a Solana JSON-RPC endpoint
pub struct RpcBalanceOracle {
    client: Client,
    rpc_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<AccountsResult>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResult {
    value: Vec<KeyedAccount>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct KeyedAccount {
    pubkey: String,
    account: ParsedAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedToken,
}

#[derive(Debug, Deserialize)]
struct ParsedToken {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
    ui_amount_string: Option<String>,
}

impl RpcBalanceOracle {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl BalanceOracle for RpcBalanceOracle {
    async fn token_balance(
        &self,
        owner: &WalletIdentity,
        mint: &str,
    ) -> Result<Option<TokenBalance>, OracleError> {
        debug!("Querying {} balance for {} via {}", mint, owner.short(), self.rpc_url);

        let request = json!({
            "jsonrpc": "2.0",
            "id": "halocard",
            "method": "getTokenAccountsByOwner",
            "params": [
                owner.as_str(),
                { "mint": mint },
                { "encoding": "jsonParsed" },
            ],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(OracleError::Transport(format!("HTTP {}: {}", status, body)));
        }

        parse_accounts_response(&body, mint)
    }
}

/// Extract the first token account's balance from a JSON-RPC response body
pub(crate) fn parse_accounts_response(
    body: &str,
    mint: &str,
) -> Result<Option<TokenBalance>, OracleError> {
    let envelope: RpcEnvelope = serde_json::from_str(body)
        .map_err(|e| OracleError::Malformed(format!("{} - body: {}", e, body)))?;

    if let Some(err) = envelope.error {
        return Err(OracleError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    let result = envelope.result.ok_or_else(|| {
        OracleError::Malformed("response has neither result nor error".to_string())
    })?;

    let Some(first) = result.value.into_iter().next() else {
        return Ok(None);
    };

    let amount = first.account.data.parsed.info.token_amount;
    let raw_amount = amount
        .amount
        .parse::<u128>()
        .map_err(|e| OracleError::Malformed(format!("token amount '{}': {}", amount.amount, e)))?;
    let ui_amount = amount
        .ui_amount_string
        .as_deref()
        .unwrap_or("0")
        .parse::<f64>()
        .map_err(|e| OracleError::Malformed(format!("uiAmountString: {}", e)))?;

    Ok(Some(TokenBalance {
        raw_amount,
        ui_amount,
        decimals: amount.decimals,
        mint_address: mint.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "ArwBHrqR721SVSqnrk6MAwvwbFZ2cvadyGyHdKxobonk";

    fn account_body(amount: &str, ui: &str) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": "halocard",
            "result": {
                "context": { "slot": 1 },
                "value": [{
                    "pubkey": "4NCHbXpn4KjqjKhGKBpXKxSWBkVGpWK5sdfgdUt2AHHB",
                    "account": {
                        "lamports": 2039280,
                        "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                        "data": {
                            "program": "spl-token",
                            "parsed": {
                                "type": "account",
                                "info": {
                                    "mint": MINT,
                                    "owner": "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
                                    "tokenAmount": {
                                        "amount": amount,
                                        "decimals": 9,
                                        "uiAmount": 12000.0,
                                        "uiAmountString": ui
                                    }
                                }
                            },
                            "space": 165
                        }
                    }
                }]
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_first_account() {
        let body = account_body("12000000000000", "12000");
        let balance = parse_accounts_response(&body, MINT).unwrap().unwrap();
        assert_eq!(balance.raw_amount, 12_000_000_000_000);
        assert_eq!(balance.ui_amount, 12_000.0);
        assert_eq!(balance.decimals, 9);
        assert_eq!(balance.mint_address, MINT);
    }

    #[test]
    fn test_parse_no_accounts_is_none() {
        let body =
            r#"{"jsonrpc":"2.0","id":"halocard","result":{"context":{"slot":1},"value":[]}}"#;
        assert_eq!(parse_accounts_response(body, MINT).unwrap(), None);
    }

    #[test]
    fn test_parse_rpc_error() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": "halocard",
            "error": {"code": -32602, "message": "Invalid param: WrongSize"}
        }"#;
        let err = parse_accounts_response(body, MINT).unwrap_err();
        assert_eq!(
            err,
            OracleError::Rpc {
                code: -32602,
                message: "Invalid param: WrongSize".to_string()
            }
        );
    }

    #[test]
    fn test_parse_malformed_amount() {
        let body = account_body("lots", "12000");
        assert!(matches!(
            parse_accounts_response(&body, MINT),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_not_json() {
        assert!(matches!(
            parse_accounts_response("<html>502</html>", MINT),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_oracle_creation() {
        let oracle = RpcBalanceOracle::new("https://api.devnet.solana.com", Duration::from_secs(5));
        assert!(oracle.is_ok());
        assert_eq!(oracle.unwrap().rpc_url(), "https://api.devnet.solana.com");
    }
}
