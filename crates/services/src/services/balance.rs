//! Account balance lookups for the AI providers used to produce books.

use backon::Retryable;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use ts_rs::TS;
use url::Url;

use super::{
    config::{DeepseekConfig, FalConfig},
    integration_client::{IntegrationError, check_status, http_client, map_reqwest_error, retry_policy},
};

const DEEPSEEK_BALANCE_URL: &str = "https://api.deepseek.com/user/balance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CurrencyBalance {
    pub currency: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ProviderBalance {
    pub provider: String,
    pub available: bool,
    pub balances: Vec<CurrencyBalance>,
    pub error: Option<String>,
}

impl ProviderBalance {
    fn failed(provider: &str, error: &IntegrationError) -> Self {
        Self {
            provider: provider.to_string(),
            available: false,
            balances: vec![],
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BalancesReport {
    pub deepseek: ProviderBalance,
    pub fal: ProviderBalance,
}

#[derive(Debug, Deserialize)]
struct DeepseekBalanceResponse {
    is_available: bool,
    #[serde(default)]
    balance_infos: Vec<DeepseekBalanceInfo>,
}

#[derive(Debug, Deserialize)]
struct DeepseekBalanceInfo {
    currency: String,
    total_balance: String,
}

#[derive(Debug)]
pub struct BalanceService {
    http: Client,
    deepseek_key: Option<SecretString>,
    fal: Option<(SecretString, Url)>,
}

impl BalanceService {
    pub fn new(
        deepseek: Option<&DeepseekConfig>,
        fal: Option<&FalConfig>,
    ) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: http_client()?,
            deepseek_key: deepseek
                .map(|c| SecretString::from(c.api_key.expose_secret().to_owned())),
            fal: fal.map(|c| {
                (
                    SecretString::from(c.api_key.expose_secret().to_owned()),
                    c.balance_url.clone(),
                )
            }),
        })
    }

    /// Query every provider concurrently. A failing provider is reported in
    /// its own entry and does not affect the others.
    pub async fn fetch_all(&self) -> BalancesReport {
        let (deepseek, fal) = tokio::join!(self.deepseek(), self.fal());
        BalancesReport {
            deepseek: deepseek.unwrap_or_else(|e| ProviderBalance::failed("deepseek", &e)),
            fal: fal.unwrap_or_else(|e| ProviderBalance::failed("fal", &e)),
        }
    }

    pub async fn deepseek(&self) -> Result<ProviderBalance, IntegrationError> {
        let key = self
            .deepseek_key
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("deepseek"))?;
        let body = self
            .get_json(|| {
                self.http
                    .get(DEEPSEEK_BALANCE_URL)
                    .bearer_auth(key.expose_secret())
            })
            .await?;
        parse_deepseek(body)
    }

    pub async fn fal(&self) -> Result<ProviderBalance, IntegrationError> {
        let (key, url) = self
            .fal
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("fal"))?;
        let body = self
            .get_json(|| {
                self.http
                    .get(url.clone())
                    .header("Authorization", format!("Key {}", key.expose_secret()))
            })
            .await?;
        parse_fal(&body)
    }

    async fn get_json<F>(&self, build: F) -> Result<Value, IntegrationError>
    where
        F: Fn() -> RequestBuilder,
    {
        (|| async {
            let res = build().send().await.map_err(map_reqwest_error)?;
            check_status(res)
                .await?
                .json::<Value>()
                .await
                .map_err(|e| IntegrationError::Serde(e.to_string()))
        })
        .retry(retry_policy())
        .when(|e: &IntegrationError| e.should_retry())
        .notify(|e, dur| {
            warn!(
                "Balance lookup failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }
}

fn parse_deepseek(body: Value) -> Result<ProviderBalance, IntegrationError> {
    let response: DeepseekBalanceResponse =
        serde_json::from_value(body).map_err(|e| IntegrationError::Serde(e.to_string()))?;

    let balances = response
        .balance_infos
        .into_iter()
        .map(|info| {
            let total = info.total_balance.trim().parse::<f64>().map_err(|_| {
                IntegrationError::Serde(format!("invalid balance '{}'", info.total_balance))
            })?;
            Ok(CurrencyBalance {
                currency: info.currency,
                total,
            })
        })
        .collect::<Result<Vec<_>, IntegrationError>>()?;

    Ok(ProviderBalance {
        provider: "deepseek".to_string(),
        available: response.is_available,
        balances,
        error: None,
    })
}

/// FAL answers either a bare number or an object carrying `balance`
/// (number or numeric string) and optionally `currency`.
fn parse_fal(body: &Value) -> Result<ProviderBalance, IntegrationError> {
    let as_number = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let (total, currency) = match body {
        Value::Object(map) => (
            map.get("balance").and_then(as_number),
            map.get("currency").and_then(Value::as_str),
        ),
        other => (as_number(other), None),
    };
    let total = total.ok_or_else(|| {
        IntegrationError::Serde(format!("unrecognised FAL balance response: {body}"))
    })?;

    Ok(ProviderBalance {
        provider: "fal".to_string(),
        available: total > 0.0,
        balances: vec![CurrencyBalance {
            currency: currency.unwrap_or("USD").to_string(),
            total,
        }],
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_deepseek_balance() {
        let body = json!({
            "is_available": true,
            "balance_infos": [
                {"currency": "CNY", "total_balance": "110.00", "granted_balance": "10.00", "topped_up_balance": "100.00"},
                {"currency": "USD", "total_balance": "2.5", "granted_balance": "0", "topped_up_balance": "2.5"}
            ]
        });
        let balance = parse_deepseek(body).unwrap();
        assert!(balance.available);
        assert_eq!(
            balance.balances,
            vec![
                CurrencyBalance {
                    currency: "CNY".to_string(),
                    total: 110.0
                },
                CurrencyBalance {
                    currency: "USD".to_string(),
                    total: 2.5
                },
            ]
        );
    }

    #[test]
    fn test_parse_deepseek_rejects_garbage_amount() {
        let body = json!({
            "is_available": false,
            "balance_infos": [{"currency": "USD", "total_balance": "n/a"}]
        });
        assert!(matches!(parse_deepseek(body), Err(IntegrationError::Serde(_))));
    }

    #[test]
    fn test_parse_fal_shapes() {
        assert_eq!(parse_fal(&json!(12.5)).unwrap().balances[0].total, 12.5);
        let parsed = parse_fal(&json!({"balance": "3.75", "currency": "EUR"})).unwrap();
        assert_eq!(parsed.balances[0].currency, "EUR");
        assert_eq!(parsed.balances[0].total, 3.75);
        assert!(!parse_fal(&json!({"balance": 0})).unwrap().available);
        assert!(parse_fal(&json!({"credits": 1})).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_providers_reported_individually() {
        let service = BalanceService::new(None, None).unwrap();
        let report = service.fetch_all().await;
        assert!(!report.deepseek.available);
        assert_eq!(
            report.deepseek.error.as_deref(),
            Some("deepseek is not configured")
        );
        assert_eq!(report.fal.error.as_deref(), Some("fal is not configured"));
    }
}
