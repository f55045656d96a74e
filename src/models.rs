// src/models.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClientError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Crypto,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Stock => write!(f, "stock"),
            AssetType::Crypto => write!(f, "crypto"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Buy,
    Sell,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "buy"),
            TransactionType::Sell => write!(f, "sell"),
        }
    }
}

/// Price snapshot for one symbol. Replaced wholesale on every refresh.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
    /// Short intraday history, only sent for market indexes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<f64>>,
    /// Set when the backend served a cached value instead of a live one.
    #[serde(default)]
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FollowedAsset {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub asset_type: AssetType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "timestamp")]
    pub added_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewFollow {
    pub symbol: String,
    pub asset_type: AssetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub transaction_type: TransactionType,
    #[serde(with = "timestamp")]
    pub transaction_date: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub fees: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_source() -> String {
    "manual".to_string()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub symbol: String,
    pub asset_type: AssetType,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub transaction_date: DateTime<Utc>,
    pub transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewTransaction {
    /// Rejects records the backend would store with a non-positive amount.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.symbol.trim().is_empty() {
            return Err(ClientError::Validation("symbol is required".into()));
        }
        if !(self.quantity > 0.0) {
            return Err(ClientError::Validation("quantity must be greater than zero".into()));
        }
        if !(self.price_per_unit > 0.0) {
            return Err(ClientError::Validation("price must be greater than zero".into()));
        }
        if self.fees.is_some_and(|fees| fees < 0.0) {
            return Err(ClientError::Validation("fees cannot be negative".into()));
        }
        Ok(())
    }
}

/// Query parameters accepted by `GET /portfolio/investments`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct InvestmentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(
        rename = "publishedAt",
        default,
        deserialize_with = "timestamp::deserialize_opt"
    )]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(rename = "relatedSymbol", default, skip_serializing_if = "Option::is_none")]
    pub related_symbol: Option<String>,
}

/// Entry of the dashboard's latest-news feed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default)]
    pub scores: Option<SentimentScores>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SentimentScores {
    #[serde(default)]
    pub polarity: Option<f64>,
}

impl Headline {
    pub fn polarity(&self) -> f64 {
        self.scores
            .as_ref()
            .and_then(|scores| scores.polarity)
            .unwrap_or(0.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Plain acknowledgement body (`{"message": ...}` or `{"msg": ...}`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Ack {
    #[serde(default, alias = "msg")]
    pub message: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// The backend emits RFC 3339 timestamps, naive UTC datetimes or bare dates
/// depending on the column; all of them are read as UTC.
pub(crate) mod timestamp {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
