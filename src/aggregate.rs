// src/aggregate.rs
//! Fan-out over independent per-key lookups.
//!
//! Every key is fetched concurrently and awaited at a single join point. A
//! failing key is logged and left out; it never cancels its siblings and the
//! join itself never fails. Callers read a missing key as "unavailable",
//! never as a zero value.
use futures::future::join_all;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use crate::error::Result;
use crate::models::{Quote, Transaction, TransactionType};

/// Successful results by key, plus the keys that failed.
#[derive(Debug, Clone)]
pub struct Gathered<K, V> {
    pub values: HashMap<K, V>,
    pub failed: Vec<K>,
}

impl<K, V> Gathered<K, V> {
    /// True when there was something to fetch and nothing came back.
    pub fn is_total_failure(&self) -> bool {
        self.values.is_empty() && !self.failed.is_empty()
    }

    pub fn into_values(self) -> HashMap<K, V> {
        self.values
    }
}

/// Runs `fetch` once per distinct key, all at once, and keeps the successes.
pub async fn gather<K, V, F, Fut>(keys: &[K], fetch: F) -> Gathered<K, V>
where
    K: Eq + Hash + Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V>>,
{
    let mut seen = HashSet::new();
    let distinct: Vec<K> = keys
        .iter()
        .filter(|key| seen.insert((*key).clone()))
        .cloned()
        .collect();

    let outcomes = join_all(distinct.iter().cloned().map(|key| {
        let pending = fetch(key.clone());
        async move { (key, pending.await) }
    }))
    .await;

    let mut gathered = Gathered {
        values: HashMap::with_capacity(outcomes.len()),
        failed: Vec::new(),
    };
    for (key, outcome) in outcomes {
        match outcome {
            Ok(value) => {
                gathered.values.insert(key, value);
            }
            Err(e) => {
                warn!("failed to fetch {}: {}", key, e);
                gathered.failed.push(key);
            }
        }
    }
    debug!(
        "gathered {} of {} keys",
        gathered.values.len(),
        distinct.len()
    );
    gathered
}

/// Totals shown above the transaction table.
///
/// Only buy records whose symbol has a quote are counted; sell records are
/// left out of both cost and value. `profit_percent` is in percent units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Valuation {
    pub cost: f64,
    pub value: f64,
    pub profit: f64,
    pub profit_percent: f64,
}

pub fn valuation(transactions: &[Transaction], quotes: &HashMap<String, Quote>) -> Valuation {
    let (cost, value) = transactions
        .iter()
        .filter(|tx| tx.transaction_type == TransactionType::Buy)
        .filter_map(|tx| quotes.get(&tx.symbol).map(|quote| (tx, quote.price)))
        .fold((0.0, 0.0), |(cost, value), (tx, price)| {
            (
                cost + tx.quantity * tx.price_per_unit,
                value + tx.quantity * price,
            )
        });

    let profit = value - cost;
    Valuation {
        cost,
        value,
        profit,
        profit_percent: if cost > 0.0 { profit / cost * 100.0 } else { 0.0 },
    }
}

/// Per-row figures for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub transaction: Transaction,
    /// `None` while the quote is loading or unavailable.
    pub current_price: Option<f64>,
    pub profit: f64,
    pub profit_percent: f64,
}

pub fn position_rows(transactions: &[Transaction], quotes: &HashMap<String, Quote>) -> Vec<PositionRow> {
    transactions
        .iter()
        .map(|tx| {
            let current_price = quotes.get(&tx.symbol).map(|quote| quote.price);
            let profit = match (tx.transaction_type, current_price) {
                (TransactionType::Buy, Some(price)) => (price - tx.price_per_unit) * tx.quantity,
                _ => 0.0,
            };
            let basis = tx.price_per_unit * tx.quantity;
            PositionRow {
                transaction: tx.clone(),
                current_price,
                profit,
                profit_percent: if tx.price_per_unit > 0.0 && basis > 0.0 {
                    profit / basis * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::models::AssetType;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            data: None,
            fallback: false,
            sector: None,
            market_cap: None,
            volume: None,
        }
    }

    pub(crate) fn transaction(symbol: &str, kind: TransactionType, quantity: f64, price: f64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: format!("{symbol}-{kind}-{quantity}"),
            user_id: "u1".into(),
            symbol: symbol.into(),
            asset_type: AssetType::Stock,
            quantity,
            price_per_unit: price,
            transaction_type: kind,
            transaction_date: now,
            source: "manual".into(),
            fees: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            detail: None,
        }
    }

    #[tokio::test]
    async fn failed_keys_are_omitted_not_defaulted() {
        let keys: Vec<String> = ["AAPL", "FAIL", "MSFT", "BAD"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let gathered = gather(&keys, |key: String| async move {
            if key == "FAIL" || key == "BAD" {
                Err(unavailable())
            } else {
                Ok(quote(&key, 1.0))
            }
        })
        .await;

        let mut present: Vec<_> = gathered.values.keys().cloned().collect();
        present.sort();
        assert_eq!(present, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(gathered.failed.len(), 2);
        assert!(!gathered.is_total_failure());
    }

    #[tokio::test]
    async fn all_failing_is_reported_as_total_failure() {
        let keys = vec!["A".to_string(), "B".to_string()];
        let gathered: Gathered<String, Quote> =
            gather(&keys, |_key: String| async { Err(unavailable()) }).await;
        assert!(gathered.values.is_empty());
        assert!(gathered.is_total_failure());

        let empty: Gathered<String, Quote> = gather(&[], |_key: String| async { Err(unavailable()) }).await;
        assert!(!empty.is_total_failure());
    }

    #[tokio::test]
    async fn duplicate_keys_are_fetched_once() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let keys = vec!["AAPL".to_string(), "AAPL".to_string(), "TSLA".to_string()];
        let gathered = gather(&keys, |key: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(quote(&key, 2.0))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(gathered.values.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_run_concurrently() {
        let keys: Vec<String> = (0..5).map(|i| format!("K{i}")).collect();
        let started = tokio::time::Instant::now();
        let gathered = gather(&keys, |key: String| async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(key.len())
        })
        .await;
        assert_eq!(gathered.values.len(), 5);
        // Sequential fetching would take 15 seconds.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn valuation_excludes_sell_records() {
        let transactions = vec![
            transaction("AAPL", TransactionType::Buy, 2.0, 10.0),
            transaction("AAPL", TransactionType::Sell, 1.0, 12.0),
        ];
        let quotes = HashMap::from([("AAPL".to_string(), quote("AAPL", 15.0))]);

        let totals = valuation(&transactions, &quotes);
        assert_eq!(totals.cost, 20.0);
        assert_eq!(totals.value, 30.0);
        assert_eq!(totals.profit, 10.0);
        assert_eq!(totals.profit_percent, 50.0);
    }

    #[test]
    fn valuation_skips_symbols_without_quotes() {
        let transactions = vec![
            transaction("AAPL", TransactionType::Buy, 1.0, 100.0),
            transaction("NVDA", TransactionType::Buy, 3.0, 50.0),
        ];
        let quotes = HashMap::from([("AAPL".to_string(), quote("AAPL", 90.0))]);

        let totals = valuation(&transactions, &quotes);
        assert_eq!(totals.cost, 100.0);
        assert_eq!(totals.value, 90.0);
        assert_eq!(totals.profit_percent, -10.0);

        assert_eq!(valuation(&transactions, &HashMap::new()), Valuation::default());
    }

    #[test]
    fn rows_leave_missing_prices_unset() {
        let transactions = vec![
            transaction("AAPL", TransactionType::Buy, 2.0, 10.0),
            transaction("AAPL", TransactionType::Sell, 1.0, 12.0),
            transaction("NVDA", TransactionType::Buy, 1.0, 5.0),
        ];
        let quotes = HashMap::from([("AAPL".to_string(), quote("AAPL", 15.0))]);

        let rows = position_rows(&transactions, &quotes);
        assert_eq!(rows[0].current_price, Some(15.0));
        assert_eq!(rows[0].profit, 10.0);
        assert_eq!(rows[0].profit_percent, 50.0);
        assert_eq!(rows[1].profit, 0.0);
        assert_eq!(rows[2].current_price, None);
        assert_eq!(rows[2].profit, 0.0);
    }
}
