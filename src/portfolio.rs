// src/portfolio.rs
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::{gather, position_rows, valuation, Gathered, PositionRow, Valuation};
use crate::api::ApiClient;
use crate::config::ClientSettings;
use crate::error::{ClientError, Result};
use crate::models::{
    AssetType, FollowedAsset, InvestmentFilter, NewFollow, NewTransaction, Quote, Transaction,
    TransactionType,
};
use crate::news::{merge_related_news, RelatedArticle};
use crate::view::{Panel, Refresh, ViewState};

/// Latest quotes for the transaction symbols and the totals derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holdings {
    pub quotes: HashMap<String, Quote>,
    pub totals: Valuation,
}

async fn fetch_quotes(
    api: &ApiClient,
    symbols: &[String],
    kinds: &HashMap<String, AssetType>,
) -> Gathered<String, Quote> {
    gather(symbols, move |symbol: String| async move {
        let kind = kinds.get(&symbol).copied().unwrap_or(AssetType::Stock);
        api.details(kind, &symbol).await
    })
    .await
}

fn symbol_kinds<'a>(pairs: impl Iterator<Item = (&'a str, AssetType)>) -> (Vec<String>, HashMap<String, AssetType>) {
    let mut symbols = Vec::new();
    let mut kinds = HashMap::new();
    for (symbol, kind) in pairs {
        if kinds.insert(symbol.to_string(), kind).is_none() {
            symbols.push(symbol.to_string());
        }
    }
    (symbols, kinds)
}

/// Investment page: watch-list with live prices, transaction records with
/// valuation, and news for both.
pub struct PortfolioPage {
    client: ApiClient,
    settings: ClientSettings,
    followed: Vec<FollowedAsset>,
    transactions: Vec<Transaction>,
    pub followed_quotes: Panel<HashMap<String, Quote>>,
    pub holdings: Panel<Holdings>,
    pub related_news: Panel<Vec<RelatedArticle>>,
}

impl PortfolioPage {
    /// Loads both lists, then mounts the live panels over them.
    pub async fn load(client: &ApiClient, settings: &ClientSettings) -> Result<Self> {
        let filter = InvestmentFilter::default();
        let (followed, transactions) =
            tokio::try_join!(client.followed(None), client.investments(&filter))?;
        info!(
            "portfolio loaded: {} followed, {} transactions",
            followed.len(),
            transactions.len()
        );

        let mut page = Self {
            client: client.clone(),
            settings: settings.clone(),
            followed,
            transactions,
            followed_quotes: Panel::new("followed quotes"),
            holdings: Panel::new("investment quotes"),
            related_news: Panel::new("related news"),
        };
        page.remount_followed();
        page.remount_holdings();
        page.remount_news();
        Ok(page)
    }

    /// Page over fixed lists with nothing mounted.
    #[cfg(test)]
    pub(crate) fn unmounted(
        client: &ApiClient,
        followed: Vec<FollowedAsset>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            client: client.clone(),
            settings: ClientSettings::default(),
            followed,
            transactions,
            followed_quotes: Panel::new("followed quotes"),
            holdings: Panel::new("investment quotes"),
            related_news: Panel::new("related news"),
        }
    }

    pub fn followed(&self) -> &[FollowedAsset] {
        &self.followed
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Watch-list rows; `None` means the quote is loading or unavailable.
    pub fn followed_rows(&self) -> Vec<(FollowedAsset, Option<Quote>)> {
        let state = self.followed_quotes.state();
        let quotes = state.ready();
        self.followed
            .iter()
            .map(|asset| {
                let quote = quotes.and_then(|q| q.get(&asset.symbol)).cloned();
                (asset.clone(), quote)
            })
            .collect()
    }

    pub fn position_rows(&self) -> Vec<PositionRow> {
        match self.holdings.state() {
            ViewState::Ready(holdings) => position_rows(&self.transactions, &holdings.quotes),
            _ => position_rows(&self.transactions, &HashMap::new()),
        }
    }

    pub fn totals(&self) -> Option<Valuation> {
        self.holdings.state().ready().map(|holdings| holdings.totals)
    }

    fn remount_followed(&mut self) {
        let (symbols, kinds) = symbol_kinds(
            self.followed
                .iter()
                .map(|asset| (asset.symbol.as_str(), asset.asset_type)),
        );
        if symbols.is_empty() {
            self.followed_quotes.show(HashMap::new());
            return;
        }

        let api = self.client.clone();
        let symbols = Arc::new(symbols);
        let kinds = Arc::new(kinds);
        self.followed_quotes
            .mount(Refresh::Every(self.settings.refresh_period), move || {
                let api = api.clone();
                let symbols = symbols.clone();
                let kinds = kinds.clone();
                async move {
                    let gathered = fetch_quotes(&api, &symbols, &kinds).await;
                    if gathered.is_total_failure() {
                        return Err(ClientError::AllSourcesFailed {
                            attempted: symbols.len(),
                        });
                    }
                    Ok(gathered.into_values())
                }
            });
    }

    fn remount_holdings(&mut self) {
        let (symbols, kinds) = symbol_kinds(
            self.transactions
                .iter()
                .map(|tx| (tx.symbol.as_str(), tx.asset_type)),
        );
        if symbols.is_empty() {
            self.holdings.show(Holdings::default());
            return;
        }

        let api = self.client.clone();
        let symbols = Arc::new(symbols);
        let kinds = Arc::new(kinds);
        let transactions = Arc::new(self.transactions.clone());
        self.holdings
            .mount(Refresh::Every(self.settings.refresh_period), move || {
                let api = api.clone();
                let symbols = symbols.clone();
                let kinds = kinds.clone();
                let transactions = transactions.clone();
                async move {
                    let gathered = fetch_quotes(&api, &symbols, &kinds).await;
                    if gathered.is_total_failure() {
                        return Err(ClientError::AllSourcesFailed {
                            attempted: symbols.len(),
                        });
                    }
                    let quotes = gathered.into_values();
                    let totals = valuation(&transactions, &quotes);
                    debug!(
                        "valuation: cost {:.2}, value {:.2}",
                        totals.cost, totals.value
                    );
                    Ok(Holdings { quotes, totals })
                }
            });
    }

    fn remount_news(&mut self) {
        let followed: Vec<String> = self.followed.iter().map(|a| a.symbol.clone()).collect();
        let invested: Vec<String> = self.transactions.iter().map(|t| t.symbol.clone()).collect();
        if followed.is_empty() && invested.is_empty() {
            self.related_news.show(Vec::new());
            return;
        }

        let api = self.client.clone();
        let per_symbol = self.settings.per_symbol_news_limit;
        let followed = Arc::new(followed);
        let invested = Arc::new(invested);
        self.related_news.mount(Refresh::Once, move || {
            let api = api.clone();
            let followed = followed.clone();
            let invested = invested.clone();
            async move {
                let api = &api;
                let merged = merge_related_news(&followed, &invested, move |symbol: String| async move {
                    api.related_news(&symbol, per_symbol).await
                })
                .await;
                Ok(merged)
            }
        });
    }

    pub async fn follow(&mut self, item: NewFollow) -> Result<FollowedAsset> {
        let followed = self.client.follow(&item).await?;
        self.followed.push(followed.clone());
        self.remount_followed();
        self.remount_news();
        Ok(followed)
    }

    pub async fn unfollow(&mut self, id: &str) -> Result<()> {
        self.client.unfollow(id).await?;
        self.followed.retain(|asset| asset.id != id);
        self.remount_followed();
        self.remount_news();
        Ok(())
    }

    pub async fn add_transaction(&mut self, record: NewTransaction) -> Result<Transaction> {
        let tx = self.client.add_investment(&record).await?;
        self.transactions.push(tx.clone());
        self.remount_holdings();
        self.remount_news();
        Ok(tx)
    }

    pub async fn delete_transaction(&mut self, id: &str) -> Result<()> {
        self.client.delete_investment(id).await?;
        self.transactions.retain(|tx| tx.id != id);
        self.remount_holdings();
        self.remount_news();
        Ok(())
    }

    pub fn unmount(&mut self) {
        self.followed_quotes.unmount();
        self.holdings.unmount();
        self.related_news.unmount();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Follow,
    Invest,
}

/// Transaction fields being edited before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub quantity: f64,
    pub price_per_unit: f64,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub notes: String,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self {
            quantity: 1.0,
            price_per_unit: 0.0,
            transaction_type: TransactionType::Buy,
            transaction_date: Utc::now().date_naive(),
            notes: String::new(),
        }
    }
}

/// Search box plus the follow / record-transaction form fed by it.
#[derive(Debug, Clone)]
pub struct AssetSearch {
    pub mode: SearchMode,
    pub asset_type: AssetType,
    pub results: Vec<Quote>,
    pub selected: Option<Quote>,
    pub draft: TransactionDraft,
    limit: usize,
}

impl AssetSearch {
    pub fn new(mode: SearchMode, asset_type: AssetType, settings: &ClientSettings) -> Self {
        Self {
            mode,
            asset_type,
            limit: settings.search_limit,
            results: Vec::new(),
            selected: None,
            draft: TransactionDraft::default(),
        }
    }

    /// Blank queries are ignored without a request.
    pub async fn search(&mut self, api: &ApiClient, query: &str) -> Result<&[Quote]> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(&self.results);
        }
        self.results = api.search(self.asset_type, query, self.limit).await?;
        self.selected = None;
        Ok(&self.results)
    }

    /// Picks a result; when recording a transaction its price pre-fills the form.
    pub fn select(&mut self, symbol: &str) -> Option<&Quote> {
        let quote = self.results.iter().find(|q| q.symbol == symbol)?.clone();
        if self.mode == SearchMode::Invest && quote.price > 0.0 {
            self.draft.price_per_unit = quote.price;
        }
        self.selected = Some(quote);
        self.selected.as_ref()
    }

    pub fn follow_request(&self) -> Option<NewFollow> {
        self.selected.as_ref().map(|quote| NewFollow {
            symbol: quote.symbol.clone(),
            asset_type: self.asset_type,
            name: (!quote.name.is_empty()).then(|| quote.name.clone()),
            notes: None,
        })
    }

    pub fn transaction_request(&self) -> Result<NewTransaction> {
        let quote = self
            .selected
            .as_ref()
            .ok_or_else(|| ClientError::Validation("select an asset first".into()))?;
        let date = self
            .draft
            .transaction_date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ClientError::Validation("invalid transaction date".into()))?;
        let notes = self.draft.notes.trim();
        let record = NewTransaction {
            symbol: quote.symbol.clone(),
            asset_type: self.asset_type,
            quantity: self.draft.quantity,
            price_per_unit: self.draft.price_per_unit,
            transaction_date: date,
            transaction_type: self.draft.transaction_type,
            fees: None,
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        };
        record.validate()?;
        Ok(record)
    }

    pub fn reset(&mut self) {
        self.results.clear();
        self.selected = None;
        self.draft = TransactionDraft::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::quote;
    use crate::session::Session;

    fn search_with_results(mode: SearchMode) -> AssetSearch {
        let mut search = AssetSearch::new(mode, AssetType::Stock, &ClientSettings::default());
        search.results = vec![quote("AAPL", 189.5), quote("MSFT", 410.0)];
        search
    }

    #[test]
    fn selecting_in_invest_mode_prefills_price() {
        let mut search = search_with_results(SearchMode::Invest);
        assert!(search.select("MSFT").is_some());
        assert_eq!(search.draft.price_per_unit, 410.0);

        let record = search.transaction_request().unwrap();
        assert_eq!(record.symbol, "MSFT");
        assert_eq!(record.quantity, 1.0);
        assert_eq!(record.transaction_type, TransactionType::Buy);
        assert!(record.notes.is_none());
    }

    #[test]
    fn selecting_in_follow_mode_leaves_draft_alone() {
        let mut search = search_with_results(SearchMode::Follow);
        search.select("AAPL");
        assert_eq!(search.draft.price_per_unit, 0.0);

        let follow = search.follow_request().unwrap();
        assert_eq!(follow.symbol, "AAPL");
        assert_eq!(follow.name.as_deref(), Some("AAPL"));
        assert!(search.select("NOPE").is_none());
    }

    #[test]
    fn transaction_needs_a_selection_and_positive_amounts() {
        let mut search = search_with_results(SearchMode::Invest);
        assert!(matches!(
            search.transaction_request(),
            Err(ClientError::Validation(_))
        ));

        search.select("AAPL");
        search.draft.quantity = 0.0;
        assert!(search.transaction_request().is_err());

        search.reset();
        assert!(search.selected.is_none());
        assert!(search.results.is_empty());
        assert_eq!(search.draft.quantity, 1.0);
    }

    #[tokio::test]
    async fn blank_query_sends_nothing() {
        // Nothing listens here; a request would fail.
        let api = ApiClient::new("http://127.0.0.1:9", Session::new()).unwrap();
        let mut search = search_with_results(SearchMode::Follow);
        let results = search.search(&api, "   ").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_limit_comes_from_settings() {
        let settings = ClientSettings {
            search_limit: 3,
            ..ClientSettings::default()
        };
        let search = AssetSearch::new(SearchMode::Follow, AssetType::Crypto, &settings);
        assert_eq!(search.limit, 3);
    }

    #[test]
    fn symbol_kinds_keeps_first_occurrence_order() {
        let (symbols, kinds) = symbol_kinds(
            [
                ("BTC", AssetType::Crypto),
                ("AAPL", AssetType::Stock),
                ("BTC", AssetType::Crypto),
            ]
            .into_iter(),
        );
        assert_eq!(symbols, vec!["BTC".to_string(), "AAPL".to_string()]);
        assert_eq!(kinds["BTC"], AssetType::Crypto);
    }
}
