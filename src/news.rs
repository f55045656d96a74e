// src/news.rs
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::future::Future;

use crate::aggregate::gather;
use crate::error::Result;
use crate::models::NewsItem;

/// Most articles kept after a merge.
pub const RELATED_NEWS_CAP: usize = 10;

/// Articles requested per symbol.
pub const PER_SYMBOL_LIMIT: usize = 5;

/// An article annotated with the portfolio list(s) that brought it in.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedArticle {
    pub item: NewsItem,
    pub related_symbol: String,
    pub is_followed: bool,
    pub is_invested: bool,
}

impl RelatedArticle {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.item.published_at
    }
}

/// Union of both lists with duplicates removed, followed symbols first.
pub fn query_symbols(followed: &[String], invested: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    followed
        .iter()
        .chain(invested)
        .filter(|symbol| seen.insert(symbol.as_str()))
        .cloned()
        .collect()
}

/// Fetches news for every distinct symbol and merges it.
///
/// A symbol whose fetch fails contributes nothing. The merged list is unique
/// by title (first occurrence in query order wins), newest first with ties
/// kept in arrival order, and at most [`RELATED_NEWS_CAP`] long.
pub async fn merge_related_news<F, Fut>(
    followed: &[String],
    invested: &[String],
    fetch: F,
) -> Vec<RelatedArticle>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<NewsItem>>>,
{
    let symbols = query_symbols(followed, invested);
    if symbols.is_empty() {
        return Vec::new();
    }
    let mut per_symbol = gather(&symbols, fetch).await.into_values();

    let followed: HashSet<&str> = followed.iter().map(String::as_str).collect();
    let invested: HashSet<&str> = invested.iter().map(String::as_str).collect();

    let articles = symbols.iter().flat_map(|symbol| {
        let is_followed = followed.contains(symbol.as_str());
        let is_invested = invested.contains(symbol.as_str());
        per_symbol
            .remove(symbol)
            .unwrap_or_default()
            .into_iter()
            .map(move |item| RelatedArticle {
                item,
                related_symbol: symbol.clone(),
                is_followed,
                is_invested,
            })
    });

    dedup_sort_cap(articles.collect(), RELATED_NEWS_CAP)
}

fn dedup_sort_cap(articles: Vec<RelatedArticle>, cap: usize) -> Vec<RelatedArticle> {
    let mut titles = HashSet::new();
    let mut unique: Vec<RelatedArticle> = articles
        .into_iter()
        .filter(|article| titles.insert(article.item.title.clone()))
        .collect();

    // Stable: equal timestamps keep their order, undated articles go last.
    unique.sort_by_key(|article| Reverse(article.published_at()));
    unique.truncate(cap);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn article(title: &str, hour: Option<u32>) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            description: String::new(),
            url: format!("https://news.example/{}", title.replace(' ', "-")),
            source: "wire".into(),
            published_at: hour.map(|h| Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()),
            thumbnail: None,
            related_symbol: None,
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn run(
        followed: &[String],
        invested: &[String],
        feed: HashMap<&'static str, Vec<NewsItem>>,
    ) -> Vec<RelatedArticle> {
        let feed = &feed;
        merge_related_news(followed, invested, move |symbol: String| async move {
            feed.get(symbol.as_str())
                .cloned()
                .ok_or(ClientError::Validation(format!("no feed for {symbol}")))
        })
        .await
    }

    #[test]
    fn query_set_is_a_deduplicated_union() {
        let q = query_symbols(&symbols(&["AAPL", "TSLA"]), &symbols(&["TSLA", "NVDA", "AAPL"]));
        assert_eq!(q, symbols(&["AAPL", "TSLA", "NVDA"]));
    }

    #[tokio::test]
    async fn duplicate_titles_keep_first_seen_article() {
        let feed = HashMap::from([
            ("AAPL", vec![article("Chip shortage eases", Some(9))]),
            ("TSLA", vec![article("Chip shortage eases", Some(9)), article("EV demand", Some(8))]),
        ]);
        let merged = run(&symbols(&["AAPL"]), &symbols(&["TSLA"]), feed).await;

        let titles: Vec<_> = merged.iter().map(|a| a.item.title.as_str()).collect();
        assert_eq!(titles, vec!["Chip shortage eases", "EV demand"]);
        assert_eq!(merged[0].related_symbol, "AAPL");
        assert!(merged[0].is_followed && !merged[0].is_invested);
        assert!(merged[1].is_invested && !merged[1].is_followed);
    }

    #[tokio::test]
    async fn merged_list_is_newest_first_and_capped() {
        let many: Vec<NewsItem> = (0..8).map(|h| article(&format!("a{h}"), Some(h))).collect();
        let more: Vec<NewsItem> = (8..14).map(|h| article(&format!("b{h}"), Some(h))).collect();
        let feed = HashMap::from([("AAPL", many), ("MSFT", more)]);
        let merged = run(&symbols(&["AAPL"]), &symbols(&["MSFT"]), feed).await;

        assert_eq!(merged.len(), RELATED_NEWS_CAP);
        assert_eq!(merged[0].item.title, "b13");
        for pair in merged.windows(2) {
            assert!(pair[0].published_at() >= pair[1].published_at());
        }
    }

    #[tokio::test]
    async fn ties_keep_arrival_order_and_undated_sort_last() {
        let feed = HashMap::from([
            ("AAPL", vec![article("undated", None), article("first", Some(10))]),
            ("MSFT", vec![article("second", Some(10)), article("older", Some(7))]),
        ]);
        let merged = run(&symbols(&["AAPL", "MSFT"]), &[], feed).await;
        let titles: Vec<_> = merged.iter().map(|a| a.item.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "older", "undated"]);
    }

    #[tokio::test]
    async fn failing_symbol_does_not_block_others() {
        let feed = HashMap::from([("AAPL", vec![article("Earnings beat", Some(12))])]);
        let merged = run(&symbols(&["AAPL", "GONE"]), &symbols(&["AAPL"]), feed).await;
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_followed && merged[0].is_invested);
    }

    #[tokio::test]
    async fn no_symbols_means_no_requests() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let counter = &calls;
        let merged = merge_related_news(&[], &[], move |_symbol: String| async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        })
        .await;
        assert!(merged.is_empty());
        assert_eq!(calls.into_inner(), 0);
    }
}
