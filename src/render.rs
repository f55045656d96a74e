// src/render.rs
//! Plain-text rendering of the pages.
use std::fmt::{self, Write};

use crate::aggregate::{PositionRow, Valuation};
use crate::dashboard::Dashboard;
use crate::models::{FollowedAsset, Headline, Quote, TransactionType};
use crate::news::RelatedArticle;
use crate::portfolio::PortfolioPage;
use crate::view::ViewState;

const PLACEHOLDER: &str = "loading...";

pub fn money(value: f64) -> String {
    format!("${value:.2}")
}

pub fn signed_money(value: f64) -> String {
    if value >= 0.0 {
        format!("+${value:.2}")
    } else {
        format!("-${:.2}", value.abs())
    }
}

pub fn percent(value: f64) -> String {
    format!("{value:+.2}%")
}

/// Polyline points for a sparkline drawn in a `width` x `height` box, y
/// growing downwards. A flat series is drawn along the bottom edge.
pub fn sparkline_points(data: &[f64], width: f64, height: f64) -> Vec<(f64, f64)> {
    if data.is_empty() {
        return Vec::new();
    }
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let range = if max - min == 0.0 { 1.0 } else { max - min };
    let steps = (data.len().saturating_sub(1)).max(1) as f64;

    data.iter()
        .enumerate()
        .map(|(i, value)| {
            let x = i as f64 / steps * width;
            let y = height - (value - min) / range * height;
            (x, y)
        })
        .collect()
}

/// Sparkline as block characters, for terminals.
pub fn sparkline(data: &[f64]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    sparkline_points(data, data.len() as f64, (BARS.len() - 1) as f64)
        .into_iter()
        .map(|(_, y)| BARS[(BARS.len() - 1).saturating_sub(y.round() as usize)])
        .collect()
}

fn section<W, T>(
    out: &mut W,
    title: &str,
    state: &ViewState<T>,
    body: impl FnOnce(&mut W, &T) -> fmt::Result,
) -> fmt::Result
where
    W: Write,
{
    writeln!(out, "== {title}")?;
    match state {
        ViewState::Loading => writeln!(out, "  {PLACEHOLDER}"),
        ViewState::Error(message) => writeln!(out, "  ! {message}"),
        ViewState::Ready(value) => body(out, value),
    }
}

fn quote_lines<W: Write>(out: &mut W, quotes: &[Quote]) -> fmt::Result {
    if quotes.is_empty() {
        writeln!(out, "  no data")?;
    }
    for quote in quotes {
        let cached = if quote.fallback { " (cached)" } else { "" };
        let trend = quote.data.as_deref().map(sparkline).unwrap_or_default();
        writeln!(
            out,
            "  {:<10} {:>12} {:>9} {}{}",
            quote.symbol,
            money(quote.price),
            percent(quote.change_percent),
            trend,
            cached
        )?;
    }
    Ok(())
}

fn headline_lines<W: Write>(out: &mut W, headlines: &[Headline]) -> fmt::Result {
    for headline in headlines {
        writeln!(
            out,
            "  [{:+.2}] {} ({})",
            headline.polarity(),
            headline.title,
            headline.time_ago
        )?;
    }
    Ok(())
}

pub fn followed_lines<W: Write>(out: &mut W, rows: &[(FollowedAsset, Option<Quote>)]) -> fmt::Result {
    if rows.is_empty() {
        writeln!(out, "  nothing followed yet")?;
    }
    for (asset, quote) in rows {
        match quote {
            Some(quote) => writeln!(
                out,
                "  {:<10} {:>12} {:>9}",
                asset.symbol,
                money(quote.price),
                percent(quote.change_percent)
            )?,
            None => writeln!(out, "  {:<10} {:>12}", asset.symbol, PLACEHOLDER)?,
        }
    }
    Ok(())
}

pub fn valuation_line(totals: &Valuation) -> String {
    format!(
        "cost {}  value {}  profit {} ({})",
        money(totals.cost),
        money(totals.value),
        signed_money(totals.profit),
        percent(totals.profit_percent)
    )
}

pub fn position_lines<W: Write>(out: &mut W, rows: &[PositionRow]) -> fmt::Result {
    for row in rows {
        let tx = &row.transaction;
        let side = match tx.transaction_type {
            TransactionType::Buy => "BUY ",
            TransactionType::Sell => "SELL",
        };
        let current = row
            .current_price
            .map(money)
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        writeln!(
            out,
            "  {:<10} {} {:>8} @ {:>10}  now {:>10}  {} ({})  {}",
            tx.symbol,
            side,
            tx.quantity,
            money(tx.price_per_unit),
            current,
            signed_money(row.profit),
            percent(row.profit_percent),
            tx.transaction_date.format("%Y-%m-%d")
        )?;
    }
    Ok(())
}

pub fn related_lines<W: Write>(out: &mut W, articles: &[RelatedArticle]) -> fmt::Result {
    if articles.is_empty() {
        writeln!(out, "  no related news")?;
    }
    for article in articles {
        let date = article
            .published_at()
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let mut tags = vec![article.related_symbol.as_str()];
        if article.is_followed {
            tags.push("followed");
        }
        if article.is_invested {
            tags.push("invested");
        }
        writeln!(
            out,
            "  {} {} [{}] {}",
            date,
            article.item.title,
            tags.join(", "),
            article.item.source
        )?;
    }
    Ok(())
}

/// Text frame of the market overview.
pub struct DashboardFrame<'a>(pub &'a Dashboard);

impl fmt::Display for DashboardFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.0;
        if let Some(profile) = page.profile.state().ready() {
            writeln!(f, "Welcome, {}", profile.username)?;
        }
        section(f, "Market indexes", &page.indexes.state(), |out, q| quote_lines(out, q))?;
        section(f, "Top stocks", &page.stocks.state(), |out, q| quote_lines(out, q))?;
        section(f, "Top cryptos", &page.cryptos.state(), |out, q| quote_lines(out, q))?;
        section(f, "Latest news", &page.headlines.state(), |out, h| headline_lines(out, h))
    }
}

/// Text frame of the investment page.
pub struct PortfolioFrame<'a>(pub &'a PortfolioPage);

impl fmt::Display for PortfolioFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.0;
        writeln!(f, "== Followed")?;
        match page.followed_quotes.state() {
            // Every quote failed: one error line instead of a placeholder per row.
            ViewState::Error(message) if !page.followed().is_empty() => {
                writeln!(f, "  ! {message}")?;
            }
            _ => followed_lines(f, &page.followed_rows())?,
        }

        writeln!(f, "== Investments")?;
        if page.transactions().is_empty() {
            writeln!(f, "  no transactions recorded")?;
        } else {
            match page.holdings.state() {
                ViewState::Error(message) => writeln!(f, "  ! {message}")?,
                ViewState::Ready(holdings) => writeln!(f, "  {}", valuation_line(&holdings.totals))?,
                ViewState::Loading => {}
            }
            position_lines(f, &page.position_rows())?;
        }

        section(f, "Related news", &page.related_news.state(), |out, a| related_lines(out, a))
    }
}

pub fn dashboard(page: &Dashboard) -> String {
    DashboardFrame(page).to_string()
}

pub fn portfolio(page: &PortfolioPage) -> String {
    PortfolioFrame(page).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{quote, transaction};
    use crate::aggregate::position_rows;
    use std::collections::HashMap;

    #[test]
    fn sparkline_scales_into_the_box() {
        let points = sparkline_points(&[1.0, 3.0, 2.0], 60.0, 24.0);
        assert_eq!(points, vec![(0.0, 24.0), (30.0, 0.0), (60.0, 12.0)]);
        assert!(sparkline_points(&[], 60.0, 24.0).is_empty());
    }

    #[test]
    fn flat_or_single_point_series_stays_on_baseline() {
        assert_eq!(sparkline_points(&[5.0, 5.0], 10.0, 4.0), vec![(0.0, 4.0), (10.0, 4.0)]);
        assert_eq!(sparkline_points(&[5.0], 10.0, 4.0), vec![(0.0, 4.0)]);
        assert_eq!(sparkline(&[1.0, 8.0]), "▁█");
    }

    #[test]
    fn money_formatting() {
        assert_eq!(money(3.14159), "$3.14");
        assert_eq!(signed_money(10.0), "+$10.00");
        assert_eq!(signed_money(-2.5), "-$2.50");
        assert_eq!(percent(50.0), "+50.00%");
    }

    #[test]
    fn missing_price_renders_placeholder_not_zero() {
        let rows = position_rows(
            &[transaction("NVDA", TransactionType::Buy, 1.0, 5.0)],
            &HashMap::new(),
        );
        let mut out = String::new();
        position_lines(&mut out, &rows).unwrap();
        assert!(out.contains(PLACEHOLDER));
        assert!(!out.contains("now      $0.00"));
    }

    #[test]
    fn cached_quotes_are_marked() {
        let mut q = quote("^GSPC", 5000.0);
        q.fallback = true;
        let mut out = String::new();
        quote_lines(&mut out, &[q]).unwrap();
        assert!(out.contains("(cached)"));
    }

    #[tokio::test]
    async fn followed_total_failure_shows_one_error_line() {
        use crate::api::ApiClient;
        use crate::error::ClientError;
        use crate::models::AssetType;
        use crate::session::Session;
        use crate::view::tests::settle;
        use crate::view::Refresh;
        use chrono::Utc;

        let api = ApiClient::new("http://127.0.0.1:9", Session::new()).unwrap();
        let followed = ["MSFT", "NVDA"]
            .iter()
            .map(|symbol| FollowedAsset {
                id: format!("f-{symbol}"),
                user_id: "u1".into(),
                symbol: symbol.to_string(),
                asset_type: AssetType::Stock,
                name: None,
                notes: None,
                added_at: Utc::now(),
            })
            .collect();
        let mut page = PortfolioPage::unmounted(&api, followed, Vec::new());
        page.related_news.show(Vec::new());
        page.followed_quotes.mount(Refresh::Once, || async {
            Err(ClientError::AllSourcesFailed { attempted: 2 })
        });
        settle().await;

        let frame = portfolio(&page);
        assert!(frame.contains("== Followed\n  ! failed to load followed quotes\n"));
        assert!(!frame.contains("MSFT"));
        assert!(!frame.contains(PLACEHOLDER));
    }
}
