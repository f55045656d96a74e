// src/config.rs
use clap::Parser;
use log::LevelFilter;
use std::time::Duration;

use crate::auth::Route;
use crate::news::PER_SYMBOL_LIMIT;
use crate::view::REFRESH_PERIOD;

/// Terminal client for the portfolio tracker backend.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Base URL of the backend API.
    #[arg(long, env = "PORTFOLIO_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Account identifier used to sign in (the registered e-mail).
    #[arg(long, env = "PORTFOLIO_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Existing session token; skips the sign-in step.
    #[arg(long, env = "PORTFOLIO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Page to open, e.g. `/alice/investment`. Defaults to the signed-in user's dashboard.
    #[arg(long, env = "PORTFOLIO_ROUTE")]
    pub route: Option<String>,

    /// Seconds between live price refreshes.
    #[arg(long, env = "PORTFOLIO_REFRESH_SECS", default_value_t = REFRESH_PERIOD.as_secs())]
    pub refresh_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub top_limit: usize,

    #[arg(long, default_value_t = 10)]
    pub news_limit: usize,

    #[arg(long, env = "PORTFOLIO_LOG_LEVEL", default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

impl Config {
    pub fn settings(&self) -> ClientSettings {
        ClientSettings {
            refresh_period: Duration::from_secs(self.refresh_secs.max(1)),
            top_limit: self.top_limit,
            news_limit: self.news_limit,
            ..ClientSettings::default()
        }
    }

    pub fn start_route(&self) -> Option<Route> {
        self.route.as_deref().map(Route::parse)
    }
}

/// Tunables handed to the views.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub refresh_period: Duration,
    pub top_limit: usize,
    pub news_limit: usize,
    pub search_limit: usize,
    pub per_symbol_news_limit: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            refresh_period: REFRESH_PERIOD,
            top_limit: 5,
            news_limit: 10,
            search_limit: 10,
            per_symbol_news_limit: PER_SYMBOL_LIMIT,
        }
    }
}
