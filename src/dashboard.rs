// src/dashboard.rs
use log::info;

use crate::api::ApiClient;
use crate::config::ClientSettings;
use crate::models::{Headline, Quote, UserProfile};
use crate::view::{Panel, Refresh};

/// Market overview page. Every panel loads once per mount and fails on its own.
pub struct Dashboard {
    pub profile: Panel<UserProfile>,
    pub indexes: Panel<Vec<Quote>>,
    pub stocks: Panel<Vec<Quote>>,
    pub cryptos: Panel<Vec<Quote>>,
    pub headlines: Panel<Vec<Headline>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            profile: Panel::new("profile"),
            indexes: Panel::new("market indexes"),
            stocks: Panel::new("top stocks"),
            cryptos: Panel::new("top cryptos"),
            headlines: Panel::new("latest news"),
        }
    }

    pub fn mount(client: &ApiClient, settings: &ClientSettings) -> Self {
        let mut dashboard = Self::new();
        let top_limit = settings.top_limit;
        let news_limit = settings.news_limit;

        let api = client.clone();
        dashboard.profile.mount(Refresh::Once, move || {
            let api = api.clone();
            async move { api.current_user().await }
        });

        let api = client.clone();
        dashboard.indexes.mount(Refresh::Once, move || {
            let api = api.clone();
            async move { api.market_indexes().await }
        });

        let api = client.clone();
        dashboard.stocks.mount(Refresh::Once, move || {
            let api = api.clone();
            async move { api.top_stocks(top_limit).await }
        });

        let api = client.clone();
        dashboard.cryptos.mount(Refresh::Once, move || {
            let api = api.clone();
            async move { api.top_cryptos(top_limit).await }
        });

        let api = client.clone();
        dashboard.headlines.mount(Refresh::Once, move || {
            let api = api.clone();
            async move { api.latest_news(news_limit).await }
        });

        info!("dashboard mounted");
        dashboard
    }

    pub fn unmount(&mut self) {
        self.profile.unmount();
        self.indexes.unmount();
        self.stocks.unmount();
        self.cryptos.unmount();
        self.headlines.unmount();
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
