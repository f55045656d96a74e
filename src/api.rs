// src/api.rs
use crate::auth::{LoginForm, RegistrationForm};
use crate::error::{ClientError, Result};
use crate::models::{
    Ack, AssetType, FollowedAsset, Headline, InvestmentFilter, NewFollow, NewTransaction,
    NewsItem, Quote, TokenResponse, Transaction, UserProfile,
};
use crate::session::Session;
use log::{debug, error, info, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Error body produced by the backend, `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Typed access to the backend. Every request carries the current session
/// token; a 401 clears it before the error is returned.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Result<Self> {
        Self::with_http_client(Client::new(), base_url, session)
    }

    pub fn with_http_client(http: Client, base_url: &str, session: Session) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http,
            base,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(path)?;
        let builder = self.http.request(method, url);
        Ok(match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?;

        if status == StatusCode::UNAUTHORIZED {
            warn!("{} rejected the session, clearing token", url.path());
            self.session.clear();
            return Err(ClientError::Unauthorized {
                detail: error_detail(&body),
            });
        }
        if !status.is_success() {
            debug!("{} answered HTTP {}", url.path(), status);
            return Err(ClientError::Status {
                status,
                detail: error_detail(&body),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path)?.query(query))
            .await
    }

    // ---------------------------------------------------------------- auth

    /// Exchanges credentials for a token and stores it in the session.
    pub async fn login(&self, form: &LoginForm) -> Result<()> {
        form.validate()?;
        let params = [
            ("username", form.username.trim()),
            ("password", form.password.as_str()),
        ];
        let request = self.request(Method::POST, "auth/login")?.form(&params);
        match self.send::<TokenResponse>(request).await {
            Ok(token) => {
                self.session.set_token(token.access_token);
                info!("Signed in as {}.", form.username.trim());
                Ok(())
            }
            Err(e) => {
                error!("Failed to sign in: {}", e);
                Err(e)
            }
        }
    }

    /// Validates the form locally, then creates the account.
    pub async fn register(&self, form: &RegistrationForm) -> Result<Ack> {
        form.validate()?;
        let request = self
            .request(Method::POST, "auth/register")?
            .json(&form.to_request());
        match self.send::<Ack>(request).await {
            Ok(ack) => {
                info!("Registered {}.", form.username.trim());
                Ok(ack)
            }
            Err(e) => {
                error!("Failed to register: {}", e);
                Err(e)
            }
        }
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("Signed out.");
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        self.get("auth/me").await
    }

    // ----------------------------------------------------------- market data

    pub async fn top_stocks(&self, limit: usize) -> Result<Vec<Quote>> {
        self.get_with("stocks/top", &[("limit", limit)]).await
    }

    pub async fn top_cryptos(&self, limit: usize) -> Result<Vec<Quote>> {
        self.get_with("cryptos/top", &[("limit", limit)]).await
    }

    pub async fn market_indexes(&self) -> Result<Vec<Quote>> {
        self.get("market/indexes").await
    }

    pub async fn latest_news(&self, limit: usize) -> Result<Vec<Headline>> {
        self.get_with("news/latest", &[("limit", limit)]).await
    }

    pub async fn related_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        self.get_with(
            "news/related",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn portfolio_news(&self, symbols: &[String], limit: usize) -> Result<Vec<NewsItem>> {
        self.get_with(
            "news/portfolio",
            &[("symbols", symbols.join(",")), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn search(&self, asset_type: AssetType, query: &str, limit: usize) -> Result<Vec<Quote>> {
        let path = match asset_type {
            AssetType::Stock => "stocks/search",
            AssetType::Crypto => "cryptos/search",
        };
        self.get_with(
            path,
            &[("query", query.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn details(&self, asset_type: AssetType, symbol: &str) -> Result<Quote> {
        let path = match asset_type {
            AssetType::Stock => "stocks/details",
            AssetType::Crypto => "cryptos/details",
        };
        self.get_with(path, &[("symbol", symbol)]).await
    }

    // ------------------------------------------------------------ portfolio

    pub async fn followed(&self, asset_type: Option<AssetType>) -> Result<Vec<FollowedAsset>> {
        match asset_type {
            Some(asset_type) => {
                self.get_with("portfolio/followed", &[("asset_type", asset_type)])
                    .await
            }
            None => self.get("portfolio/followed").await,
        }
    }

    pub async fn follow(&self, item: &NewFollow) -> Result<FollowedAsset> {
        let request = self.request(Method::POST, "portfolio/followed")?.json(item);
        match self.send::<FollowedAsset>(request).await {
            Ok(followed) => {
                info!("Now following {}.", followed.symbol);
                Ok(followed)
            }
            Err(e) => {
                error!("Failed to follow {}: {}", item.symbol, e);
                Err(e)
            }
        }
    }

    pub async fn unfollow(&self, id: &str) -> Result<Ack> {
        let path = format!("portfolio/followed/{id}");
        match self.send::<Ack>(self.request(Method::DELETE, &path)?).await {
            Ok(ack) => {
                info!("Unfollowed {}.", id);
                Ok(ack)
            }
            Err(e) => {
                error!("Failed to unfollow {}: {}", id, e);
                Err(e)
            }
        }
    }

    pub async fn investments(&self, filter: &InvestmentFilter) -> Result<Vec<Transaction>> {
        self.get_with("portfolio/investments", filter).await
    }

    /// Rejects non-positive quantities or prices before anything is sent.
    pub async fn add_investment(&self, record: &NewTransaction) -> Result<Transaction> {
        record.validate()?;
        let request = self
            .request(Method::POST, "portfolio/investments")?
            .json(record);
        match self.send::<Transaction>(request).await {
            Ok(tx) => {
                info!(
                    "Recorded {} {} {} @ {}.",
                    tx.transaction_type, tx.quantity, tx.symbol, tx.price_per_unit
                );
                Ok(tx)
            }
            Err(e) => {
                error!("Failed to record transaction for {}: {}", record.symbol, e);
                Err(e)
            }
        }
    }

    pub async fn delete_investment(&self, id: &str) -> Result<Ack> {
        let path = format!("portfolio/investments/{id}");
        match self.send::<Ack>(self.request(Method::DELETE, &path)?).await {
            Ok(ack) => {
                info!("Deleted transaction {}.", id);
                Ok(ack)
            }
            Err(e) => {
                error!("Failed to delete transaction {}: {}", id, e);
                Err(e)
            }
        }
    }
}
