// src/main.rs
use chrono::Utc;
use clap::Parser;
use env_logger::Builder;
use log::{error, info, warn};
use portfolio_client::auth::{check_session, GuardState, LoginForm, Route};
use portfolio_client::config::{ClientSettings, Config};
use portfolio_client::dashboard::Dashboard;
use portfolio_client::models::UserProfile;
use portfolio_client::portfolio::PortfolioPage;
use portfolio_client::{render, ApiClient, Session};
use tokio::time::{self, Duration};

// Guard redirects are followed at most this many times.
const MAX_REDIRECTS: usize = 3;

enum Page {
    Dashboard(Dashboard),
    Portfolio(PortfolioPage),
}

impl Page {
    async fn open(
        client: &ApiClient,
        route: &Route,
        settings: &ClientSettings,
    ) -> portfolio_client::Result<Page> {
        match route {
            Route::Investment(_) => Ok(Page::Portfolio(PortfolioPage::load(client, settings).await?)),
            _ => Ok(Page::Dashboard(Dashboard::mount(client, settings))),
        }
    }

    fn render(&self) -> String {
        match self {
            Page::Dashboard(page) => render::dashboard(page),
            Page::Portfolio(page) => render::portfolio(page),
        }
    }

    fn unmount(&mut self) {
        match self {
            Page::Dashboard(page) => page.unmount(),
            Page::Portfolio(page) => page.unmount(),
        }
    }
}

async fn resolve_route(client: &ApiClient, start: Route) -> Option<(Route, UserProfile)> {
    let mut route = start;
    for _ in 0..MAX_REDIRECTS {
        match check_session(client.session(), &route, Utc::now(), || client.current_user()).await {
            GuardState::Render(profile) => return Some((route, profile)),
            GuardState::Redirect(Route::Entry) | GuardState::Resolving => return None,
            GuardState::Redirect(next) => route = next,
        }
    }
    None
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = Config::parse();
    Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .parse_default_env()
        .init();

    let session = match &config.token {
        Some(token) => Session::with_token(token.clone()),
        None => Session::new(),
    };
    let client = match ApiClient::new(&config.api_url, session.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid API URL {}: {}", config.api_url, e);
            return;
        }
    };
    info!("Starting the portfolio client against {}...", config.api_url);

    if let (None, Some(username), Some(password)) = (&config.token, &config.username, &config.password) {
        let form = LoginForm {
            username: username.clone(),
            password: password.clone(),
        };
        if let Err(e) = client.login(&form).await {
            error!("Sign-in failed: {}", e.user_message());
            return;
        }
    }

    let start = config.start_route().unwrap_or(Route::Entry);
    let Some((route, profile)) = resolve_route(&client, start).await else {
        error!("Not signed in. Pass --token or --username/--password.");
        return;
    };
    info!("Opening {} for {}", route, profile.username);

    let settings = config.settings();
    let mut page = match Page::open(&client, &route, &settings).await {
        Ok(page) => page,
        Err(e) => {
            error!("Failed to load {}: {}", route, e);
            return;
        }
    };

    let mut invalidated = session.subscribe();
    let mut ticker = time::interval(Duration::from_secs(1));
    let mut last_frame = String::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received. Shutting down...");
                break;
            }
            changed = invalidated.changed() => {
                if changed.is_err() || invalidated.borrow().is_none() {
                    warn!("Session ended, returning to the entry page.");
                    break;
                }
            }
            _ = ticker.tick() => {
                let frame = page.render();
                if frame != last_frame {
                    println!("{frame}");
                    last_frame = frame;
                }
            }
        }
    }
    page.unmount();
}
