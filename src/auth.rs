// src/auth.rs
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

use crate::error::{ClientError, Result};
use crate::models::{RegisterRequest, UserProfile};
use crate::session::Session;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (self.exp as i64) <= now.timestamp()
    }
}

// Reads the claims without checking the signature; the backend stays the
// authority on whether the token is valid.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let data = jsonwebtoken::dangerous_insecure_decode::<Claims>(token)?;
    Ok(data.claims)
}

/// Client-side routes. Everything except the entry page is scoped to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Entry,
    Dashboard(String),
    Investment(String),
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [user, "dashboard"] => Route::Dashboard((*user).to_string()),
            [user, "investment"] => Route::Investment((*user).to_string()),
            _ => Route::Entry,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Route::Entry => None,
            Route::Dashboard(user) | Route::Investment(user) => Some(user),
        }
    }

    pub fn home(username: &str) -> Route {
        Route::Dashboard(username.to_string())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Entry => write!(f, "/"),
            Route::Dashboard(user) => write!(f, "/{user}/dashboard"),
            Route::Investment(user) => write!(f, "/{user}/investment"),
        }
    }
}

/// What a user-scoped page shows while and after its session check runs.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    Resolving,
    Render(UserProfile),
    Redirect(Route),
}

/// Gate run once when a user-scoped page mounts.
///
/// `lookup` resolves the identity behind the current token, normally
/// `GET /auth/me`. A token whose `exp` claim has already passed is dropped
/// without asking the backend.
pub async fn check_session<F, Fut>(
    session: &Session,
    route: &Route,
    now: DateTime<Utc>,
    lookup: F,
) -> GuardState
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<UserProfile>>,
{
    let Some(token) = session.token() else {
        return GuardState::Redirect(Route::Entry);
    };

    if let Ok(claims) = decode_claims(&token) {
        if claims.is_expired(now) {
            warn!("session token for {} expired, signing out", claims.sub);
            session.clear();
            return GuardState::Redirect(Route::Entry);
        }
    }

    let profile = match lookup().await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("failed to verify session: {}", e);
            session.clear();
            return GuardState::Redirect(Route::Entry);
        }
    };

    match route.owner() {
        Some(owner) if owner == profile.username => GuardState::Render(profile),
        _ => {
            let target = Route::home(&profile.username);
            info!("redirecting {} to {}", route, target);
            GuardState::Redirect(target)
        }
    }
}

/// Sign-in form. `username` carries whatever identifier the backend's
/// OAuth2 password form expects (the account e-mail).
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ClientError::Validation(
                "username and password are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty()
            || self.username.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(ClientError::Validation("all fields are required".into()));
        }
        if !self.email.contains('@') {
            return Err(ClientError::Validation("invalid e-mail address".into()));
        }
        if self.password != self.confirm_password {
            return Err(ClientError::Validation("passwords do not match".into()));
        }
        Ok(())
    }

    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            email: self.email.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        }
    }
}
