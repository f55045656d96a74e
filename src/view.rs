// src/view.rs
//! Mount-scoped view state.
//!
//! A [`Panel`] owns one piece of displayed data and the task that loads it.
//! The task lives exactly as long as the mount: unmounting flips the mount
//! flag and aborts the task, and a load that completes after that point is
//! thrown away instead of being written.
use log::{debug, error};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::Result;

/// Default period for views that show live prices.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Error(String),
    Ready(T),
}

impl<T> ViewState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Once,
    Every(Duration),
}

pub struct Panel<T> {
    label: &'static str,
    state: Arc<watch::Sender<ViewState<T>>>,
    mounted: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl<T> Panel<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `label` names the data in logs and in the error text ("failed to load {label}").
    pub fn new(label: &'static str) -> Self {
        let (tx, _rx) = watch::channel(ViewState::Loading);
        Self {
            label,
            state: Arc::new(tx),
            mounted: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn state(&self) -> ViewState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.state.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Starts loading. Mounting again replaces the previous task, whose
    /// pending result is discarded.
    pub fn mount<F, Fut>(&mut self, refresh: Refresh, mut load: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.unmount();

        let mounted = Arc::new(AtomicBool::new(true));
        self.mounted = mounted.clone();
        let state = self.state.clone();
        let label = self.label;

        self.task = Some(tokio::spawn(async move {
            match refresh {
                Refresh::Once => apply(label, &state, &mounted, load().await),
                Refresh::Every(period) => {
                    let mut ticker = time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        if !mounted.load(Ordering::Acquire) {
                            break;
                        }
                        debug!("refreshing {}", label);
                        apply(label, &state, &mounted, load().await);
                    }
                }
            }
        }));
    }

    /// Stops any refresh and shows `value`, e.g. when there is nothing left to look up.
    pub fn show(&mut self, value: T) {
        self.unmount();
        self.state.send_replace(ViewState::Ready(value));
    }

    pub fn unmount(&mut self) {
        self.mounted.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for Panel<T> {
    fn drop(&mut self) {
        self.mounted.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn apply<T>(
    label: &str,
    state: &watch::Sender<ViewState<T>>,
    mounted: &AtomicBool,
    outcome: Result<T>,
) {
    if !mounted.load(Ordering::Acquire) {
        debug!("discarding {} result after unmount", label);
        return;
    }
    let next = match outcome {
        Ok(value) => ViewState::Ready(value),
        Err(e) => {
            error!("failed to load {}: {}", label, e);
            ViewState::Error(format!("failed to load {label}"))
        }
    };
    state.send_replace(next);
}
