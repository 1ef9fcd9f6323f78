// Client-side session: token, identity, and the background refresh task

use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::api::{ApiClient, ClientError, Result};
use crate::config::SessionConfig;

/// Handle to a running refresh task
struct RefreshTaskHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl RefreshTaskHandle {
    /// Signal the task and wait for it to exit
    async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }

    /// Signal the task without waiting. Used from inside the task itself.
    fn stop(self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// `refresh_task` is Some exactly when `token` is Some
#[derive(Default)]
struct SessionState {
    token: Option<String>,
    current_user: Option<String>,
    refresh_task: Option<RefreshTaskHandle>,
    /// Bumped on every login and logout so late refresh results can be discarded
    generation: u64,
}

struct Inner {
    api: ApiClient,
    config: SessionConfig,
    state: RwLock<SessionState>,
    /// Serializes refresh calls
    refresh_lock: Mutex<()>,
}

/// Session manager
/// Holds the auth token for one user and keeps it fresh in the background
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let api = ApiClient::new(&config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                api,
                config,
                state: RwLock::new(SessionState::default()),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Exchange credentials for a token and start the refresh task
    ///
    /// On failure the session is left exactly as it was. Logging in over an
    /// existing session replaces it and stops its refresh task.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<String> {
        let token = self.inner.api.login(user_name, password).await?;

        let previous = {
            let mut state = self.inner.state.write().await;
            state.generation += 1;
            let previous = state.refresh_task.take();
            state.token = Some(token.clone());
            state.current_user = Some(user_name.to_string());
            state.refresh_task = Some(self.spawn_refresh_task(state.generation));
            previous
        };

        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        tracing::info!("Logged in as {} (token {}...)", user_name, token_prefix(&token));
        Ok(token)
    }

    /// Exchange the current token for a fresh one
    ///
    /// Fails with `NotLoggedIn` when there is no session. A failed refresh
    /// leaves the current token in place.
    pub async fn refresh(&self) -> Result<String> {
        let generation = self.inner.state.read().await.generation;
        self.refresh_session(generation).await
    }

    /// Clear the token and user and stop the refresh task
    ///
    /// Once this returns no further refresh request will be sent.
    pub async fn logout(&self) {
        if let Some(task) = self.end_session(None).await {
            task.shutdown().await;
            tracing::info!("Logged out");
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.state.read().await.token.clone()
    }

    pub async fn current_user(&self) -> Option<String> {
        self.inner.state.read().await.current_user.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.state.read().await.token.is_some()
    }

    pub async fn has_refresh_task(&self) -> bool {
        self.inner.state.read().await.refresh_task.is_some()
    }

    /// Refresh the session identified by `generation`
    async fn refresh_session(&self, generation: u64) -> Result<String> {
        let _guard = self.inner.refresh_lock.lock().await;

        let token = {
            let state = self.inner.state.read().await;
            match &state.token {
                Some(token) if state.generation == generation => token.clone(),
                _ => return Err(ClientError::NotLoggedIn),
            }
        };

        let fresh = self.inner.api.refresh(&token).await?;

        let mut state = self.inner.state.write().await;
        if state.generation != generation || state.token.is_none() {
            tracing::debug!("Discarding refresh result for an ended session");
            return Err(ClientError::NotLoggedIn);
        }
        state.token = Some(fresh.clone());

        tracing::debug!("Token refreshed ({}...)", token_prefix(&fresh));
        Ok(fresh)
    }

    /// Reset the session, returning the refresh task for the caller to stop.
    /// With `Some(generation)` only that session is ended.
    async fn end_session(&self, generation: Option<u64>) -> Option<RefreshTaskHandle> {
        let mut state = self.inner.state.write().await;
        if generation.is_some_and(|g| g != state.generation) || state.token.is_none() {
            return None;
        }

        state.generation += 1;
        state.token = None;
        state.current_user = None;
        state.refresh_task.take()
    }

    fn spawn_refresh_task(&self, generation: u64) -> RefreshTaskHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let session = Arc::downgrade(&self.inner);
        let period = self.inner.config.refresh_interval;
        let max_failures = self.inner.config.max_refresh_failures;

        let join_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut failures = 0u32;

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        // Dropping an in-flight refresh cancels its request
                        let keep_running = tokio::select! {
                            biased;

                            _ = shutdown_rx.changed() => false,
                            keep = refresh_tick(&session, generation, max_failures, &mut failures) => keep,
                        };
                        if !keep_running {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Refresh task for session {} stopped", generation);
        });

        RefreshTaskHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

/// One scheduled refresh. Returns false when the task should stop.
async fn refresh_tick(
    session: &Weak<Inner>,
    generation: u64,
    max_failures: u32,
    failures: &mut u32,
) -> bool {
    // Every SessionManager clone is gone
    let Some(inner) = session.upgrade() else {
        return false;
    };
    let manager = SessionManager { inner };

    match manager.refresh_session(generation).await {
        Ok(_) => {
            *failures = 0;
            true
        }
        Err(ClientError::NotLoggedIn) => false,
        Err(e) => {
            *failures += 1;
            tracing::warn!("Scheduled token refresh failed ({}): {}", failures, e);

            if max_failures > 0 && *failures >= max_failures {
                tracing::warn!(
                    "Ending session after {} consecutive refresh failures",
                    failures
                );
                if let Some(task) = manager.end_session(Some(generation)).await {
                    task.stop();
                }
                return false;
            }
            true
        }
    }
}

fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
