use crate::channel::Channel;
use crate::models::{RefreshRequest, RefreshedToken, TokenPair};
use crate::operations::Operation;
use crate::store::{CredentialKey, CredentialStore};
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Where front ends should send the user once the session is gone.
pub const LOGIN_ROUTE: &str = "/login";

/// Session lifecycle notifications for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { demo: bool },
    TokenRefreshed,
    LoginRequired { redirect: String },
    LoggedOut,
}

type PendingRefresh = Shared<BoxFuture<'static, bool>>;

/// Owns the persisted credentials and the single in-flight refresh slot.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    channel: Channel,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
    events_tx: UnboundedSender<SessionEvent>,
}

impl SessionManager {
    pub(crate) fn new(
        store: Arc<dyn CredentialStore>,
        channel: Channel,
        events_tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            channel,
            pending: Arc::new(Mutex::new(None)),
            events_tx,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(CredentialKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(CredentialKey::RefreshToken)
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist a fresh login. Any demo marker from an earlier session is dropped.
    pub fn store_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.store
            .set(CredentialKey::AccessToken, &tokens.access_token)?;
        self.store
            .set(CredentialKey::RefreshToken, &tokens.refresh_token)?;
        self.store.remove(CredentialKey::DemoMode)
    }

    /// Seed the placeholder session used by demo mode.
    pub(crate) fn store_demo_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.store_tokens(tokens)?;
        self.store.set(CredentialKey::DemoMode, "true")
    }

    /// Wipe every local credential.
    pub fn purge(&self) {
        if let Err(err) = self.store.clear() {
            warn!(%err, "failed to clear stored credentials");
        }
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        self.events_tx.send(event).ok();
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// Concurrent callers share one network call: the first caller installs the
    /// pending refresh and everyone arriving before it resolves awaits that same
    /// result. Resolves `false` without touching the network when no refresh
    /// token is stored.
    pub async fn refresh(&self) -> bool {
        let pending = {
            let mut slot = self.pending.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let pending = run_refresh(
                        self.store.clone(),
                        self.channel.clone(),
                        self.events_tx.clone(),
                        SlotReset(self.pending.clone()),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }
}

/// Empties the pending slot when the refresh that owns it finishes, panics
/// included.
struct SlotReset(Arc<Mutex<Option<PendingRefresh>>>);

impl Drop for SlotReset {
    fn drop(&mut self) {
        // Release the lock before the taken handle is dropped.
        let finished = self.0.lock().take();
        drop(finished);
    }
}

async fn run_refresh(
    store: Arc<dyn CredentialStore>,
    channel: Channel,
    events_tx: UnboundedSender<SessionEvent>,
    _reset: SlotReset,
) -> bool {
    let Some(refresh_token) = store.get(CredentialKey::RefreshToken) else {
        info!("no refresh token stored, skipping refresh");
        return false;
    };

    let call = match Operation::Refresh(RefreshRequest { refresh_token }).into_call() {
        Ok(call) => call,
        Err(err) => {
            warn!(%err, "failed to build refresh request");
            return false;
        }
    };

    info!("refreshing access token");
    let envelope = match channel.exchange(&call, None).await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "token refresh failed");
            return false;
        }
    };
    if !envelope.is_success() {
        warn!("code" = envelope.code, "token refresh rejected");
        return false;
    }
    let Some(refreshed) = envelope.data_as::<RefreshedToken>() else {
        warn!("token refresh response carried no access token");
        return false;
    };

    if let Err(err) = store.set(CredentialKey::AccessToken, &refreshed.access_token) {
        warn!(%err, "failed to persist refreshed access token");
        return false;
    }
    if let Some(rotated) = refreshed.refresh_token.as_deref() {
        if let Err(err) = store.set(CredentialKey::RefreshToken, rotated) {
            warn!(%err, "failed to persist rotated refresh token");
        }
    }
    info!("access token refreshed");
    events_tx.send(SessionEvent::TokenRefreshed).ok();
    true
}
