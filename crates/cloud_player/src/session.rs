//! Login state machine.
//!
//! Without a stored cookie the session asks the API for a login token on a
//! coarse timer, shows its id and polls on a fine timer until a user claims
//! it. With a cookie (stored or just earned) it fetches the identity and
//! greets the user. All steps run as timer bodies on the local loop; a
//! failed step is logged and retried by the next tick.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    rc::{Rc, Weak},
    time::Duration,
};

use iokit::{Component, EventBus, PeriodicTimer};
use serde::de::DeserializeOwned;
use shared::{
    domain::ComponentId,
    event::Signal,
    protocol::{Token, User},
};
use tracing::{debug, info, warn};

use crate::{
    cookie::CookieStore,
    error::SessionError,
    transport::{fold_set_cookies, ApiRequest, HttpMethod, HttpTransport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoSession,
    AwaitingToken,
    AwaitingClaim,
    Authenticated,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token_interval: Duration,
    pub claim_interval: Duration,
    pub provider_id: String,
    pub default_title: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_interval: Duration::from_secs(60),
            claim_interval: Duration::from_secs(1),
            provider_id: "cloudplayer".into(),
            default_title: "you".into(),
        }
    }
}

pub struct AuthSession {
    component: Component,
    transport: Rc<dyn HttpTransport>,
    store: Rc<dyn CookieStore>,
    settings: SessionSettings,
    state: Cell<AuthState>,
    cookie: RefCell<Option<String>>,
    cached: Cell<bool>,
    token: RefCell<Option<Token>>,
    login: RefCell<Option<PeriodicTimer>>,
    claim: RefCell<Option<PeriodicTimer>>,
    greeting: RefCell<Option<PeriodicTimer>>,
    closed: Cell<bool>,
}

impl AuthSession {
    pub fn new(
        bus: Rc<EventBus>,
        transport: Rc<dyn HttpTransport>,
        store: Rc<dyn CookieStore>,
        settings: SessionSettings,
    ) -> Rc<Self> {
        Rc::new(Self {
            component: Component::new(bus),
            transport,
            store,
            settings,
            state: Cell::new(AuthState::NoSession),
            cookie: RefCell::new(None),
            cached: Cell::new(false),
            token: RefCell::new(None),
            login: RefCell::new(None),
            claim: RefCell::new(None),
            greeting: RefCell::new(None),
            closed: Cell::new(false),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie.borrow().clone()
    }

    pub fn token(&self) -> Option<Token> {
        self.token.borrow().clone()
    }

    /// Names of the timers still running.
    pub fn active_timers(&self) -> Vec<&'static str> {
        [&self.login, &self.claim, &self.greeting]
            .into_iter()
            .filter_map(|slot| {
                slot.borrow()
                    .as_ref()
                    .filter(|timer| timer.is_live())
                    .map(PeriodicTimer::name)
            })
            .collect()
    }

    /// Loads the stored cookie and enters the matching flow. Must run inside
    /// a `LocalSet`.
    pub fn start(self: &Rc<Self>) {
        if self.closed.get() || self.state.get() != AuthState::NoSession {
            return;
        }
        match self.store.load() {
            Ok(Some(cookie)) if !cookie.is_empty() => {
                info!("resuming stored session");
                self.cookie.replace(Some(cookie));
                self.cached.set(true);
                self.enter_authenticated();
            }
            Ok(_) => self.start_login(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "stored cookie could not be loaded");
                self.start_login();
            }
        }
    }

    /// Stops every timer. Idempotent.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        stop(&self.login);
        stop(&self.claim);
        stop(&self.greeting);
        debug!(id = %self.id(), "auth session closed");
    }

    fn start_login(self: &Rc<Self>) {
        self.state.set(AuthState::AwaitingToken);
        self.token.replace(None);
        let timer = self.schedule("login", self.settings.token_interval, |session| async move {
            session.create_token().await;
        });
        replace(&self.login, timer);
    }

    fn enter_authenticated(self: &Rc<Self>) {
        self.state.set(AuthState::Authenticated);
        let timer = self.schedule("greeting", self.settings.claim_interval, |session| async move {
            session.greet().await;
        });
        replace(&self.greeting, timer);
    }

    fn schedule<F, Fut>(
        self: &Rc<Self>,
        name: &'static str,
        period: Duration,
        step: F,
    ) -> PeriodicTimer
    where
        F: Fn(Rc<Self>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let weak: Weak<Self> = Rc::downgrade(self);
        let step = Rc::new(step);
        PeriodicTimer::start(name, period, move || {
            let weak = weak.clone();
            let step = Rc::clone(&step);
            async move {
                if let Some(session) = weak.upgrade() {
                    (*step)(session).await;
                }
            }
        })
    }

    async fn create_token(self: Rc<Self>) {
        if !self.accepts(AuthState::AwaitingToken) {
            return;
        }
        let token: Token = match self.fetch(HttpMethod::Post, "/token").await {
            Ok(token) => token,
            Err(err) => {
                warn!(%err, "token creation failed");
                return;
            }
        };
        if !self.accepts(AuthState::AwaitingToken) {
            return;
        }

        info!(token = %token.id, "token created");
        let text = format!("enter\n{}", token.id);
        self.token.replace(Some(token));
        stop(&self.login);
        self.state.set(AuthState::AwaitingClaim);
        let timer = self.schedule("claim", self.settings.claim_interval, |session| async move {
            session.check_token().await;
        });
        replace(&self.claim, timer);
        self.component.publish(Signal::AuthStart(text));
    }

    async fn check_token(self: Rc<Self>) {
        if !self.accepts(AuthState::AwaitingClaim) {
            return;
        }
        let Some(id) = self.token.borrow().as_ref().map(|token| token.id.clone()) else {
            return;
        };
        let token: Token = match self.fetch(HttpMethod::Get, &format!("/token/{id}")).await {
            Ok(token) => token,
            Err(err) => {
                warn!(%err, token = %id, "token check failed");
                return;
            }
        };
        if !self.accepts(AuthState::AwaitingClaim) {
            return;
        }

        let claimed = token.claimed;
        self.token.replace(Some(token));
        if !claimed {
            debug!(token = %id, "token not claimed yet");
            return;
        }
        info!(token = %id, "token claimed");
        stop(&self.claim);
        stop(&self.login);
        self.cached.set(false);
        self.enter_authenticated();
    }

    async fn greet(self: Rc<Self>) {
        if !self.accepts(AuthState::Authenticated) {
            return;
        }
        let result: Result<User, SessionError> = self.fetch(HttpMethod::Get, "/user/me").await;
        if !self.accepts(AuthState::Authenticated) {
            return;
        }

        match result {
            Ok(user) => {
                stop(&self.greeting);
                let title = user
                    .title_for(&self.settings.provider_id)
                    .unwrap_or(self.settings.default_title.as_str())
                    .to_owned();
                info!(%title, "hello");
                self.component
                    .publish(Signal::AuthDone(format!("hello\n{title}")));
            }
            Err(SessionError::Unauthorized) if self.cached.get() => {
                warn!("stored session was rejected, logging in again");
                stop(&self.greeting);
                self.cached.set(false);
                self.cookie.replace(None);
                if let Err(err) = self.store.save("") {
                    warn!(error = %format!("{err:#}"), "stale cookie could not be cleared");
                }
                self.start_login();
            }
            Err(err) => warn!(%err, "identity fetch failed"),
        }
    }

    fn accepts(&self, state: AuthState) -> bool {
        !self.closed.get() && self.state.get() == state
    }

    /// Sends one request with the current cookie. New cookies are folded in
    /// and persisted before the status is looked at.
    async fn fetch<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Result<T, SessionError> {
        let request = ApiRequest {
            method,
            path: path.to_owned(),
            cookie: self.cookie(),
        };
        let response = self
            .transport
            .send(request)
            .await
            .map_err(SessionError::Transport)?;

        if let Some(cookie) = fold_set_cookies(&response.set_cookies) {
            debug!(%method, %path, "session cookie updated");
            self.cookie.replace(Some(cookie.clone()));
            self.store.save(&cookie).map_err(SessionError::Persist)?;
        }
        if let Some(err) = SessionError::from_status(response.status) {
            return Err(err);
        }
        Ok(serde_json::from_slice(&response.body)?)
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn stop(slot: &RefCell<Option<PeriodicTimer>>) {
    if let Some(timer) = slot.borrow_mut().take() {
        timer.stop();
    }
}

fn replace(slot: &RefCell<Option<PeriodicTimer>>, timer: PeriodicTimer) {
    if let Some(previous) = slot.borrow_mut().replace(timer) {
        previous.stop();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
