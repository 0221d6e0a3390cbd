//! Navigation guard for protected pages.
//!
//! The guard never shows protected content until the session has resolved
//! an identity and, where required, the server has confirmed a membership.
//! Anything it cannot confirm reads as a redirect.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::client::session::SessionContext;
use crate::types::UserId;

pub const LOGIN_PATH: &str = "/login";
pub const MEMBERSHIP_PATH: &str = "/membership";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Login,
    Membership,
}

impl Redirect {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => LOGIN_PATH,
            Self::Membership => MEMBERSHIP_PATH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    CheckingAuth,
    CheckingMembership,
    Render,
    Redirect(Redirect),
}

impl GuardPhase {
    fn is_settled(&self) -> bool {
        matches!(self, Self::Render | Self::Redirect(_))
    }
}

/// What the page should show right now.
#[derive(Debug, PartialEq)]
pub enum GuardView<'a, T> {
    Loading,
    Content(&'a T),
    Redirect(&'static str),
}

/// Inputs a settled phase was computed from.
type GuardKey = (Option<UserId>, bool);

struct GuardInner {
    phase: GuardPhase,
    requires_membership: bool,
    settled_for: Option<GuardKey>,
    generation: u64,
    mounted: bool,
}

pub struct RouteGuard {
    session: Arc<SessionContext>,
    inner: Mutex<GuardInner>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionContext>, requires_membership: bool) -> Self {
        Self {
            session,
            inner: Mutex::new(GuardInner {
                phase: GuardPhase::CheckingAuth,
                requires_membership,
                settled_for: None,
                generation: 0,
                mounted: true,
            }),
        }
    }

    pub fn phase(&self) -> GuardPhase {
        self.lock().phase
    }

    pub fn requires_membership(&self) -> bool {
        self.lock().requires_membership
    }

    /// Change the membership requirement, e.g. when navigating between a
    /// gated and an ungated page. Any in-flight check is abandoned.
    pub fn set_requires_membership(&self, requires_membership: bool) {
        let mut inner = self.lock();
        if inner.requires_membership != requires_membership {
            inner.requires_membership = requires_membership;
            inner.generation += 1;
        }
    }

    /// Tear the guard down. Checks still in flight will not touch it.
    pub fn unmount(&self) {
        let mut inner = self.lock();
        inner.mounted = false;
        inner.generation += 1;
    }

    /// Advance the state machine as far as the current session allows.
    ///
    /// Cheap to call repeatedly: a settled result is reused until the user
    /// or the membership requirement changes.
    pub async fn resolve(&self) -> GuardPhase {
        let session = self.session.state();

        let (key, generation) = {
            let mut inner = self.lock();
            if !inner.mounted {
                return inner.phase;
            }
            if session.loading {
                inner.phase = GuardPhase::CheckingAuth;
                inner.settled_for = None;
                return inner.phase;
            }

            let key: GuardKey = (
                session.user.as_ref().map(|u| u.id.clone()),
                inner.requires_membership,
            );
            if inner.phase.is_settled() && inner.settled_for.as_ref() == Some(&key) {
                return inner.phase;
            }

            match (&key.0, key.1) {
                (None, _) => return inner.settle(GuardPhase::Redirect(Redirect::Login), key),
                (Some(_), false) => return inner.settle(GuardPhase::Render, key),
                (Some(_), true) => {
                    inner.phase = GuardPhase::CheckingMembership;
                    inner.settled_for = None;
                    inner.generation += 1;
                    (key, inner.generation)
                }
            }
        };

        let has_membership = self.session.check_membership().await;

        let mut inner = self.lock();
        if !inner.mounted || inner.generation != generation {
            debug!("Discarding stale membership check");
            return inner.phase;
        }

        let phase = if has_membership {
            GuardPhase::Render
        } else {
            GuardPhase::Redirect(Redirect::Membership)
        };
        inner.settle(phase, key)
    }

    /// Render decision for `content`. Shows a loading state whenever the
    /// settled phase no longer matches the session.
    pub fn view<'a, T>(&self, content: &'a T) -> GuardView<'a, T> {
        let session = self.session.state();
        let inner = self.lock();

        let current: GuardKey = (
            session.user.as_ref().map(|u| u.id.clone()),
            inner.requires_membership,
        );
        if session.loading || inner.settled_for.as_ref() != Some(&current) {
            return GuardView::Loading;
        }

        match inner.phase {
            GuardPhase::Render => GuardView::Content(content),
            GuardPhase::Redirect(target) => GuardView::Redirect(target.path()),
            GuardPhase::CheckingAuth | GuardPhase::CheckingMembership => GuardView::Loading,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GuardInner {
    fn settle(&mut self, phase: GuardPhase, key: GuardKey) -> GuardPhase {
        self.phase = phase;
        self.settled_for = Some(key);
        phase
    }
}
