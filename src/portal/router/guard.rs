//! Pre-navigation guard. It only reads a snapshot of the session, never
//! suspends and never performs I/O. UX-only: real access control lives on the
//! API.

use crate::portal::{
    router::{RouteDescriptor, COMPLETE_PROFILE, DASHBOARD, LOGIN},
    session::Session,
};

/// Query parameter carrying the originally requested path to the login page.
pub const REDIRECT_QUERY: &str = "redirect";

/// The two session facts the guard depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionView {
    pub authenticated: bool,
    pub profile_completed: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            profile_completed: session.profile_completed(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    /// Name of the route to go to instead.
    pub route: &'static str,
    /// Full path to return to after login.
    pub return_to: Option<String>,
}

impl Redirect {
    fn to(route: &'static str) -> Self {
        Self {
            route,
            return_to: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(Redirect),
}

/// Decides a single transition to `target` (requested as `full_path`).
///
/// First matching rule wins:
/// 1. guest-only page while authenticated: dashboard, or profile completion
/// 2. protected page while anonymous: login, remembering `full_path`
/// 3. profile-gated page with an incomplete profile: profile completion
/// 4. profile completion page with a complete profile: dashboard
#[must_use]
pub fn decide(target: &RouteDescriptor, full_path: &str, session: SessionView) -> Decision {
    if target.guest_only && session.authenticated {
        let route = if session.profile_completed {
            DASHBOARD
        } else {
            COMPLETE_PROFILE
        };
        return Decision::Redirect(Redirect::to(route));
    }

    if target.requires_auth && !session.authenticated {
        return Decision::Redirect(Redirect {
            route: LOGIN,
            return_to: Some(full_path.to_string()),
        });
    }

    if target.requires_profile
        && session.authenticated
        && !session.profile_completed
        && !target.allow_incomplete_profile
    {
        return Decision::Redirect(Redirect::to(COMPLETE_PROFILE));
    }

    if target.name == COMPLETE_PROFILE && session.authenticated && session.profile_completed {
        return Decision::Redirect(Redirect::to(DASHBOARD));
    }

    Decision::Allow
}
