//! Portal route table and navigation. Routes are static; each transition is
//! checked by [`guard::decide`] and redirects are followed until a route is
//! allowed.

pub mod guard;

use anyhow::{bail, Result};
use guard::{Decision, SessionView, REDIRECT_QUERY};
use tracing::debug;
use url::form_urlencoded;

pub const LANDING: &str = "landing";
pub const LOGIN: &str = "login";
pub const ORCID_CALLBACK: &str = "orcid-callback";
pub const COMPLETE_PROFILE: &str = "complete-profile";
pub const DASHBOARD: &str = "dashboard";
pub const NEW_SUBMISSION: &str = "new-submission";
pub const SUBMISSION_DETAIL: &str = "submission-detail";
pub const PROFILE: &str = "profile";
pub const NOT_FOUND: &str = "not-found";

/// Upper bound on redirects followed for one navigation.
const MAX_REDIRECTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: &'static str,
    pub name: &'static str,
    pub requires_auth: bool,
    pub requires_profile: bool,
    pub guest_only: bool,
    pub allow_incomplete_profile: bool,
}

impl RouteDescriptor {
    const fn public(path: &'static str, name: &'static str) -> Self {
        Self {
            path,
            name,
            requires_auth: false,
            requires_profile: false,
            guest_only: false,
            allow_incomplete_profile: false,
        }
    }

    const fn protected(path: &'static str, name: &'static str) -> Self {
        Self {
            requires_auth: true,
            requires_profile: true,
            ..Self::public(path, name)
        }
    }
}

pub const ROUTES: &[RouteDescriptor] = &[
    RouteDescriptor::public("/", LANDING),
    RouteDescriptor {
        guest_only: true,
        ..RouteDescriptor::public("/login", LOGIN)
    },
    RouteDescriptor::public("/auth/orcid/callback", ORCID_CALLBACK),
    // The only authenticated route open to an incomplete profile.
    RouteDescriptor {
        requires_auth: true,
        allow_incomplete_profile: true,
        ..RouteDescriptor::public("/complete-profile", COMPLETE_PROFILE)
    },
    RouteDescriptor::protected("/dashboard", DASHBOARD),
    RouteDescriptor::protected("/submissions/new", NEW_SUBMISSION),
    RouteDescriptor::protected("/submissions/:id", SUBMISSION_DETAIL),
    RouteDescriptor::protected("/profile", PROFILE),
];

/// Catch-all for unmatched paths; unrestricted.
pub const NOT_FOUND_ROUTE: RouteDescriptor = RouteDescriptor::public("/*any", NOT_FOUND);

/// A path matched against the route table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub route: &'static RouteDescriptor,
    /// Path plus query string, as requested.
    pub full_path: String,
    pub params: Vec<(&'static str, String)>,
}

/// Where a navigation ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub destination: ResolvedRoute,
    /// Every location visited before `destination`, in order.
    pub redirected_from: Vec<String>,
}

impl Navigation {
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        !self.redirected_from.is_empty()
    }
}

#[must_use]
pub fn route_by_name(name: &str) -> Option<&'static RouteDescriptor> {
    ROUTES.iter().find(|route| route.name == name)
}

/// Matches `full_path` against the table, falling back to not-found.
#[must_use]
pub fn resolve(full_path: &str) -> ResolvedRoute {
    let path = strip_query(full_path);

    for route in ROUTES {
        if let Some(params) = match_path(route.path, path) {
            return ResolvedRoute {
                route,
                full_path: full_path.to_string(),
                params,
            };
        }
    }

    ResolvedRoute {
        route: &NOT_FOUND_ROUTE,
        full_path: full_path.to_string(),
        params: Vec::new(),
    }
}

/// Renders a guard redirect as a location.
///
/// # Errors
/// Returns an error if the redirect names a route that is not in the table.
pub fn redirect_location(redirect: &guard::Redirect) -> Result<String> {
    let Some(route) = route_by_name(redirect.route) else {
        bail!("redirect to unknown route: {}", redirect.route);
    };

    Ok(match &redirect.return_to {
        Some(return_to) => format!(
            "{}?{REDIRECT_QUERY}={}",
            route.path,
            encode_query_path(return_to)
        ),
        None => route.path.to_string(),
    })
}

/// Runs the guard for `full_path` and follows redirects to the final route.
///
/// # Errors
/// Returns an error if redirects do not settle within the hop limit.
pub fn navigate(full_path: &str, session: SessionView) -> Result<Navigation> {
    let mut redirected_from = Vec::new();
    let mut location = full_path.to_string();

    for _ in 0..=MAX_REDIRECTS {
        let resolved = resolve(&location);
        match guard::decide(resolved.route, &resolved.full_path, session) {
            Decision::Allow => {
                return Ok(Navigation {
                    destination: resolved,
                    redirected_from,
                });
            }
            Decision::Redirect(redirect) => {
                let next = redirect_location(&redirect)?;
                debug!("navigation {} redirected to {}", resolved.full_path, next);
                redirected_from.push(std::mem::replace(&mut location, next));
            }
        }
    }

    bail!("too many redirects navigating to {full_path}")
}

fn strip_query(full_path: &str) -> &str {
    let end = full_path.find(['?', '#']).unwrap_or(full_path.len());
    &full_path[..end]
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn match_path(pattern: &'static str, path: &str) -> Option<Vec<(&'static str, String)>> {
    let mut params = Vec::new();
    let mut wanted = segments(pattern);
    let mut given = segments(path);

    loop {
        match (wanted.next(), given.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(param) = expected.strip_prefix(':') {
                    params.push((param, actual.to_string()));
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

/// Encodes a path for use as a query value, keeping `/` readable.
fn encode_query_path(path: &str) -> String {
    path.split('/')
        .map(|segment| form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}
