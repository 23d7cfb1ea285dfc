//! # TruEditor (portal session client)
//!
//! `trueditor` is the client side of the TruEditor manuscript-submission
//! portal. It keeps the ORCID-authenticated session, talks to the portal REST
//! API and decides which routes a visitor may enter.
//!
//! ## Session
//!
//! Login is an ORCID OAuth code exchange: the portal hands out an
//! authorization URL, ORCID redirects back with a code, and the code is traded
//! for an access token plus the user profile. Only `{ accessToken, user }` is
//! persisted between runs; loading and error status are transient.
//!
//! ## Requests
//!
//! Every request asks the session for the current bearer token at send time.
//! A `401` is answered by exactly one refresh attempt and one replay of the
//! original request; a second `401` is surfaced to the caller.
//!
//! ## Routes
//!
//! Routes declare `requires_auth`, `requires_profile`, `guest_only` and
//! `allow_incomplete_profile`. The guard is a pure function of those flags
//! and a read-only view of the session. It only shapes navigation; real
//! access control lives on the API.

pub mod cli;
pub mod portal;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
