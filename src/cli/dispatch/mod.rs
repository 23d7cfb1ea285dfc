use crate::{
    cli::{actions::Action, commands::PROFILE_FIELDS, globals::GlobalArgs},
    portal::types::{AcademicTitle, UserProfileUpdate},
};
use anyhow::{anyhow, bail, Context, Result};
use std::{env, path::PathBuf, time::Duration};
use url::Url;

fn sub_matches<'a>(
    matches: &'a clap::ArgMatches,
    subcommand: &str,
) -> Result<&'a clap::ArgMatches> {
    matches
        .subcommand_matches(subcommand)
        .context("arguments not found")
}

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let sub_m = |subcommand| sub_matches(matches, subcommand);

    let action = match matches.subcommand_name() {
        Some("login-url") => Action::LoginUrl,
        Some("login") => Action::Login {
            code: sub_m("login")?
                .get_one::<String>("code")
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: <code>"))?,
        },
        Some("logout") => Action::Logout,
        Some("profile") => Action::Profile,
        Some("update-profile") => Action::UpdateProfile {
            patch: profile_patch(sub_m("update-profile")?)?,
        },
        Some("sync") => Action::Sync,
        Some("refresh") => Action::Refresh,
        Some("navigate") => Action::Navigate {
            path: sub_m("navigate")?
                .get_one::<String>("path")
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: <path>"))?,
        },
        Some("routes") => Action::Routes,
        Some(other) => bail!("unknown subcommand: {other}"),
        None => bail!("no subcommand given"),
    };

    Ok(action)
}

pub fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let api_base_url = matches
        .get_one::<String>("api-url")
        .ok_or_else(|| anyhow!("missing required argument: --api-url"))?;
    let parsed =
        Url::parse(api_base_url).with_context(|| format!("invalid --api-url {api_base_url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported scheme for --api-url: {}", parsed.scheme());
    }

    let state_dir = matches
        .get_one::<String>("state-dir")
        .map(PathBuf::from)
        .unwrap_or_else(default_state_dir);

    let mut globals = GlobalArgs::new(api_base_url.clone(), state_dir);
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        globals.set_timeout(Duration::from_secs(*timeout));
    }

    Ok(globals)
}

fn default_state_dir() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map_or_else(|| PathBuf::from(".trueditor"), |dir| dir.join("trueditor"))
}

fn profile_patch(matches: &clap::ArgMatches) -> Result<UserProfileUpdate> {
    let text = |name: &str| matches.get_one::<String>(name).cloned();
    let list = |name: &str| {
        matches
            .get_many::<String>(name)
            .map(|values| values.map(|value| value.trim().to_string()).collect::<Vec<_>>())
    };

    let title = match text("title") {
        Some(raw) => Some(
            AcademicTitle::parse(&raw).ok_or_else(|| anyhow!("unknown academic title: {raw}"))?,
        ),
        None => None,
    };

    let patch = UserProfileUpdate {
        email: text("email"),
        full_name: text("full-name"),
        given_name: text("given-name"),
        family_name: text("family-name"),
        phone: text("phone"),
        country: text("country"),
        city: text("city"),
        address: text("address"),
        title,
        institution: text("institution"),
        department: text("department"),
        expertise_areas: list("expertise"),
        bio: text("bio"),
        website: text("website"),
        reviewer_interests: list("reviewer-interest"),
    };

    if patch.is_empty() {
        let flags: Vec<String> = PROFILE_FIELDS
            .iter()
            .map(|(flag, _)| format!("--{flag}"))
            .collect();
        bail!("nothing to update, pass at least one of: {}", flags.join(", "));
    }

    Ok(patch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn matches_for(args: &[&str]) -> clap::ArgMatches {
        let mut argv = vec!["trueditor"];
        argv.extend_from_slice(args);
        commands::new().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_handler_login() {
        let action = handler(&matches_for(&["login", "abc123"])).unwrap();
        assert!(matches!(action, Action::Login { code } if code == "abc123"));
    }

    #[test]
    fn test_handler_navigate() {
        let action = handler(&matches_for(&["navigate", "/dashboard"])).unwrap();
        assert!(matches!(action, Action::Navigate { path } if path == "/dashboard"));
    }

    #[test]
    fn test_update_profile_patch() {
        let action = handler(&matches_for(&[
            "update-profile",
            "--title",
            "dr",
            "--institution",
            "CERN",
            "--reviewer-interest",
            "optics, lasers",
        ]))
        .unwrap();

        let Action::UpdateProfile { patch } = action else {
            panic!("expected update-profile action");
        };
        assert_eq!(patch.title, Some(AcademicTitle::Doctor));
        assert_eq!(patch.institution.as_deref(), Some("CERN"));
        assert_eq!(
            patch.reviewer_interests,
            Some(vec!["optics".to_string(), "lasers".to_string()])
        );
        assert!(patch.email.is_none());
    }

    #[test]
    fn test_update_profile_rejects_empty_and_bad_title() {
        assert!(handler(&matches_for(&["update-profile"])).is_err());
        assert!(handler(&matches_for(&["update-profile", "--title", "dean"])).is_err());
    }

    #[test]
    fn test_globals_from_env() {
        temp_env::with_vars(
            [
                ("TRUEDITOR_API_BASE_URL", Some("https://portal.example/api/v1")),
                ("TRUEDITOR_STATE_DIR", Some("/var/lib/trueditor")),
                ("TRUEDITOR_TIMEOUT", Some("7")),
            ],
            || {
                let globals = globals(&matches_for(&["routes"])).unwrap();
                assert_eq!(globals.api_base_url, "https://portal.example/api/v1");
                assert_eq!(globals.state_dir, PathBuf::from("/var/lib/trueditor"));
                assert_eq!(globals.timeout, Duration::from_secs(7));
            },
        );
    }

    #[test]
    fn test_globals_rejects_bad_url() {
        temp_env::with_vars([("TRUEDITOR_API_BASE_URL", None::<&str>)], || {
            assert!(globals(&matches_for(&["--api-url", "not a url", "routes"])).is_err());
            let ftp = matches_for(&["--api-url", "ftp://portal.example", "routes"]);
            assert!(globals(&ftp).is_err());
        });
    }

    #[test]
    fn test_default_state_dir() {
        temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some("/xdg")),
                ("TRUEDITOR_STATE_DIR", None),
            ],
            || {
                assert_eq!(default_state_dir(), PathBuf::from("/xdg/trueditor"));
            },
        );
        temp_env::with_vars(
            [("XDG_CONFIG_HOME", None::<&str>), ("HOME", Some("/home/ada"))],
            || {
                assert_eq!(default_state_dir(), PathBuf::from("/home/ada/.config/trueditor"));
            },
        );
    }
}
