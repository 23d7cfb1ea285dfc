use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

use crate::portal::api::DEFAULT_API_BASE_URL;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

/// Editable profile fields exposed as `update-profile` flags: (flag, help).
pub const PROFILE_FIELDS: &[(&str, &str)] = &[
    ("email", "Contact email"),
    ("full-name", "Full name"),
    ("given-name", "Given name"),
    ("family-name", "Family name"),
    ("phone", "Phone number"),
    ("country", "Country"),
    ("city", "City"),
    ("address", "Postal address"),
    ("title", "Academic title, e.g. prof, dr, lecturer, phd_student"),
    ("institution", "Institution"),
    ("department", "Department"),
    ("bio", "Short biography"),
    ("website", "Personal website"),
];

fn update_profile() -> Command {
    let mut command = Command::new("update-profile")
        .about("Update editable profile fields")
        .arg(
            Arg::new("expertise")
                .long("expertise")
                .help("Expertise area, repeat or comma-separate for several")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("reviewer-interest")
                .long("reviewer-interest")
                .help("Reviewer interest, repeat or comma-separate for several")
                .value_delimiter(',')
                .action(ArgAction::Append),
        );

    for (flag, help) in PROFILE_FIELDS {
        command = command.arg(Arg::new(*flag).long(*flag).help(*help));
    }

    command
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("trueditor")
        .about("TruEditor manuscript portal client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Portal API base URL")
                .default_value(DEFAULT_API_BASE_URL)
                .env("TRUEDITOR_API_BASE_URL")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Request timeout in seconds")
                .default_value("30")
                .env("TRUEDITOR_TIMEOUT")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("state-dir")
                .long("state-dir")
                .help("Persisted session directory [default: $XDG_CONFIG_HOME/trueditor]")
                .env("TRUEDITOR_STATE_DIR")
                .global(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TRUEDITOR_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(Command::new("login-url").about("Print the ORCID authorization URL"))
        .subcommand(
            Command::new("login")
                .about("Complete an ORCID login with the code from the callback")
                .arg(
                    Arg::new("code")
                        .help("OAuth authorization code")
                        .required(true),
                ),
        )
        .subcommand(Command::new("logout").about("End the current session"))
        .subcommand(Command::new("profile").about("Show the current user profile"))
        .subcommand(update_profile())
        .subcommand(Command::new("sync").about("Resync the profile from ORCID"))
        .subcommand(Command::new("refresh").about("Refresh the access token"))
        .subcommand(
            Command::new("navigate")
                .about("Show where a portal path leads for the current session")
                .arg(Arg::new("path").help("Portal path, e.g. /dashboard").required(true)),
        )
        .subcommand(Command::new("routes").about("List portal routes and their access rules"))
}
