use crate::{
    cli::{
        actions::{session::boot_verified, Action},
        globals::GlobalArgs,
    },
    portal::router::{self, guard::SessionView, RouteDescriptor, NOT_FOUND_ROUTE, ROUTES},
};
use anyhow::{anyhow, Result};
use tracing::info;

/// Handle the navigation actions
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Navigate { path } => {
            let store = boot_verified(globals).await?;
            let view = SessionView::from(&store.session());
            let navigation = router::navigate(&path, view)?;

            for hop in &navigation.redirected_from {
                info!("redirected from {hop}");
            }
            let destination = &navigation.destination;
            println!("{} ({})", destination.full_path, destination.route.name);
            for (name, value) in &destination.params {
                println!("  {name} = {value}");
            }
        }

        Action::Routes => {
            for route in ROUTES.iter().chain([&NOT_FOUND_ROUTE]) {
                println!("{}", describe(route));
            }
        }

        other => return Err(anyhow!("not a navigation action: {other:?}")),
    }

    Ok(())
}

fn describe(route: &RouteDescriptor) -> String {
    let mut rules = Vec::new();
    if route.guest_only {
        rules.push("guest only");
    }
    if route.requires_auth {
        rules.push("login");
    }
    if route.requires_profile {
        rules.push("complete profile");
    }
    if route.allow_incomplete_profile {
        rules.push("incomplete profile allowed");
    }
    if rules.is_empty() {
        rules.push("public");
    }

    format!("{:<24} {:<20} {}", route.path, route.name, rules.join(", "))
}

#[cfg(test)]
mod tests {
    use super::describe;
    use crate::portal::router::{route_by_name, COMPLETE_PROFILE, DASHBOARD, LOGIN, NOT_FOUND_ROUTE};

    #[test]
    fn describe_lists_access_rules() {
        let login = route_by_name(LOGIN).unwrap();
        assert!(describe(login).ends_with("guest only"));

        let dashboard = route_by_name(DASHBOARD).unwrap();
        assert!(describe(dashboard).ends_with("login, complete profile"));

        let complete = route_by_name(COMPLETE_PROFILE).unwrap();
        assert!(describe(complete).ends_with("login, incomplete profile allowed"));

        assert!(describe(&NOT_FOUND_ROUTE).ends_with("public"));
    }
}
