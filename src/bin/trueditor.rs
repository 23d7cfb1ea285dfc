use anyhow::Result;
use trueditor::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let (action, globals) = start()?;

    // Handle the action
    match action {
        Action::Navigate { .. } | Action::Routes => {
            actions::navigate::handle(action, &globals).await?;
        }
        _ => actions::session::handle(action, &globals).await?,
    }

    Ok(())
}
