use anyhow::Result;
use mediflow::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    match action {
        Action::Verify { .. } => actions::verify::handle(action).await?,
    }

    Ok(())
}
