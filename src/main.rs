// Entrypoint for the CLI.
// - Keeps `main` small: create a client and hand it to the UI loop.
// - Returns `anyhow::Result` so every error prints with context.

use sheepit_cli::{api::SheepitClient, ui::main_menu};

fn main() -> anyhow::Result<()> {
    // The base URL comes from `SHEEPIT_URL` if set, otherwise the
    // production site. See `api::SheepitClient::from_env`.
    let api = SheepitClient::from_env()?;

    // Blocks until the user exits the menu.
    main_menu(api)?;
    Ok(())
}
