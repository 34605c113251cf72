//! Layout command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use golsplit_core::{Config, GameLayout, load_layout, save_layout};

/// Run the layout command
///
/// Shows the layout the tracker would use: the configured file if there is
/// one, the built-in layout otherwise.
pub fn run(config: &Config, output: Option<&Path>) -> Result<()> {
    let layout = match &config.layout {
        Some(path) => load_layout(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => GameLayout::builtin(),
    };

    match output {
        Some(path) => {
            save_layout(path, &layout)?;
            println!("Layout {} written to {}", layout.version, path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&layout)?),
    }

    Ok(())
}
