//! Command implementations

pub mod build;
pub mod completions;
pub mod limits;

use std::path::PathBuf;

use anyhow::{bail, Result};

use keyforge::util::config::Config;
use keyforge::util::diagnostic::suggestions;
use keyforge::util::GlobalContext;

/// Flags shared by every command.
pub struct GlobalFlags {
    pub verbose: bool,
    pub color: bool,
}

/// Locate the project root and load its merged configuration.
pub fn load_project(global: &GlobalFlags) -> Result<(GlobalContext, PathBuf, Config)> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_color(global.color);

    let root = match ctx.find_project_root() {
        Ok(root) => root,
        Err(e) => bail!("{}\n{}", e, suggestions::NO_PROJECT),
    };
    tracing::debug!("project root: {}", root.display());

    let config = ctx.load_config(&root)?;
    Ok((ctx, root, config))
}
