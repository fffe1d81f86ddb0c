//! `keyforge limits` command

use anyhow::{Context, Result};

use super::{load_project, GlobalFlags};
use crate::cli::LimitsArgs;
use keyforge::core::errors::ConfigError;
use keyforge::ops::derive_limits::{limits_from_records, parse_combo_records, write_limits_fragment};
use keyforge::util::fs;

pub fn execute(args: LimitsArgs, global: &GlobalFlags) -> Result<()> {
    let (ctx, root, config) = load_project(global)?;

    let artifact = args
        .combos
        .map(|p| if p.is_absolute() { p } else { ctx.cwd().join(p) })
        .unwrap_or_else(|| config.combos.artifact_path(&root));

    if !artifact.exists() {
        return Err(ConfigError::MissingComboArtifact { path: artifact }.into());
    }

    let text = std::fs::read_to_string(&artifact)
        .with_context(|| format!("failed to read combo artifact: {}", artifact.display()))?;
    let records = parse_combo_records(&text, &artifact.display().to_string())
        .map_err(ConfigError::from)?;
    let limits = limits_from_records(&records);

    tracing::debug!("{} combos in {}", records.len(), artifact.display());
    for (name, value) in limits.settings() {
        println!("{}={}", name, value);
    }

    if args.write {
        let fragment = config.combos.fragment_path(&root);
        if write_limits_fragment(&fragment, &limits)? {
            eprintln!("     Updated {}", fs::display_relative(&root, &fragment));
        } else {
            eprintln!("   Unchanged {}", fs::display_relative(&root, &fragment));
        }
    }

    Ok(())
}
