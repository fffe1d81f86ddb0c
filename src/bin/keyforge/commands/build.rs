//! `keyforge build` command

use anyhow::{Context, Result};

use super::{load_project, GlobalFlags};
use crate::cli::BuildArgs;
use keyforge::ops::keyforge_build::{build, plan, BuildOptions};
use keyforge::ops::report::{
    format_build_report, format_build_report_json, format_plan_json, OutputFormat,
};
use keyforge::util::diagnostic::suggestions;

pub fn execute(args: BuildArgs, global: &GlobalFlags) -> Result<()> {
    let output_format: OutputFormat = args
        .format
        .parse()
        .with_context(|| format!("invalid output format: {}", args.format))?;

    let (_ctx, root, config) = load_project(global)?;

    let opts = BuildOptions {
        matrix: args.matrix,
        output_dir: args.output,
        jobs: args.jobs,
        skip_limits: args.skip_limits,
        verbose: global.verbose,
    };

    if args.plan {
        let plan = plan(&root, &config, &opts)?;
        println!("{}", format_plan_json(&plan));
        return Ok(());
    }

    let report = build(&root, &config, &opts)?;

    let output = match output_format {
        OutputFormat::Human => format_build_report(&report, global.verbose),
        OutputFormat::Json => format_build_report_json(&report),
    };
    print!("{}", output);

    // Exit with error code if any job failed
    if !report.success() {
        if !global.verbose {
            eprintln!("{}", suggestions::BUILD_FAILED);
        }
        std::process::exit(1);
    }

    Ok(())
}
