//! Check command - verify a route bundle offline.

use std::path::PathBuf;

use console::style;
use tracing::warn;
use wayguide::preview::verify_walkability;

use super::common::load_bundle;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the check command.
pub struct CheckArgs {
    pub bundle: PathBuf,
}

/// Run the check command.
pub fn run(runner: &CliRunner, args: CheckArgs) -> Result<(), CliError> {
    runner.log_startup("check");
    let (graph, route) = load_bundle(&args.bundle)?;

    let report = verify_walkability(graph, &route).inspect_err(|e| {
        warn!(error = %e, "Walkability check failed");
    })?;

    println!("{}", style("Route is walkable").green().bold());
    println!("  Links:         {}", route.len());
    println!("  Steps:         {}", report.steps);
    println!("  Distance:      {:.1} m", report.distance);
    println!("  Intersections: {}", report.intersections);
    if report.pois.is_empty() {
        println!("  POIs:          (none)");
    } else {
        println!("  POIs:          {}", report.pois.join(", "));
    }
    if !report.unsafe_links.is_empty() {
        println!(
            "  {} {}",
            style("Unprotected:").yellow(),
            report.unsafe_links.join(", ")
        );
    }
    Ok(())
}
