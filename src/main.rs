//! THLB analysis command line
//!
//! Usage:
//!   thlb_analysis <WORKSPACE> <AOI> [--config thlb.json] [--output-dir DIR]
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::Parser;
use thlb_analysis::{AnalysisConfig, CliArgs, ThlbAnalysis};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = AnalysisConfig::from_args(CliArgs::parse())?;
    let report = ThlbAnalysis::new(config).run()?;

    println!("\n{}", "=".repeat(70));
    println!("THLB summary by operating area");
    println!("{}", "=".repeat(70));
    println!("{}", report.all_stats);
    println!("\nTenures in the selected operating area");
    println!("{}", report.bcts_stats);
    println!("\nResultant: {:?} ({} polygons)", report.resultant_path, report.resultant_features);
    for path in &report.exports {
        println!("Spreadsheet: {:?}", path);
    }

    Ok(())
}
