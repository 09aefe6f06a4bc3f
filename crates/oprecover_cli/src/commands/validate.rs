//! Validate command implementation.

use oprecover_core::{
    CoreResult, DiskStoreDir, OplogSource, RecoveredRegion, Recovery, RecoveryConfig,
    RecoveryStats, ValidatingOverlay, ValidationReport,
};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct ValidateOutput<'a> {
    store: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RecoveryStats>,
}

/// Runs the validate command.
pub fn run(
    path: &Path,
    config: RecoveryConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating disk store at {:?}", path);

    let store = DiskStoreDir::open(path)?;
    let mut overlay = ValidatingOverlay::new();
    let result = Recovery::new(config).run(&store, &mut overlay);
    let output = build_output(store.name(), &result, overlay.into_report());

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => print_text_output(&output),
    }

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Counters from an aborted pass are discarded.
fn build_output<'a>(
    store: &'a str,
    result: &CoreResult<RecoveredRegion>,
    report: ValidationReport,
) -> ValidateOutput<'a> {
    match result {
        Ok(region) => ValidateOutput {
            store,
            ok: true,
            error: None,
            report: Some(report),
            stats: Some(region.stats),
        },
        Err(e) => ValidateOutput {
            store,
            ok: false,
            error: Some(e.to_string()),
            report: None,
            stats: None,
        },
    }
}

fn print_text_output(output: &ValidateOutput<'_>) {
    println!("Disk store: {}", output.store);
    println!("================");
    if let Some(report) = &output.report {
        println!("Oplogs:          {}", report.oplogs);
        println!("Creates:         {}", report.creates);
        println!("Updates:         {}", report.updates);
        println!("Destroys:        {}", report.destroys);
        println!("  of unknown:    {}", report.noop_destroys);
        println!("Deferred values: {}", report.deferred_values);
        println!("Live keys:       {}", report.live_keys);
        println!();
    }

    match &output.error {
        None => println!("✓ Validation passed"),
        Some(error) => {
            println!("✗ Validation failed");
            println!("  {error}");
        }
    }
}
