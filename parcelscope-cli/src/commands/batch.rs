use std::path::Path;

use anyhow::Context;
use parcelscope::schema::json;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::{common::require_roots, compile::CompiledClass},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct Failure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub discovered: usize,
    pub compiled: Vec<CompiledClass>,
    pub skipped: usize,
    pub failed: Vec<Failure>,
}

pub fn run(output: &Path, recursive: bool, force: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let loader = require_roots(opts)?;
    let discovery = loader
        .discover(recursive)
        .context("failed to scan the include roots")?;
    log::info!("discovered {} declaration(s)", discovery.names.len());

    let report = loader.compile_all(&discovery.names);

    let mut failed: Vec<Failure> = discovery
        .failures
        .iter()
        .map(|(path, error)| Failure {
            name: path.display().to_string(),
            error: error.to_string(),
        })
        .chain(report.failed.iter().map(|(name, error)| Failure {
            name: name.to_string(),
            error: error.to_string(),
        }))
        .collect();

    let mut compiled = Vec::with_capacity(report.compiled.len());
    let mut skipped = 0;
    for class in &report.compiled {
        match json::save(class, output, force) {
            Ok(None) => skipped += 1,
            Ok(written) => compiled.push(CompiledClass::new(class, written)),
            Err(error) => failed.push(Failure {
                name: class.name.to_string(),
                error: error.to_string(),
            }),
        }
    }

    let summary = BatchSummary {
        discovered: discovery.names.len(),
        compiled,
        skipped,
        failed,
    };

    print_output(&summary, opts, |summary| {
        let unsupported: usize = summary.compiled.iter().map(|c| c.unsupported).sum();
        let mut tw = TabWriter::new(&[("", Align::Left), ("Count", Align::Right)]);
        tw.row(["Discovered".to_string(), summary.discovered.to_string()]);
        tw.row(["Compiled".to_string(), summary.compiled.len().to_string()]);
        tw.row(["Skipped".to_string(), summary.skipped.to_string()]);
        tw.row(["Failed".to_string(), summary.failed.len().to_string()]);
        tw.row(["Unsupported members".to_string(), unsupported.to_string()]);
        tw.print("");

        if !summary.failed.is_empty() {
            println!("\nFailures:");
            let mut tw = TabWriter::new(&[("Name", Align::Left), ("Error", Align::Left)]);
            for failure in &summary.failed {
                tw.row([failure.name.clone(), failure.error.clone()]);
            }
            tw.print("  ");
        }
    })
}
