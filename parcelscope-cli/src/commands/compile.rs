use std::path::{Path, PathBuf};

use anyhow::Context;
use parcelscope::schema::{json, ClassDef, ClassKind};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::require_roots,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct CompiledClass {
    pub name: String,
    pub kind: &'static str,
    /// Fields of a parcelable, methods of an interface
    pub members: usize,
    /// Members whose read operation could not be resolved
    pub unsupported: usize,
    /// `None` when an existing schema was kept
    pub written: Option<PathBuf>,
}

impl CompiledClass {
    pub fn new(class: &ClassDef, written: Option<PathBuf>) -> Self {
        let (kind, members, unsupported) = match &class.kind {
            ClassKind::Parcelable(def) => (
                "parcelable",
                def.fields.len(),
                def.fields.iter().filter(|f| !f.call.is_supported()).count(),
            ),
            ClassKind::Binder(def) => (
                "interface",
                def.methods.len(),
                def.methods
                    .iter()
                    .flat_map(|m| {
                        m.arguments
                            .iter()
                            .map(|a| &a.call)
                            .chain(m.retval.iter().map(|r| &r.call))
                    })
                    .filter(|call| !call.is_supported())
                    .count(),
            ),
        };
        CompiledClass {
            name: class.name.to_string(),
            kind,
            members,
            unsupported,
            written,
        }
    }
}

pub fn run(name: &str, output: &Path, force: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let loader = require_roots(opts)?;
    let classes = loader
        .compile_file(name)
        .with_context(|| format!("failed to compile {name}"))?;

    let mut compiled = Vec::with_capacity(classes.len());
    for class in &classes {
        let written = json::save(class, output, force)
            .with_context(|| format!("failed to write schema for {}", class.name))?;
        compiled.push(CompiledClass::new(class, written));
    }

    print_output(&compiled, opts, |compiled| {
        let mut tw = TabWriter::new(&[
            ("Class", Align::Left),
            ("Kind", Align::Left),
            ("Members", Align::Right),
            ("Unsupported", Align::Right),
            ("Schema", Align::Left),
        ]);
        for class in compiled {
            tw.row([
                class.name.clone(),
                class.kind.to_string(),
                class.members.to_string(),
                class.unsupported.to_string(),
                class.written.as_ref().map_or_else(
                    || "exists, kept (use --force)".to_string(),
                    |path| path.display().to_string(),
                ),
            ]);
        }
        tw.print("");
    })
}
