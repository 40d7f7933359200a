use std::path::Path;

use anyhow::{bail, Context};
use parcelscope::Loader;

use crate::app::GlobalOptions;

/// Build a loader over the `-I` roots, optionally pre-seeded with persisted schemas.
pub fn build_loader(opts: &GlobalOptions, schemas: Option<&Path>) -> anyhow::Result<Loader> {
    let mut loader = Loader::new();
    for root in &opts.include {
        loader = loader
            .with_root(root)
            .with_context(|| format!("invalid include root: {}", root.display()))?;
    }

    if let Some(dir) = schemas {
        let count = loader
            .load_schemas(dir)
            .with_context(|| format!("failed to load schemas from {}", dir.display()))?;
        log::info!("loaded {count} schema(s) from {}", dir.display());
    }
    Ok(loader)
}

/// Like [`build_loader`], but at least one `-I` root is required.
pub fn require_roots(opts: &GlobalOptions) -> anyhow::Result<Loader> {
    if opts.include.is_empty() {
        bail!("no source roots given, pass at least one -I <DIR>");
    }
    build_loader(opts, None)
}

/// Parse a decimal or `0x`-prefixed hex number.
pub fn parse_number(text: &str) -> anyhow::Result<u32> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid number: {text}"))
}

/// Decode hex text, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = text
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!("invalid hex digit '{c}'");
    }
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte at digit {i}"))
        })
        .collect()
}
