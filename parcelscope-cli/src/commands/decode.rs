use std::path::Path;

use anyhow::Context;
use parcelscope::codec::{AndroidVersion, MessageKind, ParcelCodec};

use crate::{
    app::GlobalOptions,
    commands::common::{build_loader, parse_hex, parse_number},
};

pub struct DecodeOptions<'a> {
    pub code: &'a str,
    pub android_version: Option<u32>,
    pub reply: bool,
    pub descriptor: Option<&'a str>,
    pub hex: bool,
    pub schemas: Option<&'a Path>,
}

fn read_buffer(path: &Path, hex: bool) -> anyhow::Result<Vec<u8>> {
    if hex {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_hex(&text).with_context(|| format!("failed to parse {}", path.display()))
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Decoded messages are always printed as JSON; `--json` only silences logging.
pub fn run(path: &Path, options: &DecodeOptions<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let code = parse_number(options.code)?;
    let data = read_buffer(path, options.hex)?;
    let loader = build_loader(opts, options.schemas)?;

    let version = options
        .android_version
        .map_or_else(AndroidVersion::default, AndroidVersion);
    let kind = if options.reply {
        MessageKind::Reply
    } else {
        MessageKind::Request
    };

    log::debug!("decoding {} byte(s) as {kind} {code} for {version}", data.len());
    let message = ParcelCodec::new(&loader, version).decode(&data, code, kind, options.descriptor);
    if let Some(halt) = message.halt() {
        log::warn!("decoding stopped early: {halt}");
    }

    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
