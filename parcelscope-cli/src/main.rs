mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // Show parcelscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("parcelscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Compile {
            name,
            output,
            force,
        } => commands::compile::run(name, output, *force, &cli.global),
        Command::BatchCompile {
            output,
            recursive,
            force,
        } => commands::batch::run(output, *recursive, *force, &cli.global),
        Command::Info { name } => commands::info::run(name, &cli.global),
        Command::Decode {
            path,
            code,
            android_version,
            reply,
            descriptor,
            hex,
            schemas,
        } => commands::decode::run(
            path,
            &commands::decode::DecodeOptions {
                code,
                android_version: *android_version,
                reply: *reply,
                descriptor: descriptor.as_deref(),
                hex: *hex,
                schemas: schemas.as_deref(),
            },
            &cli.global,
        ),
    }
}
