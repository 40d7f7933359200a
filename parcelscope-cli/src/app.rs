use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// parcelscope - compile AIDL declarations into Parcel schemas and decode Binder transactions
#[derive(Debug, Parser)]
#[command(name = "parcelscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Source root to resolve declarations from; may be repeated, searched in order.
    #[arg(short = 'I', long = "include", value_name = "DIR", global = true)]
    pub include: Vec<PathBuf>,

    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile every declaration of the file declaring a class and write the schemas.
    Compile {
        /// Qualified class name (e.g. android.os.IServiceManager).
        #[arg(value_name = "NAME")]
        name: String,

        /// Directory the JSON schemas are written to.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Overwrite schemas that already exist.
        #[arg(short, long)]
        force: bool,
    },

    /// Compile every declaration under the include roots.
    #[command(name = "batch-compile")]
    BatchCompile {
        /// Directory the JSON schemas are written to.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Descend into subdirectories of the roots.
        #[arg(short, long)]
        recursive: bool,

        /// Overwrite schemas that already exist.
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize the declarations of the file declaring a class.
    Info {
        /// Qualified class name.
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Decode a captured transaction buffer and print it as JSON.
    Decode {
        /// File holding the raw buffer.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Transaction code (hex like 0x1f or decimal).
        #[arg(short, long, value_name = "CODE")]
        code: String,

        /// Android release the buffer was captured on.
        #[arg(short = 'a', long, value_name = "N")]
        android_version: Option<u32>,

        /// Decode as a reply instead of a request.
        #[arg(long, requires = "descriptor")]
        reply: bool,

        /// Interface descriptor; required for replies, a fallback for requests.
        #[arg(short, long, value_name = "NAME")]
        descriptor: Option<String>,

        /// The file holds hex text instead of raw bytes.
        #[arg(long)]
        hex: bool,

        /// Directory of persisted JSON schemas to load before decoding.
        #[arg(long, value_name = "DIR")]
        schemas: Option<PathBuf>,
    },
}
