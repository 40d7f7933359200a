use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Compilation and decoding are best-effort: most problems inside a single field are recorded
/// in the produced schema or message instead of being returned as an [`Error`]. The variants
/// below are what remains, failures that prevent an operation from producing anything useful.
///
/// # Error Categories
///
/// ## Buffer Errors
/// - [`Error::Malformed`] - A length prefix or string payload is inconsistent
/// - [`Error::OutOfBounds`] - A read would have passed the end of the buffer
///
/// ## Source and Schema Errors
/// - [`Error::NotFound`] - A qualified name has no source under any configured root
/// - [`Error::Syntax`] - A declaration file could not be parsed
/// - [`Error::NotSupported`] - No reader is registered for a source file type
/// - [`Error::UnsupportedType`] - A type reference has no known wire mapping
/// - [`Error::InvalidCall`] - A persisted read operation string is unknown
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::JsonError`] - Persisted schema (de)serialization errors
///
/// # Examples
///
/// ```rust,no_run
/// use parcelscope::{Error, Loader};
///
/// let loader = Loader::new().with_root("aidl")?;
/// match loader.get_or_compile("android.os.IServiceManager") {
///     Ok(class) => println!("compiled {}", class.name),
///     Err(Error::NotFound(name)) => eprintln!("no source for {name}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok::<(), parcelscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer or document is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a buffer.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// No configured source root contains a declaration for this qualified name.
    #[error("Could not locate a declaration for '{0}'")]
    NotFound(String),

    /// A declaration file contains text the reader does not understand.
    #[error("Syntax error in {}:{line}: {message}", path.display())]
    Syntax {
        /// File that failed to parse
        path: PathBuf,
        /// One-based line of the offending token
        line: usize,
        /// Description of what was expected
        message: String,
    },

    /// The file type or declaration kind is not supported.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// A type reference has no wire mapping.
    #[error("Unsupported type - {0}")]
    UnsupportedType(String),

    /// A persisted read operation identifier could not be parsed.
    #[error("Invalid read operation - {0}")]
    InvalidCall(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Persisted schema could not be (de)serialized.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Failed to lock target.
    ///
    /// This error occurs when a worker thread panicked while holding a cache lock.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
