use thiserror::Error;

use crate::machine::{BlockId, FunctionProperties};

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

pub(crate) use malformed_error;

/// The generic Error type, which covers every error this library can return.
///
/// Errors only arise at the edges of the crate: while describing a target or
/// building a machine function, and when a pass is asked to run on a function
/// that lacks a property the pass depends on. The cleanup transform itself never
/// fails; violations of its internal invariants are bugs in whatever produced
/// the function and abort with a panic.
///
/// # Error Categories
///
/// ## Construction Errors
/// - [`Error::Malformed`] - A structurally invalid function or target description
/// - [`Error::UnknownOpcode`] - An instruction references an opcode the target does not define
/// - [`Error::UnknownRegister`] - A register name the target does not define
/// - [`Error::UnknownBlock`] - An edge or lookup references a block that does not exist
/// - [`Error::DuplicateBlock`] - A block number was defined twice
///
/// ## Pipeline Errors
/// - [`Error::MissingProperties`] - A pass requires function properties that are not established
///
/// # Examples
///
/// ```rust
/// use latecleanup::{machine::TargetBuilder, Error};
///
/// let target = TargetBuilder::new("toy").register("r0").build()?;
/// match target.register_named("r9") {
///     Ok(_) => unreachable!(),
///     Err(Error::UnknownRegister(name)) => assert_eq!(name, "r9"),
///     Err(e) => return Err(e),
/// }
/// # Ok::<(), latecleanup::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is structurally invalid.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An instruction names an opcode the target does not describe.
    #[error("Unknown opcode - {0}")]
    UnknownOpcode(String),

    /// A register name the target does not describe.
    #[error("Unknown register - {0}")]
    UnknownRegister(String),

    /// A block number that does not exist in the function.
    #[error("Unknown block - {0}")]
    UnknownBlock(BlockId),

    /// A block number that was defined more than once while building a function.
    #[error("Block defined twice - {0}")]
    DuplicateBlock(BlockId),

    /// A pass was scheduled on a function that does not have the properties it needs.
    ///
    /// Late passes operate on physical registers only; running them before
    /// register allocation has removed every virtual register would silently
    /// reason about the wrong values.
    #[error("Pass '{pass}' requires properties {missing:?} which '{function}' does not have")]
    MissingProperties {
        /// Name of the pass that refused to run
        pass: &'static str,
        /// Name of the function
        function: String,
        /// Properties that are required but absent
        missing: FunctionProperties,
    },
}
