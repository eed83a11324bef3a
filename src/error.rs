use thiserror::Error;

/// An error that can occur while compiling or executing a regular
/// expression.
///
/// Compile-time failures are always `Syntax`, `InvalidBackref` or
/// `ProgramTooBig`; the resource-cap variants can only be returned by the
/// matching engine. Compile errors are never surfaced during execution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The pattern is not valid syntax. The message carries the byte
    /// position in the pattern and a description of the problem.
    #[error("syntax error in pattern at byte {pos}: {msg}")]
    Syntax {
        /// Byte offset into the pattern text.
        pos: usize,
        /// Human-readable description.
        msg: String,
    },
    /// A backreference `\k` names a group the pattern never defines.
    #[error("backreference \\{0} refers to a nonexistent capture group")]
    InvalidBackref(u32),
    /// The compiled program grew past the signed 32-bit offset range.
    #[error("compiled program too big: {0} bytes exceeds the offset range")]
    ProgramTooBig(usize),
    /// The VM executed more instructions than `max_steps` allows.
    #[error("execution aborted after {0} steps")]
    StepLimit(u64),
    /// Lookaround or atomic-group nesting exceeded `max_recursion_depth`.
    #[error("lookaround nesting exceeded the depth limit of {0}")]
    RecursionLimit(u32),
}

impl Error {
    pub(crate) fn syntax<S: Into<String>>(pos: usize, msg: S) -> Error {
        Error::Syntax { pos, msg: msg.into() }
    }
}
