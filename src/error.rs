use thiserror::Error;

/// Every failure this crate reports.
///
/// Mount and directive errors are raised here; everything else is a
/// collaborator failure (parser, patcher, interpreter) passed through unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// `mount` was given a selector that matched nothing.
    #[error("Mountpoint not found: {selector}")]
    MountpointNotFound { selector: String },

    /// A directive attribute value did not match its grammar.
    #[error("Invalid {directive}: {value}")]
    InvalidDirective { directive: String, value: String },

    #[error("template error: {0}")]
    Template(String),

    /// Generated render source failed to parse.
    #[error("syntax error in render source: {0}")]
    Syntax(String),

    #[error("render error: {0}")]
    Eval(String),

    #[error("patch error: {0}")]
    Patch(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
