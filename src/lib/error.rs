// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidArgument,
    IncompatibleVariant,
    ExclusivityViolation,
    DependencyError,
    DuplicateIdentity,
    ConversionError,
    UnrecognizedStatement,
    TransportFailure,
    InconsistentState,
    Cancelled,
    Timeout,
    NotSupportedError,
    Bug,
}

impl ErrorKind {
    /// Errors raised while checking the options tree against its model.
    /// None of them can happen after the first statement was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidArgument
                | ErrorKind::IncompatibleVariant
                | ErrorKind::ExclusivityViolation
                | ErrorKind::DependencyError
                | ErrorKind::DuplicateIdentity
        )
    }
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::Bug
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::fmt::Display for DevConfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)?;
        if !self.statement.is_empty() {
            write!(f, "\n| {}", self.statement)?;
        }
        if let Some(secondary) = self.secondary.as_ref() {
            write!(f, "\n(additionally: {secondary})")?;
        }
        Ok(())
    }
}

impl Error for DevConfError {}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DevConfError {
    kind: ErrorKind,
    msg: String,
    statement: String,
    secondary: Option<String>,
}

impl DevConfError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self {
            kind,
            msg,
            ..Default::default()
        }
    }

    pub fn new_statement_error(
        kind: ErrorKind,
        msg: String,
        statement: &str,
    ) -> Self {
        Self {
            kind,
            msg,
            statement: statement.to_string(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }

    /// The rendered statement which caused this error, empty when the error
    /// is not tied to a single statement.
    pub fn statement(&self) -> &str {
        self.statement.as_str()
    }

    /// Error hit while recovering from this one, for example a failed
    /// discard of the candidate configuration after a failed commit.
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub(crate) fn set_secondary(&mut self, msg: String) {
        self.secondary = Some(msg);
    }
}

impl From<serde_json::Error> for DevConfError {
    fn from(e: serde_json::Error) -> Self {
        DevConfError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid propriety: {e}"),
        )
    }
}

impl From<serde_yaml::Error> for DevConfError {
    fn from(e: serde_yaml::Error) -> Self {
        DevConfError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid YAML: {e}"),
        )
    }
}
