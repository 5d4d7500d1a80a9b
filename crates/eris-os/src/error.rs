use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Errors encountered while binding, accepting or serving connections.
    Io,
    /// Errors encountered while registering commands.
    Registration,
    /// Errors encountered while discovering the board resources.
    Discovery,
    /// Errors encountered while serializing or deserializing data.
    Serialization,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Io => "Input/Output",
            Self::Registration => "Registration",
            Self::Discovery => "Discovery",
            Self::Serialization => "Serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A server error.
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.kind)?;
        write!(f, "Cause: {}", self.description)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, e.to_string())
    }
}

impl From<eris::error::Error> for Error {
    fn from(e: eris::error::Error) -> Self {
        Self::new(ErrorKind::Registration, e.description().to_owned())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn server_error() {
        let error = Error::new(ErrorKind::Discovery, "Unable to read `/dev`.");

        assert_eq!(error.to_string(), "Discovery\nCause: Unable to read `/dev`.");

        let error: Error = std::io::Error::from(std::io::ErrorKind::AddrInUse).into();
        assert_eq!(error.kind(), ErrorKind::Io);

        let error: Error = eris::error::Error::invalid_argument("Duplicate.").into();
        assert_eq!(error.kind(), ErrorKind::Registration);
    }
}
