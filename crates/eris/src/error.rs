use std::borrow::Cow;

/// Numeric error codes carried by `ERR` lines.
///
/// The values are the Linux `errno` numbers used by the protocol.
pub mod code {
    /// I/O error.
    pub const EIO: i32 = 5;
    /// Out of memory.
    pub const ENOMEM: i32 = 12;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Function not implemented.
    pub const ENOSYS: i32 = 38;
    /// Protocol error.
    pub const EPROTO: i32 = 71;
    /// Timed out.
    pub const ETIMEDOUT: i32 = 110;
}

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, malformed or out-of-range input.
    InvalidArgument,
    /// The named resource does not exist or is not in use.
    UnknownResource,
    /// The resource is exclusively held, either by this process or by
    /// another one.
    AlreadyReserved,
    /// The operation is not valid for the current mode of the resource.
    WrongMode,
    /// A kernel or device failure.
    IoFailure,
    /// An unknown or intentionally unimplemented command.
    Unsupported,
    /// A malformed request frame.
    Protocol,
    /// A blocking operation gave up.
    Timeout,
    /// A reply buffer could not be allocated.
    OutOfMemory,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Invalid Argument",
            Self::UnknownResource => "Unknown Resource",
            Self::AlreadyReserved => "Already Reserved",
            Self::WrongMode => "Wrong Mode",
            Self::IoFailure => "I/O Failure",
            Self::Unsupported => "Unsupported",
            Self::Protocol => "Protocol",
            Self::Timeout => "Timeout",
            Self::OutOfMemory => "Out Of Memory",
        }
    }

    /// Returns the numeric code sent on the TCP wire.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidArgument => code::EINVAL,
            Self::UnknownResource => code::ENODEV,
            Self::AlreadyReserved => code::EBUSY,
            Self::WrongMode | Self::IoFailure => code::EIO,
            Self::Unsupported => code::ENOSYS,
            Self::Protocol => code::EPROTO,
            Self::Timeout => code::ETIMEDOUT,
            Self::OutOfMemory => code::ENOMEM,
        }
    }

    /// Returns the HTTP status code sent by the REST binding.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidArgument | Self::WrongMode | Self::Protocol => 400,
            Self::AlreadyReserved => 403,
            Self::UnknownResource => 404,
            Self::Timeout => 408,
            Self::IoFailure | Self::OutOfMemory => 500,
            Self::Unsupported => 501,
        }
    }

    /// Whether a client may reasonably retry the same request later.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::AlreadyReserved | Self::IoFailure | Self::Timeout | Self::OutOfMemory
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description().fmt(f)
    }
}

/// An API error.
///
/// The description is the human-readable label sent back to the client.
#[derive(Clone, PartialEq, Eq)]
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
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Creates an [`ErrorKind::InvalidArgument`] error.
    #[inline]
    pub fn invalid_argument(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, description)
    }

    /// Creates an [`ErrorKind::UnknownResource`] error.
    #[inline]
    pub fn unknown_resource(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::UnknownResource, description)
    }

    /// Creates an [`ErrorKind::AlreadyReserved`] error.
    #[inline]
    pub fn already_reserved(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AlreadyReserved, description)
    }

    /// Creates an [`ErrorKind::WrongMode`] error.
    #[inline]
    pub fn wrong_mode(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::WrongMode, description)
    }

    /// Creates an [`ErrorKind::IoFailure`] error.
    #[inline]
    pub fn io_failure(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IoFailure, description)
    }

    /// Creates an [`ErrorKind::Unsupported`] error.
    #[inline]
    pub fn unsupported(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unsupported, description)
    }

    /// Creates an [`ErrorKind::Protocol`] error.
    #[inline]
    pub fn protocol(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Protocol, description)
    }

    /// Creates an [`ErrorKind::Timeout`] error.
    #[inline]
    pub fn timeout(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Timeout, description)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::new(
            ErrorKind::OutOfMemory,
            "Not enough memory. Please retry later.",
        )
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, code};

    #[test]
    fn api_error() {
        let error = Error::already_reserved("The GPIO line is already reserved.");

        assert_eq!(
            error.to_string(),
            "Already Reserved: The GPIO line is already reserved."
        );
        assert_eq!(error.description(), "The GPIO line is already reserved.");
    }

    #[test]
    fn wire_mapping() {
        assert_eq!(ErrorKind::InvalidArgument.code(), code::EINVAL);
        assert_eq!(ErrorKind::UnknownResource.http_status(), 404);
        assert_eq!(ErrorKind::AlreadyReserved.http_status(), 403);
        assert_eq!(ErrorKind::WrongMode.code(), code::EIO);
        assert_eq!(ErrorKind::WrongMode.http_status(), 400);
        assert_eq!(ErrorKind::IoFailure.http_status(), 500);
        assert_eq!(ErrorKind::Unsupported.code(), code::ENOSYS);
        assert_eq!(ErrorKind::Unsupported.http_status(), 501);
    }

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::AlreadyReserved.is_transient());
        assert!(!ErrorKind::InvalidArgument.is_transient());
        assert!(!ErrorKind::WrongMode.is_transient());
    }

    #[test]
    fn allocation_failure() {
        let mut buffer: Vec<u8> = Vec::new();
        let error: Error = buffer.try_reserve(usize::MAX).unwrap_err().into();

        assert_eq!(error.kind(), ErrorKind::OutOfMemory);
    }
}
