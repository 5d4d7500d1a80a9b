use serde::Serialize;

/// The kind of `REST` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RestKind {
    /// `GET` request.
    Get,
    /// `PUT` request.
    Put,
    /// `POST` request.
    Post,
    /// `DELETE` request.
    Delete,
}

impl RestKind {
    /// Parses an HTTP method name.
    ///
    /// Methods are case-sensitive, as in `HTTP`.
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "POST" => Some(Self::Post),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for RestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
        .fmt(f)
    }
}

/// An HTTP route bound to a command.
///
/// Query parameters are listed in the order in which they become the
/// command arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpRoute {
    /// The kind of `REST` request.
    #[serde(rename = "method")]
    pub rest_kind: RestKind,
    /// Path, starting with `/`.
    pub path: &'static str,
    /// Query parameter names.
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub parameters: &'static [&'static str],
}

impl HttpRoute {
    /// Creates an [`HttpRoute`] through a `GET` API.
    #[must_use]
    #[inline]
    pub const fn get(path: &'static str) -> Self {
        Self::init(RestKind::Get, path)
    }

    /// Creates an [`HttpRoute`] through a `PUT` API.
    #[must_use]
    #[inline]
    pub const fn put(path: &'static str) -> Self {
        Self::init(RestKind::Put, path)
    }

    /// Creates an [`HttpRoute`] through a `POST` API.
    #[must_use]
    #[inline]
    pub const fn post(path: &'static str) -> Self {
        Self::init(RestKind::Post, path)
    }

    /// Creates an [`HttpRoute`] through a `DELETE` API.
    #[must_use]
    #[inline]
    pub const fn delete(path: &'static str) -> Self {
        Self::init(RestKind::Delete, path)
    }

    /// Sets the query parameters.
    #[must_use]
    pub const fn with_parameters(mut self, parameters: &'static [&'static str]) -> Self {
        self.parameters = parameters;
        self
    }

    // Route key, used to detect duplicates and to look routes up.
    //
    // Paths are matched case-insensitively.
    pub(crate) fn key(&self) -> (RestKind, String) {
        (self.rest_kind, self.path.to_ascii_lowercase())
    }

    const fn init(rest_kind: RestKind, path: &'static str) -> Self {
        Self {
            rest_kind,
            path,
            parameters: &[],
        }
    }
}
