use bytes::Bytes;

// Payload of a reply acknowledging an action.
const OK: &str = "Ok";

/// A successful reply produced by a command handler.
///
/// The payload is an arbitrary byte string whose length is always known, so
/// it may be empty or contain any byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply(Bytes);

impl Reply {
    /// Creates a [`Reply`] acknowledging an action, with payload `Ok`.
    #[must_use]
    #[inline]
    pub fn ok() -> Self {
        Self(Bytes::from_static(OK.as_bytes()))
    }

    /// Creates an empty [`Reply`].
    #[must_use]
    #[inline]
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Creates a textual [`Reply`].
    #[must_use]
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self(Bytes::from(text.into()))
    }

    /// Creates a [`Reply`] from raw bytes.
    #[must_use]
    #[inline]
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.0
    }

    /// Returns the payload length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the reply returning its payload.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}
