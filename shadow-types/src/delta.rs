//! ShadowDelta - a pending change as fetched from the cloud shadow.

/// Payload classification reported by the cloud transport.
///
/// The numeric values are CoAP content-format identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// `application/json` (50). The only format the codec accepts.
    Json,
    /// `application/cbor` (60).
    Cbor,
    /// Any other content format.
    Unknown(u16),
}

impl PayloadFormat {
    /// CoAP content-format number for `application/json`.
    pub const JSON_CONTENT_FORMAT: u16 = 50;
    /// CoAP content-format number for `application/cbor`.
    pub const CBOR_CONTENT_FORMAT: u16 = 60;

    /// Whether the config codec can decode this format.
    pub fn is_supported(self) -> bool {
        matches!(self, PayloadFormat::Json)
    }
}

impl From<u16> for PayloadFormat {
    fn from(value: u16) -> Self {
        match value {
            Self::JSON_CONTENT_FORMAT => PayloadFormat::Json,
            Self::CBOR_CONTENT_FORMAT => PayloadFormat::Cbor,
            other => PayloadFormat::Unknown(other),
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "json"),
            PayloadFormat::Cbor => write!(f, "cbor"),
            PayloadFormat::Unknown(code) => write!(f, "content-format {}", code),
        }
    }
}

/// The raw delta returned by a shadow fetch.
///
/// Lives for one poll cycle only; nothing is merged across cycles.
#[derive(Clone, PartialEq, Eq)]
pub struct ShadowDelta {
    /// How the transport classified the payload.
    pub format: PayloadFormat,
    /// Raw document bytes.
    pub body: Vec<u8>,
}

impl ShadowDelta {
    /// Create a delta with an explicit format.
    pub fn new(format: PayloadFormat, body: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            body: body.into(),
        }
    }

    /// Create a JSON delta.
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(PayloadFormat::Json, body)
    }

    /// Create an empty delta (no pending change).
    pub fn empty() -> Self {
        Self::json(Vec::new())
    }

    /// A zero-length body means there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Length of the body in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }
}

impl std::fmt::Debug for ShadowDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowDelta")
            .field("format", &self.format)
            .field("body", &format!("[{} bytes]", self.body.len()))
            .finish()
    }
}
