//! Config codec for the shadow document.
//!
//! The document shape is `{"config": {"display": <string>}}`. Decoding
//! walks the JSON tree level by level so that each missing or mistyped
//! level maps to its own [`DecodeError`]; unknown sibling fields are
//! ignored at every level. Encoding always produces the canonical form.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{DecodeError, DesiredConfig, EncodeError, ReportedConfig};

const CONFIG_FIELD: &str = "config";
const DISPLAY_FIELD: &str = "display";

/// Canonical wire shape of a reported document.
#[derive(Serialize)]
struct ShadowDocument<'a> {
    config: ConfigSection<'a>,
}

#[derive(Serialize)]
struct ConfigSection<'a> {
    display: &'a str,
}

/// Decode a shadow delta into a [`DesiredConfig`].
pub fn decode(raw: &[u8]) -> Result<DesiredConfig, DecodeError> {
    let root: Value = serde_json::from_slice(raw).map_err(|e| {
        tracing::debug!("shadow document parse failed: {}", e);
        DecodeError::MalformedDocument(e.to_string())
    })?;

    let Value::Object(root) = root else {
        return Err(DecodeError::MalformedDocument(
            "top level is not an object".into(),
        ));
    };

    let config = object_field(&root, CONFIG_FIELD)?;
    let text = match config.get(DISPLAY_FIELD) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(DecodeError::WrongType {
                field: DISPLAY_FIELD,
                expected: "string",
            })
        }
        None => return Err(DecodeError::MissingField(DISPLAY_FIELD)),
    };

    tracing::trace!(display = %text, "decoded shadow config");
    Ok(DesiredConfig { display: text })
}

/// Encode a [`ReportedConfig`] as the canonical shadow document.
pub fn encode(cfg: &ReportedConfig) -> Result<Vec<u8>, EncodeError> {
    let doc = ShadowDocument {
        config: ConfigSection {
            display: &cfg.display,
        },
    };
    let bytes = serde_json::to_vec(&doc).map_err(EncodeError::Serialization)?;
    tracing::trace!(len = bytes.len(), "encoded reported config");
    Ok(bytes)
}

fn object_field<'a>(
    parent: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    match parent.get(field) {
        Some(Value::Object(obj)) => Ok(obj),
        Some(_) => Err(DecodeError::WrongType {
            field,
            expected: "object",
        }),
        None => Err(DecodeError::MissingField(field)),
    }
}
