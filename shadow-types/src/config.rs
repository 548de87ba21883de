//! Desired and reported device configuration.

use serde::{Deserialize, Serialize};

/// The device's current interpretation of cloud-requested settings.
///
/// New settings are added as sibling fields; decoders ignore fields they
/// do not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConfig {
    /// Text the device shows on its display.
    pub display: String,
}

impl DesiredConfig {
    /// Create a config with the given display text.
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

/// The state the device asserts back to the cloud.
///
/// Built fresh from the applied [`DesiredConfig`] for every publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedConfig {
    /// Text currently shown on the display.
    pub display: String,
}

impl From<&DesiredConfig> for ReportedConfig {
    fn from(desired: &DesiredConfig) -> Self {
        Self {
            display: desired.display.clone(),
        }
    }
}

impl From<ReportedConfig> for DesiredConfig {
    fn from(reported: ReportedConfig) -> Self {
        Self {
            display: reported.display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_display_is_empty() {
        assert_eq!(DesiredConfig::default().display, "");
        assert_eq!(ReportedConfig::default().display, "");
    }

    #[test]
    fn reported_mirrors_desired() {
        let desired = DesiredConfig::new("HELLO");
        let reported = ReportedConfig::from(&desired);
        assert_eq!(reported.display, "HELLO");
        assert_eq!(DesiredConfig::from(reported), desired);
    }
}
