//! Modem functional modes and mode-change planning.

/// Modem functional mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionalMode {
    /// Modem powered off.
    PowerOff,
    /// Full functionality; the only mode in which the device can attach.
    Normal,
    /// Radio off (flight mode); required while credentials are written.
    Offline,
    /// LTE deactivated, other subsystems (e.g. GNSS) untouched.
    LteDeactivated,
}

impl std::fmt::Display for FunctionalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FunctionalMode::PowerOff => "power-off",
            FunctionalMode::Normal => "normal",
            FunctionalMode::Offline => "offline",
            FunctionalMode::LteDeactivated => "lte-deactivated",
        };
        f.write_str(name)
    }
}

/// What a mode-change request requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePlan {
    /// Already in the requested mode.
    Unchanged,
    /// Going back to normal: reconnect, then wait for network time.
    Reconnect,
    /// Set the requested mode directly.
    Apply(FunctionalMode),
}

/// Decide how to move from `current` to `requested`.
pub fn plan_mode_change(current: FunctionalMode, requested: FunctionalMode) -> ModePlan {
    if current == requested {
        ModePlan::Unchanged
    } else if requested == FunctionalMode::Normal {
        ModePlan::Reconnect
    } else {
        ModePlan::Apply(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_mode_is_noop() {
        for mode in [
            FunctionalMode::PowerOff,
            FunctionalMode::Normal,
            FunctionalMode::Offline,
            FunctionalMode::LteDeactivated,
        ] {
            assert_eq!(plan_mode_change(mode, mode), ModePlan::Unchanged);
        }
    }

    #[test]
    fn back_to_normal_reconnects() {
        assert_eq!(
            plan_mode_change(FunctionalMode::Offline, FunctionalMode::Normal),
            ModePlan::Reconnect
        );
    }

    #[test]
    fn other_modes_apply_directly() {
        assert_eq!(
            plan_mode_change(FunctionalMode::Normal, FunctionalMode::Offline),
            ModePlan::Apply(FunctionalMode::Offline)
        );
        assert_eq!(
            plan_mode_change(FunctionalMode::Offline, FunctionalMode::PowerOff),
            ModePlan::Apply(FunctionalMode::PowerOff)
        );
    }
}
