//! Ordinal daily status and treatment arm primitives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of ordinal levels in the daily status scale.
pub const LEVEL_COUNT: usize = 4;

/// Canonical level labels, worst to best.
pub const CANONICAL_LEVELS: [&str; LEVEL_COUNT] =
    ["Dead", "Vent/ARDS", "In Hospital/Facility", "Home"];

/// Daily ordinal status of a participant. Variant order is the clinical order:
/// a higher code is a better outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "Dead")]
    Dead,
    #[serde(rename = "Vent/ARDS")]
    VentArds,
    #[serde(rename = "In Hospital/Facility")]
    InHospital,
    #[serde(rename = "Home")]
    Home,
}

impl Outcome {
    /// All levels in ordinal order.
    pub const ALL: [Self; LEVEL_COUNT] = [Self::Dead, Self::VentArds, Self::InHospital, Self::Home];

    /// Ordinal integer code (0 = Dead .. 3 = Home).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Dead => 0,
            Self::VentArds => 1,
            Self::InHospital => 2,
            Self::Home => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Dead),
            1 => Some(Self::VentArds),
            2 => Some(Self::InHospital),
            3 => Some(Self::Home),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        CANONICAL_LEVELS[self.code() as usize]
    }

    /// Look up a level by its canonical label. Matching is exact.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.label() == label)
    }

    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Dead)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Binary treatment assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Treatment {
    Control,
    Treatment,
}

impl Treatment {
    #[must_use]
    pub const fn from_flag(treated: bool) -> Self {
        if treated {
            Self::Treatment
        } else {
            Self::Control
        }
    }

    #[must_use]
    pub const fn is_treated(self) -> bool {
        matches!(self, Self::Treatment)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Treatment => "treatment",
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
