//! Closed-set attributes shared across the domain.
//!
//! Each enum carries its constant table (container codes, water
//! distribution constants, elimination rates) so the rest of the crate never
//! handles these values as open strings.

use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Containers
// ============================================================================

/// A physical dispensing slot, or `Unassigned`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Container {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
    #[default]
    Unassigned,
}

impl Container {
    /// The four physical slots, in display order
    pub const SLOTS: [Container; 4] = [
        Container::FrontLeft,
        Container::FrontRight,
        Container::BackLeft,
        Container::BackRight,
    ];

    /// Two-letter storage code
    pub fn code(self) -> &'static str {
        match self {
            Container::FrontLeft => "FL",
            Container::FrontRight => "FR",
            Container::BackLeft => "BL",
            Container::BackRight => "BR",
            Container::Unassigned => "NA",
        }
    }

    /// Human readable slot name
    pub fn display_name(self) -> &'static str {
        match self {
            Container::FrontLeft => "Front Left",
            Container::FrontRight => "Front Right",
            Container::BackLeft => "Back Left",
            Container::BackRight => "Back Right",
            Container::Unassigned => "Not Available",
        }
    }

    pub fn is_assigned(self) -> bool {
        self != Container::Unassigned
    }
}

impl FromStr for Container {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FL" => Ok(Container::FrontLeft),
            "FR" => Ok(Container::FrontRight),
            "BL" => Ok(Container::BackLeft),
            "BR" => Ok(Container::BackRight),
            "NA" => Ok(Container::Unassigned),
            other => Err(Error::Validation(format!(
                "Unknown container code: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Drinker attributes
// ============================================================================

/// Sex of a drinker, used only to select the body water constant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Fraction of body weight that is water
    pub fn water_constant(self) -> f64 {
        match self {
            Sex::Male => 0.58,
            Sex::Female => 0.49,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(Error::Validation(format!("Unknown sex: {}", other))),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How often a drinker drinks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Experience {
    Light,
    Regular,
    Heavy,
}

impl Experience {
    /// BAC eliminated per hour (g/100 mL)
    pub fn elimination_rate(self) -> f64 {
        match self {
            Experience::Light => 0.012,
            Experience::Regular => 0.015,
            Experience::Heavy => 0.020,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Experience::Light => "Light",
            Experience::Regular => "Regular",
            Experience::Heavy => "Heavy",
        }
    }
}

impl FromStr for Experience {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Experience::Light),
            "regular" => Ok(Experience::Regular),
            "heavy" => Ok(Experience::Heavy),
            other => Err(Error::Validation(format!("Unknown experience: {}", other))),
        }
    }
}

impl fmt::Display for Experience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check a name against the shared rules: non-empty, at most `max` chars,
/// no control characters and never the record sentinel
pub(crate) fn validate_name(kind: &str, name: &str, max: usize) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{} name must not be empty", kind)));
    }
    if name.chars().count() > max {
        return Err(Error::Validation(format!(
            "{} name greater than {} characters",
            kind, max
        )));
    }
    if name.chars().any(char::is_control) || name.trim() == crate::storage::RECORD_SENTINEL {
        return Err(Error::Validation(format!(
            "{} name contains reserved text",
            kind
        )));
    }
    Ok(())
}
