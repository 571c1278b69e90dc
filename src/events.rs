use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::processing::normalize::DesignImage;

/// One of the two independent design positions on the garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Front, Side::Back];

    pub const fn index(self) -> usize {
        match self {
            Side::Front => 0,
            Side::Back => 1,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(Side::Front),
            "back" => Ok(Side::Back),
            other => Err(format!("unknown side '{other}' (expected front or back)")),
        }
    }
}

/// Token stamped on a slot's contents; every upload or removal advances it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Sent by a background-removal worker back to the frame context.
#[derive(Debug)]
pub struct JobEvent {
    pub side: Side,
    pub generation: Generation,
    /// Distinguishes a retry from an earlier, abandoned call on the same design.
    pub job_id: u64,
    pub kind: JobEventKind,
}

#[derive(Debug)]
pub enum JobEventKind {
    /// Engine-reported `(current, total)` progress.
    Progress { current: u32, total: u32 },
    Finished(Result<DesignImage, EngineError>),
}

/// Change notifications for the render loop and the surrounding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    SlotChanged(Side),
    Progress { side: Side, percent: u8 },
    GarmentChanged,
}
