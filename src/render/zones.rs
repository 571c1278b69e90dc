use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrintLocation {
    #[default]
    None,
    LeftChest,
    FullFront,
    FullBack,
}

impl PrintLocation {
    const ALL: [Self; 4] = [Self::None, Self::LeftChest, Self::FullFront, Self::FullBack];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LeftChest => "left-chest",
            Self::FullFront => "full-front",
            Self::FullBack => "full-back",
        }
    }

    /// Whether the location can be selected for `side`.
    pub fn allowed_on(self, side: Side) -> bool {
        match (self, side) {
            (Self::None, _) => true,
            (Self::LeftChest | Self::FullFront, Side::Front) => true,
            (Self::FullBack, Side::Back) => true,
            _ => false,
        }
    }

    pub fn zone(self) -> Option<&'static PrintZone> {
        match self {
            Self::None => None,
            Self::LeftChest => Some(&LEFT_CHEST),
            Self::FullFront => Some(&FULL_FRONT),
            Self::FullBack => Some(&FULL_BACK),
        }
    }
}

impl fmt::Display for PrintLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|loc| loc.as_str() == s)
            .ok_or_else(|| format!("unknown print location `{s}`"))
    }
}

/// Bounding box as percent (0-100) of the garment image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneBounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ZoneBounds {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrintZone {
    pub label: &'static str,
    pub bounds: ZoneBounds,
}

static LEFT_CHEST: PrintZone = PrintZone {
    label: "Left Chest",
    bounds: ZoneBounds {
        x: 28.0,
        y: 28.0,
        w: 18.0,
        h: 18.0,
    },
};

static FULL_FRONT: PrintZone = PrintZone {
    label: "Full Front",
    bounds: ZoneBounds {
        x: 25.0,
        y: 25.0,
        w: 50.0,
        h: 50.0,
    },
};

static FULL_BACK: PrintZone = PrintZone {
    label: "Full Back",
    bounds: ZoneBounds {
        x: 25.0,
        y: 25.0,
        w: 50.0,
        h: 50.0,
    },
};
