//! Identifiers shared by the sensor, audio and session layers

use std::fmt;

use serde::{Deserialize, Serialize};

pub use toyconf::SLOT_COUNT;

/// Index of a foreground slot, always `< SLOT_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(u8);

impl SlotId {
    /// Returns `None` for indices outside the installation
    pub fn new(index: usize) -> Option<Self> {
        (index < SLOT_COUNT).then(|| Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All slots in order
    pub fn all() -> impl Iterator<Item = SlotId> {
        (0..SLOT_COUNT as u8).map(SlotId)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Humans count slots from one
        write!(f, "slot {}", self.0 + 1)
    }
}

/// One half of the ambience bed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

/// Logical id of a playable asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackId {
    Foreground(SlotId),
    Background(Side),
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Foreground(slot) => write!(f, "track {}", slot.index() + 1),
            TrackId::Background(Side::A) => f.write_str("bed a"),
            TrackId::Background(Side::B) => f.write_str("bed b"),
        }
    }
}

/// Electrical level of a trigger line. Lines idle HIGH through a pull-up;
/// an inserted object pulls its line LOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// Object present on the slot
    pub fn is_occupied(self) -> bool {
        self == Level::Low
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::High => f.write_str("HIGH"),
            Level::Low => f.write_str("LOW"),
        }
    }
}
