//! Fixed facts about a single-zero wheel: pocket colors and parity.

use serde::{Deserialize, Serialize};

/// Highest pocket number on a single-zero wheel.
pub const MAX_POCKET: u8 = 36;

/// Red pockets. Every other non-zero pocket is black.
const RED_POCKETS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    /// Color of a pocket. Returns `None` for values off the wheel.
    pub fn of(value: u8) -> Option<Color> {
        match value {
            0 => Some(Color::Green),
            v if v > MAX_POCKET => None,
            v if RED_POCKETS.contains(&v) => Some(Color::Red),
            _ => Some(Color::Black),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::Green => "green",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    /// Parity of a pocket. Zero has no parity for betting purposes.
    pub fn of(value: u8) -> Option<Parity> {
        match value {
            0 => None,
            v if v % 2 == 0 => Some(Parity::Even),
            _ => Some(Parity::Odd),
        }
    }

    pub fn opposite(self) -> Parity {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
        }
    }

    pub fn parse(s: &str) -> Option<Parity> {
        match s {
            "even" => Some(Parity::Even),
            "odd" => Some(Parity::Odd),
            _ => None,
        }
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `value` is a pocket on the wheel.
pub fn is_pocket(value: u8) -> bool {
    value <= MAX_POCKET
}
