//! Action bitmask encoding.
//!
//! Every tick collapses the held inputs into a single [`ActionCode`]:
//!
//! | bit | value | input  |
//! |-----|-------|--------|
//! | 0   | 1     | LEFT   |
//! | 1   | 2     | RIGHT  |
//! | 2   | 4     | JUMP   |
//! | 3   | 8     | ACTION |
//! | 4   | 16    | DOWN   |
//!
//! LEFT and RIGHT are mutually exclusive: RIGHT is only encoded when LEFT is
//! not held, and decoding applies the same precedence so a foreign log with
//! both bits set still displays as LEFT.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Label reported when no input bit is set.
pub const NONE_LABEL: &str = "NONE";

/// Decoded labels for one action code (never more than four).
pub type ActionLabels = SmallVec<[&'static str; 4]>;

bitflags::bitflags! {
    /// Compact per-tick input encoding.
    ///
    /// Unknown bits are retained so codes read back from foreign logs keep
    /// their raw value; decoding only examines the five known bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
    pub struct ActionCode: u32 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const JUMP = 1 << 2;
        const ACTION = 1 << 3;
        const DOWN = 1 << 4;
    }
}

// Manual serde implementation: manifests store the raw integer
impl Serialize for ActionCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActionCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(ActionCode::from_bits_retain(bits))
    }
}

/// Raw input signals sampled from the game loop for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub action: bool,
    pub down: bool,
}

impl ActionCode {
    /// Encode held inputs. LEFT wins over RIGHT.
    pub fn encode(input: &InputState) -> Self {
        let mut code = ActionCode::empty();

        if input.left {
            code |= ActionCode::LEFT;
        } else if input.right {
            code |= ActionCode::RIGHT;
        }
        if input.jump {
            code |= ActionCode::JUMP;
        }
        if input.action {
            code |= ActionCode::ACTION;
        }
        if input.down {
            code |= ActionCode::DOWN;
        }

        code
    }

    /// Decode into display labels, in bit order.
    ///
    /// Total over every `u32`: bits above DOWN are ignored, and a code with
    /// no known bit set decodes to `["NONE"]`.
    pub fn labels(self) -> ActionLabels {
        let mut labels = ActionLabels::new();

        if self.contains(ActionCode::LEFT) {
            labels.push("LEFT");
        } else if self.contains(ActionCode::RIGHT) {
            labels.push("RIGHT");
        }
        if self.contains(ActionCode::JUMP) {
            labels.push("JUMP");
        }
        if self.contains(ActionCode::ACTION) {
            labels.push("ACTION");
        }
        if self.contains(ActionCode::DOWN) {
            labels.push("DOWN");
        }

        if labels.is_empty() {
            labels.push(NONE_LABEL);
        }
        labels
    }

    /// Binary rendering stored in `action_binary` (`0b101`, `0b0`).
    pub fn binary(self) -> String {
        format!("{:#b}", self.bits())
    }

    /// Codes produced by holding exactly one input, with their labels.
    pub fn single_inputs() -> [(ActionCode, &'static str); 5] {
        let held = |f: fn(&mut InputState)| {
            let mut input = InputState::default();
            f(&mut input);
            ActionCode::encode(&input)
        };
        [
            (held(|i| i.left = true), "LEFT"),
            (held(|i| i.right = true), "RIGHT"),
            (held(|i| i.jump = true), "JUMP"),
            (held(|i| i.action = true), "ACTION"),
            (held(|i| i.down = true), "DOWN"),
        ]
    }
}

impl std::fmt::Display for ActionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Encode held inputs into an action code.
pub fn encode(input: &InputState) -> ActionCode {
    ActionCode::encode(input)
}

/// Decode an action code into display labels.
pub fn decode(code: ActionCode) -> ActionLabels {
    code.labels()
}
