use serde::{Deserialize, Serialize};
use std::fmt;

/// The reserved word marking "end of scene" wherever a next-dialogue is expected.
pub const TERMINAL: &str = "end";

/// Words the script language reserves. None of them may be used as an identifier.
pub const RESERVED: &[&str] = &[
    "create", "update", "delete", "scene", "dialogue", "action", TERMINAL,
];

/// Returns true if `s` can be used as a scene, dialogue, or action identifier.
///
/// Identifiers are non-empty runs of ASCII alphanumerics or underscores and
/// never one of the [`RESERVED`] words.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED.contains(&s)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Newtype wrapper for scene identifiers.
    SceneId
);
string_id!(
    /// Newtype wrapper for dialogue identifiers.
    DialogueId
);
string_id!(
    /// Newtype wrapper for action identifiers.
    ActionId
);

/// Where an action leads: another dialogue, or the end of the scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NextDialogue {
    Dialogue(DialogueId),
    End,
}

impl NextDialogue {
    /// Parses a raw next-dialogue value. `end` is the terminal sentinel;
    /// anything else must be a legal identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == TERMINAL {
            Some(Self::End)
        } else if is_valid_identifier(raw) {
            Some(Self::Dialogue(DialogueId::new(raw)))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Dialogue(id) => id.as_str(),
            Self::End => TERMINAL,
        }
    }

    pub fn dialogue(&self) -> Option<&DialogueId> {
        match self {
            Self::Dialogue(id) => Some(id),
            Self::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NextDialogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DialogueId> for NextDialogue {
    fn from(id: DialogueId) -> Self {
        Self::Dialogue(id)
    }
}

impl Serialize for NextDialogue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NextDialogue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NextDialogue::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "'{}' is neither a dialogue identifier nor '{}'",
                raw, TERMINAL
            ))
        })
    }
}

/// Formats an auto-assigned identifier: decimal, zero-padded to `width`.
pub fn format_auto_id(n: u64, width: usize) -> String {
    format!("{:0width$}", n, width = width)
}

/// Numeric value of an identifier made only of decimal digits.
///
/// `"0007"`, `"07"` and `"7"` all map to 7, so auto-assignment can skip every
/// spelling of a number that is already taken.
pub fn numeric_value(id: &str) -> Option<u64> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}
