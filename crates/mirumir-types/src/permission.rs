use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access level a user holds on a board.
///
/// Levels are totally ordered: `View < Edit < Owner`. `Owner` is never
/// stored as a grant; it is derived from the board's creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Edit,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub fn rank(self) -> u8 {
        match self {
            Self::View => 1,
            Self::Edit => 2,
            Self::Owner => 3,
        }
    }

    /// True when holding `self` is enough for an operation that needs `required`.
    pub fn satisfies(self, required: Permission) -> bool {
        self.rank() >= required.rank()
    }

    /// Only `View` and `Edit` can be handed out through sharing.
    pub fn is_grantable(self) -> bool {
        !matches!(self, Self::Owner)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Owner => "owner",
        }
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "owner" => Ok(Self::Owner),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}
