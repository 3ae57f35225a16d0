use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion status of an assignment as reported (or not) by its LMS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Complete,
    Incomplete,
    #[default]
    Unknown,
}

impl Completion {
    /// Numeric code used by the storage/display layer: 1 done, 0 todo, -1 unknown.
    pub fn as_code(&self) -> i8 {
        match self {
            Self::Complete => 1,
            Self::Incomplete => 0,
            Self::Unknown => -1,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Self::Complete),
            0 => Some(Self::Incomplete),
            -1 => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete => "done",
            Self::Incomplete => "todo",
            Self::Unknown => "?",
        }
    }
}

/// A to-do entry representing one assignment from either LMS.
///
/// Items are immutable after construction: adapters build them from remote
/// records, hand them to the store, and keep no reference afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub class_name: String,
    pub description: String,
    pub url: String,
    /// Due date, or the load time when the source had none.
    pub date: DateTime<Utc>,
    pub completed: Completion,
}

impl Item {
    pub fn new(
        name: impl Into<String>,
        class_name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        date: DateTime<Utc>,
        completed: Completion,
    ) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            description: description.into(),
            url: url.into(),
            date,
            completed,
        }
    }
}
