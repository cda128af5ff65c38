//! Perch state mapping
//!
//! Translates raw sensor codes into behavioral states using the run's
//! category assignment. Mapping is a pure function of its inputs.

use crate::sensor::{Perch, RawCode};
use perchbox_common::{Setting, SettingLetter};
use std::fmt;

/// Audio stimulus category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    A,
    B,
}

/// Behavioral state derived from one sensor code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticState {
    /// No perch occupied
    Free,
    /// Occupying the silent perch
    Silent,
    CategoryA,
    CategoryB,
    /// Unrecognized sensor code; never playable
    Unknown,
}

impl SemanticState {
    /// Stimulus category played in this state, if any
    pub fn category(self) -> Option<Category> {
        match self {
            SemanticState::CategoryA => Some(Category::A),
            SemanticState::CategoryB => Some(Category::B),
            _ => None,
        }
    }

    pub fn is_playable(self) -> bool {
        self.category().is_some()
    }
}

impl From<Category> for SemanticState {
    fn from(category: Category) -> Self {
        match category {
            Category::A => SemanticState::CategoryA,
            Category::B => SemanticState::CategoryB,
        }
    }
}

impl fmt::Display for SemanticState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticState::Free => "free",
            SemanticState::Silent => "silent",
            SemanticState::CategoryA => "category-a",
            SemanticState::CategoryB => "category-b",
            SemanticState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Which state each perch position stands for during a run
///
/// Built from a validated [`Setting`], so it is always a permutation of
/// Silent, CategoryA and CategoryB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryAssignment {
    perches: [SemanticState; 3],
}

impl CategoryAssignment {
    pub fn from_setting(setting: Setting) -> Self {
        let perches = setting.letters().map(|letter| match letter {
            SettingLetter::Silent => SemanticState::Silent,
            SettingLetter::A => SemanticState::CategoryA,
            SettingLetter::B => SemanticState::CategoryB,
        });
        Self { perches }
    }

    /// State bound to a perch
    pub fn state_for(&self, perch: Perch) -> SemanticState {
        self.perches[perch.index()]
    }

    /// Perch bound to a state
    pub fn perch_of(&self, state: SemanticState) -> Option<Perch> {
        Perch::all().into_iter().find(|p| self.state_for(*p) == state)
    }
}

/// Map a raw sensor code to a behavioral state
pub fn map(code: &RawCode, assignment: &CategoryAssignment) -> SemanticState {
    match code {
        RawCode::NoPerch => SemanticState::Free,
        RawCode::Perch(perch) => assignment.state_for(*perch),
        RawCode::Unrecognized(_) => SemanticState::Unknown,
    }
}

/// Names written to the transition log for each state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLabels {
    pub a: String,
    pub b: String,
}

impl StateLabels {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    pub fn label(&self, state: SemanticState) -> &str {
        match state {
            SemanticState::Free => "free",
            SemanticState::Silent => "silent",
            SemanticState::CategoryA => &self.a,
            SemanticState::CategoryB => &self.b,
            SemanticState::Unknown => "unknown",
        }
    }
}
