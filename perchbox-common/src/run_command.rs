//! Run command parsing
//!
//! The operator starts a run with a command of the form
//! `Subject_Trial_SETTING`, e.g. `Woody_02_ASB`. SETTING assigns one of
//! Silent (`S`), stimulus A (`A`) or stimulus B (`B`) to perches 1, 2 and 3
//! in order, and must use each letter exactly once. The whole command also
//! names the run's log file.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One letter of a perch setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingLetter {
    /// `S`: no audio on this perch
    Silent,
    /// `A`: stimulus category A
    A,
    /// `B`: stimulus category B
    B,
}

impl SettingLetter {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'S' => Some(SettingLetter::Silent),
            'A' => Some(SettingLetter::A),
            'B' => Some(SettingLetter::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            SettingLetter::Silent => 'S',
            SettingLetter::A => 'A',
            SettingLetter::B => 'B',
        }
    }
}

/// Validated perch setting: a permutation of `S`, `A`, `B`
///
/// Index 0 is perch 1, index 2 is perch 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    letters: [SettingLetter; 3],
}

impl Setting {
    /// Letters in perch order
    pub fn letters(&self) -> [SettingLetter; 3] {
        self.letters
    }

    /// All six valid settings
    pub fn all() -> [Setting; 6] {
        use SettingLetter::*;
        [
            [Silent, A, B],
            [Silent, B, A],
            [A, Silent, B],
            [A, B, Silent],
            [B, Silent, A],
            [B, A, Silent],
        ]
        .map(|letters| Setting { letters })
    }
}

impl FromStr for Setting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 3 {
            return Err(Error::InvalidInput(format!(
                "setting '{}' must be exactly three letters using S, A and B once each",
                s
            )));
        }

        let mut letters = [SettingLetter::Silent; 3];
        for (slot, c) in letters.iter_mut().zip(chars) {
            *slot = SettingLetter::from_char(c).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "setting '{}' contains '{}'; only S, A, B allowed",
                    s, c
                ))
            })?;
        }

        for letter in [SettingLetter::Silent, SettingLetter::A, SettingLetter::B] {
            let count = letters.iter().filter(|l| **l == letter).count();
            if count != 1 {
                return Err(Error::InvalidInput(format!(
                    "setting '{}' must use '{}' exactly once",
                    s,
                    letter.as_char()
                )));
            }
        }

        Ok(Self { letters })
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in self.letters {
            write!(f, "{}", letter.as_char())?;
        }
        Ok(())
    }
}

/// Parsed operator run command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    raw: String,
    subject: String,
    trial: String,
    setting: Setting,
}

impl RunCommand {
    /// Subject (animal) name
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Trial identifier
    pub fn trial(&self) -> &str {
        &self.trial
    }

    /// Perch setting
    pub fn setting(&self) -> Setting {
        self.setting
    }

    /// Command as entered
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// File name of this run's transition log
    pub fn log_file_name(&self) -> String {
        format!("{}.csv", self.raw)
    }
}

impl FromStr for RunCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.contains(['/', '\\']) || raw.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "run command '{}' must not contain path separators or spaces",
                raw
            )));
        }

        let parts: Vec<&str> = raw.split('_').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidInput(format!(
                "run command '{}' must look like Subject_Trial_SETTING (e.g. Woody_02_ASB)",
                raw
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            subject: parts[0].to_string(),
            trial: parts[1].to_string(),
            setting: parts[2].parse()?,
        })
    }
}
