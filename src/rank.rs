//! Compatibility scale shared by matching, selection and overrides

use std::fmt;

/// How well a value or type matches a target.
///
/// Ordered `NoMatch < Compatible < HigherProspect < ExactMatch`; the
/// discriminants are the weights summed into a member score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum MatchRank {
    /// No match
    NoMatch = -1,
    /// The value is assignable
    Compatible = 1,
    /// High probability of a match
    HigherProspect = 2,
    /// Value matches exactly
    ExactMatch = 3,
}

impl MatchRank {
    /// Numeric weight of this rank.
    #[inline]
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// True for anything but `NoMatch`.
    #[inline]
    pub const fn is_match(self) -> bool {
        !matches!(self, MatchRank::NoMatch)
    }
}

impl fmt::Display for MatchRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchRank::NoMatch => "NoMatch",
            MatchRank::Compatible => "Compatible",
            MatchRank::HigherProspect => "HigherProspect",
            MatchRank::ExactMatch => "ExactMatch",
        };
        f.write_str(name)
    }
}
