//! Matching engine
//!
//! Pure functions that rank a candidate value or type against a target and
//! aggregate per-parameter ranks into a member score. Nothing here touches
//! shared state.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::{InjectionValue, MatchRank, Type, matching};
//!
//! let int = Type::value("i32");
//! let five = InjectionValue::instance(&int, 5i32);
//!
//! assert_eq!(matching::rank_value(&five, &int), MatchRank::ExactMatch);
//! assert_eq!(matching::rank_value(&InjectionValue::Null, &int), MatchRank::NoMatch);
//! ```

use crate::member::{InjectionTarget, Member};
use crate::{InjectionValue, MatchRank, Type};

/// Aggregate score of supplied data against a member's parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScore {
    /// Arity differs or some parameter did not match
    NoMatch,
    /// Every parameter scored `ExactMatch`
    Perfect,
    /// Sum of the individual ranks; only used to break ties
    Ranked(i32),
}

impl MatchScore {
    #[inline]
    pub fn is_match(self) -> bool {
        !matches!(self, MatchScore::NoMatch)
    }

    /// `-1` for no match, `0` for perfect, otherwise the raw sum.
    pub fn value(self) -> i32 {
        match self {
            MatchScore::NoMatch => -1,
            MatchScore::Perfect => 0,
            MatchScore::Ranked(sum) => sum,
        }
    }
}

/// Type-to-type rule.
pub fn rank_type(ty: &Type, target: &Type) -> MatchRank {
    if target.is_meta() {
        return MatchRank::ExactMatch;
    }

    if ty == target || target.nullable_underlying() == Some(ty) {
        return MatchRank::HigherProspect;
    }

    if target.is_assignable_from(ty) {
        return MatchRank::Compatible;
    }

    if ty.is_any_array() && target.is_array() {
        return MatchRank::HigherProspect;
    }

    // An open definition stands in for any of its closed instantiations
    if ty.is_generic_definition()
        && target.is_generic()
        && target.generic_type_definition().as_ref() == Some(ty)
    {
        return MatchRank::ExactMatch;
    }

    MatchRank::NoMatch
}

/// Rank an array whose concrete type is `array_type`.
pub fn rank_array(array_type: &Type, target: &Type) -> MatchRank {
    if array_type == target {
        return MatchRank::ExactMatch;
    }

    if target.is_any_array() {
        return MatchRank::HigherProspect;
    }

    if target.is_assignable_from(array_type) {
        MatchRank::Compatible
    } else {
        MatchRank::NoMatch
    }
}

/// Rank a candidate value against a bare type.
pub fn rank_value(value: &InjectionValue, target: &Type) -> MatchRank {
    if target.is_meta() {
        return MatchRank::ExactMatch;
    }

    match value {
        InjectionValue::Null => rank_absence(target),
        InjectionValue::Array(array) => rank_array(array.array_type(), target),
        InjectionValue::Parameter(parameter) => parameter.rank_type(target),
        InjectionValue::Type(ty) => rank_type(ty, target),
        InjectionValue::Resolver(_) | InjectionValue::Factory(_) => MatchRank::HigherProspect,
        InjectionValue::Instance(instance) => rank_runtime_type(instance.ty(), target),
    }
}

/// Rank a candidate value against a parameter, field or property in its
/// declaring context, so value objects can take the context into account.
pub fn rank_value_for(value: &InjectionValue, target: &InjectionTarget<'_>) -> MatchRank {
    if target.ty.is_meta() {
        return MatchRank::ExactMatch;
    }

    match value {
        InjectionValue::Parameter(parameter) => parameter.rank_target(target),
        other => rank_value(other, target.ty),
    }
}

#[inline]
fn rank_absence(target: &Type) -> MatchRank {
    if target.accepts_absence() {
        MatchRank::ExactMatch
    } else {
        MatchRank::NoMatch
    }
}

#[inline]
fn rank_runtime_type(ty: &Type, target: &Type) -> MatchRank {
    if ty == target {
        MatchRank::ExactMatch
    } else if target.is_assignable_from(ty) {
        MatchRank::Compatible
    } else {
        MatchRank::NoMatch
    }
}

/// Score `data` against the parameters of `member`.
///
/// Lengths must agree exactly and every parameter must match; the score is
/// [`MatchScore::Perfect`] only when every parameter is an exact match.
pub fn match_data(data: &[InjectionValue], member: &Member) -> MatchScore {
    let targets = member.targets();
    if data.len() != targets.len() {
        return MatchScore::NoMatch;
    }

    let mut sum = 0;
    for (value, target) in data.iter().zip(&targets) {
        let rank = rank_value_for(value, target);
        if !rank.is_match() {
            return MatchScore::NoMatch;
        }
        sum += rank.value();
    }

    if sum == MatchRank::ExactMatch.value() * targets.len() as i32 {
        MatchScore::Perfect
    } else {
        MatchScore::Ranked(sum)
    }
}

/// Comma separated description of supplied data, used in diagnostics.
pub fn signature(data: &[InjectionValue]) -> String {
    data.iter()
        .map(InjectionValue::describe)
        .collect::<Vec<_>>()
        .join(", ")
}
