//! Member selector
//!
//! Walks the members a type declares and picks the one configured data
//! should be injected through. Two modes:
//!
//! - [`SelectionMode::Fast`] returns the first eligible member that matches.
//! - [`SelectionMode::Validating`] scores every candidate and fails loudly on
//!   ambiguity instead of silently taking the first hit.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::{
//!     InjectionValue, Member, MemberKind, MetadataRegistry, SelectionMode, Type, selection,
//! };
//!
//! let int = Type::value("i32");
//! let string = Type::class("String");
//! let service = Type::class("Service");
//!
//! let registry = MetadataRegistry::new();
//! registry.add(Member::constructor(&service).param("a", &int).build());
//! registry.add(Member::constructor(&service).param("a", &int).param("b", &string).build());
//!
//! let data = [
//!     InjectionValue::instance(&int, 5i32),
//!     InjectionValue::instance(&string, String::from("x")),
//! ];
//! let ctor = selection::select(
//!     &registry, &service, MemberKind::Constructor, None, &data, SelectionMode::Validating,
//! )
//! .unwrap();
//! assert_eq!(ctor.parameters().len(), 2);
//! ```

use crate::matching::{MatchScore, match_data, signature};
use crate::member::{Member, MemberKind};
use crate::metadata::TypeMetadata;
use crate::{InjectionValue, ResolutionError, Result, Type};

#[cfg(feature = "logging")]
use tracing::debug;

/// How thoroughly the selector checks its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionMode {
    /// First eligible match wins; no ambiguity diagnostics
    #[default]
    Fast,
    /// Every candidate is scored; ambiguity is an error
    Validating,
}

/// Members of `kind` (and `name`, if given) considered for selection.
///
/// Constructors are always drawn from the eligible set. In validating mode
/// methods, fields and properties are drawn from every declared member so
/// an ineligible winner can be reported at bind time instead of vanishing.
pub fn candidates(
    metadata: &dyn TypeMetadata,
    ty: &Type,
    kind: MemberKind,
    name: Option<&str>,
    mode: SelectionMode,
) -> Vec<Member> {
    let members = match (mode, kind, name) {
        (SelectionMode::Validating, MemberKind::Constructor, _) | (SelectionMode::Fast, _, _) => {
            metadata.supported_members(ty, kind)
        }
        (SelectionMode::Validating, _, Some(name)) => metadata.members_named(ty, kind, name),
        (SelectionMode::Validating, _, None) => metadata
            .declared_members(ty)
            .into_iter()
            .filter(|member| member.kind() == kind)
            .collect(),
    };

    match name {
        Some(name) => members
            .into_iter()
            .filter(|member| member.name() == name)
            .collect(),
        None => members,
    }
}

/// Score one candidate against the configured data.
///
/// Fields and properties are selected by name alone; their data is checked
/// against the member type when the member is bound. A named method with no
/// data is likewise matched by name and resolves its parameters by type.
pub fn score(member: &Member, name: Option<&str>, data: &[InjectionValue]) -> MatchScore {
    match member.kind() {
        MemberKind::Field | MemberKind::Property => MatchScore::Perfect,
        MemberKind::Method if name.is_some() && data.is_empty() => MatchScore::Perfect,
        MemberKind::Constructor | MemberKind::Method => match_data(data, member),
    }
}

/// Pick one member of `candidates` for `data`.
pub fn select_from(
    candidates: &[Member],
    ty: &Type,
    kind: MemberKind,
    name: Option<&str>,
    data: &[InjectionValue],
    mode: SelectionMode,
) -> Result<Member> {
    let selected = match mode {
        SelectionMode::Fast => candidates
            .iter()
            .find(|member| score(member, name, data).is_match())
            .cloned(),
        SelectionMode::Validating => validate_unique(candidates, ty, kind, name, data)?,
    };

    match selected {
        Some(member) => {
            #[cfg(feature = "logging")]
            debug!(
                target: "dependency_resolver",
                target_type = ty.name(),
                member = %member.signature(),
                mode = ?mode,
                "Selected member"
            );
            Ok(member)
        }
        None => {
            let attempted = describe(kind, name, data);
            #[cfg(feature = "logging")]
            debug!(
                target: "dependency_resolver",
                target_type = ty.name(),
                member = %attempted,
                candidates = candidates.len(),
                "No member matched"
            );
            Err(ResolutionError::no_match(ty.name(), attempted))
        }
    }
}

/// Enumerate and select in one step.
pub fn select(
    metadata: &dyn TypeMetadata,
    ty: &Type,
    kind: MemberKind,
    name: Option<&str>,
    data: &[InjectionValue],
    mode: SelectionMode,
) -> Result<Member> {
    let candidates = candidates(metadata, ty, kind, name, mode);
    select_from(&candidates, ty, kind, name, data, mode)
}

/// Constructor used when a registration configures none: the eligible
/// constructor with the most parameters. Two such constructors are
/// ambiguous.
pub fn select_default_constructor(metadata: &dyn TypeMetadata, ty: &Type) -> Result<Member> {
    let constructors = metadata.supported_members(ty, MemberKind::Constructor);
    let longest = constructors
        .iter()
        .map(|ctor| ctor.parameters().len())
        .max()
        .ok_or_else(|| ResolutionError::no_match(ty.name(), ".ctor(..)"))?;

    let mut widest = constructors
        .into_iter()
        .filter(|ctor| ctor.parameters().len() == longest);

    match (widest.next(), widest.next()) {
        (Some(ctor), None) => Ok(ctor),
        (Some(ctor), Some(_)) => Err(ResolutionError::ambiguous(ty.name(), ctor.signature())),
        (None, _) => Err(ResolutionError::no_match(ty.name(), ".ctor(..)")),
    }
}

fn validate_unique(
    candidates: &[Member],
    ty: &Type,
    kind: MemberKind,
    name: Option<&str>,
    data: &[InjectionValue],
) -> Result<Option<Member>> {
    let scored: Vec<(MatchScore, &Member)> = candidates
        .iter()
        .map(|member| (score(member, name, data), member))
        .filter(|(score, _)| score.is_match())
        .collect();

    let mut perfect = scored
        .iter()
        .filter(|(score, _)| *score == MatchScore::Perfect)
        .map(|(_, member)| *member);

    if let Some(first) = perfect.next() {
        if perfect.next().is_some() {
            return Err(ambiguity(ty, kind, name, data));
        }
        return Ok(Some(first.clone()));
    }

    // No perfect match: the best imperfect score wins, ties are ambiguous
    let Some(best) = scored.iter().map(|(score, _)| score.value()).max() else {
        return Ok(None);
    };

    let mut top = scored
        .iter()
        .filter(|(score, _)| score.value() == best)
        .map(|(_, member)| *member);

    match (top.next(), top.next()) {
        (Some(member), None) => Ok(Some(member.clone())),
        (Some(_), Some(_)) => Err(ambiguity(ty, kind, name, data)),
        (None, _) => Ok(None),
    }
}

fn ambiguity(ty: &Type, kind: MemberKind, name: Option<&str>, data: &[InjectionValue]) -> ResolutionError {
    let attempted = describe(kind, name, data);

    #[cfg(feature = "logging")]
    debug!(
        target: "dependency_resolver",
        target_type = ty.name(),
        member = %attempted,
        "Ambiguous member selection"
    );

    ResolutionError::ambiguous(ty.name(), attempted)
}

/// Attempted signature for diagnostics, e.g. `.ctor(i32, String)`.
fn describe(kind: MemberKind, name: Option<&str>, data: &[InjectionValue]) -> String {
    match kind {
        MemberKind::Constructor => format!(".ctor({})", signature(data)),
        MemberKind::Method => format!("{}({})", name.unwrap_or("method"), signature(data)),
        MemberKind::Field | MemberKind::Property => format!("{kind} {}", name.unwrap_or("?")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Visibility;
    use crate::metadata::MetadataRegistry;

    struct Fixture {
        registry: MetadataRegistry,
        service: Type,
        int: Type,
        string: Type,
    }

    fn fixture() -> Fixture {
        let registry = MetadataRegistry::new();
        let service = Type::class("Service");
        let int = Type::value("i32");
        let string = Type::class("String");

        registry.add(Member::constructor(&service).param("a", &int).build());
        registry.add(
            Member::constructor(&service)
                .param("a", &int)
                .param("b", &string)
                .build(),
        );

        Fixture {
            registry,
            service,
            int,
            string,
        }
    }

    fn five(f: &Fixture) -> InjectionValue {
        InjectionValue::instance(&f.int, 5i32)
    }

    #[test]
    fn test_validating_picks_unique_perfect_match() {
        let f = fixture();
        let data = [five(&f), InjectionValue::instance(&f.string, String::from("x"))];

        let ctor = select(
            &f.registry,
            &f.service,
            MemberKind::Constructor,
            None,
            &data,
            SelectionMode::Validating,
        )
        .unwrap();
        assert_eq!(ctor.signature(), ".ctor(i32, String)");

        let ctor = select(
            &f.registry,
            &f.service,
            MemberKind::Constructor,
            None,
            &[five(&f)],
            SelectionMode::Validating,
        )
        .unwrap();
        assert_eq!(ctor.signature(), ".ctor(i32)");
    }

    #[test]
    fn test_validating_reports_no_match_with_signature() {
        let f = fixture();
        let err = select(
            &f.registry,
            &f.service,
            MemberKind::Constructor,
            None,
            &[InjectionValue::instance(&f.string, String::new())],
            SelectionMode::Validating,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ResolutionError::NoMatchFound {
                type_name: "Service".into(),
                member: ".ctor(String)".into(),
            }
        );
    }

    #[test]
    fn test_validating_reports_ambiguous_perfect_matches() {
        let f = fixture();
        f.registry
            .add(Member::constructor(&f.service).param("b", &f.int).build());

        let err = select(
            &f.registry,
            &f.service,
            MemberKind::Constructor,
            None,
            &[five(&f)],
            SelectionMode::Validating,
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::AmbiguousMatch { .. }));
    }

    #[test]
    fn test_fast_mode_returns_first_hit() {
        let f = fixture();
        let duplicate = Member::constructor(&f.service).param("b", &f.int).build();
        f.registry.add(duplicate.clone());

        let ctor = select(
            &f.registry,
            &f.service,
            MemberKind::Constructor,
            None,
            &[five(&f)],
            SelectionMode::Fast,
        )
        .unwrap();
        assert_ne!(ctor, duplicate);
        assert_eq!(ctor.parameters()[0].name(), "a");
    }

    #[test]
    fn test_perfect_match_beats_higher_imperfect_sum() {
        let registry = MetadataRegistry::new();
        let service = Type::class("Service");
        let base = Type::interface("IBase");
        let derived = Type::builder("Derived").extends(&base).build();

        let exact = Member::constructor(&service).param("d", &derived).build();
        registry.add(Member::constructor(&service).param("b", &base).build());
        registry.add(exact.clone());

        let data = [InjectionValue::instance(&derived, ())];
        let ctor = select(
            &registry,
            &service,
            MemberKind::Constructor,
            None,
            &data,
            SelectionMode::Validating,
        )
        .unwrap();
        assert_eq!(ctor, exact);
    }

    #[test]
    fn test_imperfect_tie_is_ambiguous() {
        let registry = MetadataRegistry::new();
        let service = Type::class("Service");
        let a = Type::interface("IA");
        let b = Type::interface("IB");
        let both = Type::builder("Both").extends(&a).extends(&b).build();

        registry.add(Member::constructor(&service).param("a", &a).build());
        registry.add(Member::constructor(&service).param("b", &b).build());

        let data = [InjectionValue::instance(&both, ())];
        let err = select(
            &registry,
            &service,
            MemberKind::Constructor,
            None,
            &data,
            SelectionMode::Validating,
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::AmbiguousMatch { .. }));

        // Fast mode does not diagnose the tie
        assert!(
            select(&registry, &service, MemberKind::Constructor, None, &data, SelectionMode::Fast)
                .is_ok()
        );
    }

    #[test]
    fn test_named_method_without_data_matches_by_name() {
        let registry = MetadataRegistry::new();
        let service = Type::class("Service");
        let int = Type::value("i32");
        let init = Member::method(&service, "Init").param("x", &int).build();
        registry.add(init.clone());
        registry.add(Member::method(&service, "Other").build());

        for mode in [SelectionMode::Fast, SelectionMode::Validating] {
            let method =
                select(&registry, &service, MemberKind::Method, Some("Init"), &[], mode).unwrap();
            assert_eq!(method, init);
        }
    }

    #[test]
    fn test_validating_sees_ineligible_members() {
        let registry = MetadataRegistry::new();
        let service = Type::class("Service");
        let hidden = Member::method(&service, "Hidden")
            .visibility(Visibility::Private)
            .build();
        registry.add(hidden.clone());

        let fast = select(&registry, &service, MemberKind::Method, Some("Hidden"), &[], SelectionMode::Fast);
        assert!(matches!(fast, Err(ResolutionError::NoMatchFound { .. })));

        let validating = select(
            &registry,
            &service,
            MemberKind::Method,
            Some("Hidden"),
            &[],
            SelectionMode::Validating,
        )
        .unwrap();
        assert_eq!(validating, hidden);
    }

    #[test]
    fn test_default_constructor_is_longest() {
        let f = fixture();
        let ctor = select_default_constructor(&f.registry, &f.service).unwrap();
        assert_eq!(ctor.parameters().len(), 2);

        f.registry.add(
            Member::constructor(&f.service)
                .param("x", &f.string)
                .param("y", &f.int)
                .build(),
        );
        assert!(matches!(
            select_default_constructor(&f.registry, &f.service),
            Err(ResolutionError::AmbiguousMatch { .. })
        ));

        assert!(matches!(
            select_default_constructor(&f.registry, &Type::class("Empty")),
            Err(ResolutionError::NoMatchFound { .. })
        ));
    }
}
