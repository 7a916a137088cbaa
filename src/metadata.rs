//! Type metadata provider
//!
//! Member discovery is an interface: the selector asks a [`TypeMetadata`]
//! for the members a type declares and applies the eligibility filters in
//! this module. [`MetadataRegistry`] is the in-memory implementation, a
//! `DashMap` keyed by type so readers never block each other.

use crate::member::{Member, MemberKind, Visibility};
use crate::Type;
use ahash::RandomState;
use dashmap::DashMap;

#[cfg(feature = "logging")]
use tracing::trace;

/// Source of declared members for a type.
pub trait TypeMetadata: Send + Sync {
    /// Every member `ty` declares, eligible or not.
    fn declared_members(&self, ty: &Type) -> Vec<Member>;

    /// Declared members of one kind that pass the eligibility filter.
    fn supported_members(&self, ty: &Type, kind: MemberKind) -> Vec<Member> {
        self.declared_members(ty)
            .into_iter()
            .filter(|member| member.kind() == kind && is_supported(member))
            .collect()
    }

    /// Declared members of one kind and name, eligible or not.
    fn members_named(&self, ty: &Type, kind: MemberKind, name: &str) -> Vec<Member> {
        self.declared_members(ty)
            .into_iter()
            .filter(|member| member.kind() == kind && member.name() == name)
            .collect()
    }
}

#[inline]
fn is_accessible(visibility: Visibility) -> bool {
    matches!(visibility, Visibility::Public | Visibility::Internal)
}

/// Eligibility filter applied before ranking.
pub fn is_supported(member: &Member) -> bool {
    if member.is_static() {
        return false;
    }

    match member.kind() {
        MemberKind::Constructor | MemberKind::Method => is_accessible(member.visibility()),
        MemberKind::Field => is_accessible(member.visibility()) && !member.is_read_only(),
        MemberKind::Property => {
            member.index_parameters() == 0 && member.setter().is_some_and(is_accessible)
        }
    }
}

/// Concurrent in-memory store of declared members.
pub struct MetadataRegistry {
    members: DashMap<Type, Vec<Member>, RandomState>,
}

impl MetadataRegistry {
    /// Create an empty registry.
    ///
    /// Eight shards are plenty for the handful of types a registration set
    /// describes.
    #[inline]
    pub fn new() -> Self {
        Self {
            members: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Append a member to its declaring type.
    pub fn add(&self, member: Member) {
        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            declaring_type = member.declaring_type().name(),
            member = %member.signature(),
            "Registering member metadata"
        );

        self.members
            .entry(member.declaring_type().clone())
            .or_default()
            .push(member);
    }

    /// Append several members.
    pub fn extend(&self, members: impl IntoIterator<Item = Member>) {
        for member in members {
            self.add(member);
        }
    }

    #[inline]
    pub fn contains(&self, ty: &Type) -> bool {
        self.members.contains_key(ty)
    }

    #[inline]
    pub fn remove(&self, ty: &Type) -> bool {
        self.members.remove(ty).is_some()
    }

    /// Number of described types
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMetadata for MetadataRegistry {
    fn declared_members(&self, ty: &Type) -> Vec<Member> {
        self.members
            .get(ty)
            .map(|members| members.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("types", &self.len())
            .finish()
    }
}
