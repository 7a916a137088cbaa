//! # dependency-resolver
//!
//! The resolution core of a runtime dependency-injection container: how a
//! constructor, method, field or property is picked for some configured
//! data, how resolver overrides are matched against injection sites, and
//! how produced values are cached and disposed by lifetime managers.
//!
//! Types are runtime descriptors ([`Type`]), not Rust types, and members are
//! described through a [`TypeMetadata`] source. That keeps the core usable
//! for any object model that can list its constructors and members.
//!
//! ## Features
//!
//! - **Overload selection** - first match ([`SelectionMode::Fast`]) or full
//!   scoring with ambiguity diagnostics ([`SelectionMode::Validating`])
//! - **Resolver overrides** - replace a dependency, parameter, field or
//!   property for a single resolve call, best match wins
//! - **Lifetime managers** - transient, singleton, per-scope, per-thread,
//!   weakly held and scope-disposed transients
//! - **Synchronized builds** - one thread constructs a singleton while the
//!   others wait with a bounded timeout
//! - **Observable** - optional `tracing` events under `dependency_resolver`
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_resolver::prelude::*;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let database = Type::class("Database");
//! let users = Type::class("UserService");
//!
//! // Describe constructors once
//! let metadata = Arc::new(MetadataRegistry::new());
//! let ty = users.clone();
//! metadata.add(
//!     Member::constructor(&users)
//!         .param("db", &database)
//!         .constructs(move |args| {
//!             let db = args[0]
//!                 .as_ref()
//!                 .and_then(|db| db.downcast::<Database>())
//!                 .ok_or_else(|| ResolutionError::invocation_failed(".ctor(Database)", "no database"))?;
//!             Ok(Instance::new(&ty, UserService { db }))
//!         })
//!         .build(),
//! );
//!
//! let container = Container::new(metadata);
//! container
//!     .register_instance(
//!         &database,
//!         Instance::new(&database, Database { url: "postgres://localhost".into() }),
//!     )
//!     .unwrap();
//! container
//!     .register(Registration::new(&users).lifetime(Lifetime::Singleton))
//!     .unwrap();
//!
//! let service = container.resolve(&users).unwrap().unwrap();
//! let service = service.downcast::<UserService>().unwrap();
//! assert_eq!(service.db.url, "postgres://localhost");
//! ```
//!
//! ## Overrides
//!
//! ```rust
//! use dependency_resolver::prelude::*;
//! use std::sync::Arc;
//!
//! let port = Type::value("u16");
//! let server = Type::class("Server");
//!
//! let metadata = Arc::new(MetadataRegistry::new());
//! let ty = server.clone();
//! metadata.add(
//!     Member::constructor(&server)
//!         .param("port", &port)
//!         .constructs(move |args| {
//!             let port = args[0].as_ref().and_then(|p| p.downcast_ref::<u16>()).copied();
//!             Ok(Instance::new(&ty, port.unwrap_or(80)))
//!         })
//!         .build(),
//! );
//!
//! let container = Container::new(metadata);
//! container.register_instance(&port, Instance::new(&port, 8080u16)).unwrap();
//! container.register(Registration::new(&server)).unwrap();
//!
//! let overrides = [ResolverOverride::parameter("port", InjectionValue::instance(&port, 9090u16))];
//! let value = container
//!     .resolve_contract(&Contract::new(&server), &overrides)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(value.downcast_ref::<u16>(), Some(&9090));
//! ```

mod config;
mod container;
mod context;
mod contract;
mod error;
mod injection;
pub mod lifetime;
#[cfg(feature = "logging")]
pub mod logging;
pub mod matching;
mod member;
mod metadata;
mod overrides;
mod policy;
mod rank;
mod scope;
pub mod selection;
mod types;
pub mod value;

pub use config::*;
pub use container::*;
pub use context::*;
pub use contract::*;
pub use error::*;
pub use injection::*;
pub use lifetime::{
    Cached, ContainerControlledLifetimeManager, ContainerControlledTransientManager,
    DEFAULT_RESOLVE_TIMEOUT, ExternallyControlledLifetimeManager, HierarchicalLifetimeManager,
    LifetimeManager, ManagerCore, PerThreadLifetimeManager, Pipeline, ResolveTimeout,
    TransientLifetimeManager, default_resolve_timeout, set_default_resolve_timeout,
};
pub use matching::MatchScore;
pub use member::*;
pub use metadata::*;
pub use overrides::*;
pub use policy::*;
pub use rank::*;
pub use scope::*;
pub use selection::SelectionMode;
pub use types::*;
pub use value::{
    ArrayValue, Disposable, InjectionValue, Instance, Match, Resolve, ResolvedArray,
    ResolverFactory, Value, WeakInstance,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Container, Contract, InjectionMember, InjectionValue, Instance, Lifetime, LifetimeManager,
        Member, MetadataRegistry, Registration, ResolutionError, ResolveContext, ResolverOverride,
        ResolverSettings, Result, SelectionMode, Type, TypeMetadata, Value,
    };
}
