//! A hierarchical dependency-injection container.
//!
//! Keys (a type plus an optional qualifier) are bound to the way of building them
//! with a [`Binder`], and the resulting [`Container`] resolves, constructs and caches
//! instances on demand. Containers form a tree: a child sees and may override the bindings
//! of its ancestors, while siblings are isolated. Keys without a binding are bound
//! implicitly to their own constructor when they implement [`Injectable`].
//!
//! Dependency cycles within one thread are broken with stand-in [`Proxy`] objects for keys bound
//! with [`BindingBuilder::proxyable`], and singletons are constructed at most once even when several
//! threads request them at the same time, including when their constructions wait for each other.

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binder;
pub(crate) mod binding;
pub(crate) mod config;
pub(crate) mod construction;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod factory;
pub(crate) mod initializer;
pub(crate) mod inject;
pub(crate) mod injectable;
pub(crate) mod instance;
pub(crate) mod instantiator;
pub(crate) mod intercept;
pub(crate) mod key;
pub(crate) mod listener;
pub(crate) mod lock;
pub(crate) mod logger;
pub(crate) mod processor;
pub(crate) mod proxy;
pub(crate) mod scope;
pub(crate) mod singleton;
pub(crate) mod source;

pub use any::TypeInfo;
pub use binder::{Binder, BindingBuilder, Module, PrivateBinder};
pub use binding::{Binding, BindingKind};
pub use config::{InjectorOptions, Stage};
pub use container::{Container, ContainerBuilder};
pub use context::Provision;
pub use dependency::{Dependency, DependencyAndSource, DependencyChain};
pub use dependency_resolver::{DependencyResolver, Requirement};
pub use errors::{
    CreationErrorKind, CreationErrors, CycleReport, InstantiateErrorKind, InstantiatorErrorKind, MissingReason, ResolveErrorKind,
    ThreadCycle,
};
pub use inject::{Implicit, Inject, InjectNullable, Named};
pub use injectable::Injectable;
pub use instance::Instance;
pub use instantiator::{Instantiator, Provider};
pub use intercept::Interceptor;
pub use key::{Key, Qualifier};
pub use listener::{ProvisionInvocation, ProvisionListener};
pub use logger::Logger;
pub use proxy::{Proxied, Proxy};
pub use scope::Scope;
pub use source::Source;
