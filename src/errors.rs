mod creation;
mod cycle;
mod dependency_resolver;
mod instantiate;
mod instantiator;

pub use creation::{CreationErrorKind, CreationErrors};
pub use cycle::{CycleReport, ThreadCycle};
pub use dependency_resolver::{MissingReason, ResolveErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
