use super::dependency_resolver::ResolveErrorKind;

/// Failure of user construction code: providers, constructors, listeners and interceptors.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
    /// A nested request made by user code failed. It's propagated as is.
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}
