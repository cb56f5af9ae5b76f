use std::sync::Arc;
use tracing::debug;

use crate::{
    context::Provision,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    instance::Instance,
    key::Key,
};

pub trait Instantiator<Deps>: Clone + Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

/// A provider object, bound with [`crate::BindingBuilder::to_provider_instance`]
/// or looked up by key with [`crate::BindingBuilder::to_provider_key`].
pub trait Provider<T: ?Sized>: Send + Sync + 'static {
    #[allow(clippy::missing_errors_doc)]
    fn get(&self, provision: &mut Provision<'_>) -> Result<Arc<T>, InstantiateErrorKind>;
}

pub(crate) type BoxedInstantiator =
    Arc<dyn Fn(&mut Provision<'_>) -> Result<Instance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps, Convert>(instantiator: Inst, convert: Convert) -> BoxedInstantiator
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
    Convert: Fn(Inst::Provides) -> Instance + Send + Sync + 'static,
{
    Arc::new(move |provision: &mut Provision<'_>| {
        let dependencies = match Deps::resolve(provision) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let dependency = match instantiator.clone().instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Resolved");

        Ok(convert(dependency))
    })
}

#[must_use]
pub(crate) fn boxed_provider<T, P>(provider: Arc<P>) -> BoxedInstantiator
where
    T: ?Sized + Send + Sync + 'static,
    P: Provider<T> + ?Sized,
{
    Arc::new(move |provision: &mut Provision<'_>| match provider.get(provision) {
        Ok(dependency) => Ok(Instance::new(dependency)),
        Err(err) => Err(InstantiatorErrorKind::Factory(err)),
    })
}

/// Calls the provider bound under `key` each time.
#[must_use]
pub(crate) fn keyed_provider<T, P>(key: Key) -> BoxedInstantiator
where
    T: ?Sized + Send + Sync + 'static,
    P: Provider<T>,
{
    Arc::new(move |provision: &mut Provision<'_>| {
        let provider = provision.get_key::<P>(key).map_err(InstantiatorErrorKind::Deps)?;
        match provider.get(provision) {
            Ok(dependency) => Ok(Instance::new(dependency)),
            Err(err) => Err(InstantiatorErrorKind::Factory(err)),
        }
    })
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
