use core::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    binding::Binding,
    construction::ProxyRefusal,
    container::Container,
    context::{InternalContext, Provision},
    dependency::Dependency,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    initializer::Initializable,
    injectable::{ConstructorRecipe, Injectable},
    instance::Instance,
    instantiator::BoxedInstantiator,
    key::Key,
    listener,
    logger::Logger,
    proxy::{ProxyFactory, Upcast},
    source::Source,
};

/// What a factory is asked for.
///
/// `proxy` creates stand-ins for the key the dependency was requested with,
/// `upcasts` convert instances of the key being constructed back to that key.
#[derive(Clone)]
pub(crate) struct Request {
    pub(crate) dependency: Dependency,
    pub(crate) proxy: Option<ProxyFactory>,
    pub(crate) upcasts: Vec<Upcast>,
}

impl Request {
    #[inline]
    #[must_use]
    pub(crate) fn new(dependency: Dependency, proxy: Option<ProxyFactory>) -> Self {
        Self {
            dependency,
            proxy,
            upcasts: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    fn linked(&self, upcast: Upcast) -> Self {
        let mut request = self.clone();
        request.upcasts.push(upcast);
        request
    }
}

/// Produces instances of a binding.
///
/// `owner` is the container that declares `binding`.
pub(crate) trait InternalFactory: Send + Sync {
    fn get(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind>;
}

pub(crate) fn incorrect_type(expected: TypeInfo, actual: TypeInfo) -> ResolveErrorKind {
    let err = ResolveErrorKind::IncorrectType { expected, actual };
    error!("{}", err);
    err
}

/// Attributes a failure of construction code to the binding.
/// Failures of nested requests already carry their chain and are passed through.
#[inline]
pub(crate) fn factory_error(binding: &Binding, ctx: &InternalContext, err: InstantiateErrorKind) -> ResolveErrorKind {
    provision_error(binding.key, binding.source, ctx, err)
}

pub(crate) fn provision_error(key: Key, binding_source: Source, ctx: &InternalContext, err: InstantiateErrorKind) -> ResolveErrorKind {
    match err {
        InstantiateErrorKind::Resolve(err) => *err,
        err @ InstantiateErrorKind::Custom(_) => {
            let err = ResolveErrorKind::Provision {
                key,
                binding_source,
                chain: ctx.chain(),
                error: err,
            };
            error!("{}", err);
            err
        }
    }
}

fn instantiator_error(
    binding: &Binding,
    ctx: &InternalContext,
    err: InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>,
) -> ResolveErrorKind {
    match err {
        InstantiatorErrorKind::Deps(err) => err,
        InstantiatorErrorKind::Factory(err) => factory_error(binding, ctx, err),
    }
}

/// Breaks a construction cycle: `binding` is requested again while it's being constructed on this thread.
fn circular_proxy(owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
    let refusal = match ctx.construction(binding.id).create_proxy(owner.options(), request) {
        Ok(proxy) => return Ok(proxy),
        Err(refusal) => refusal,
    };

    let key = request.dependency.key;
    let chain = ctx.chain();
    let err = match refusal {
        ProxyRefusal::Disabled => ResolveErrorKind::CircularDependencyDisabled { key, chain },
        ProxyRefusal::Unsupported => ResolveErrorKind::CircularProxyUnsupported { key, chain },
    };
    error!("{}", err);
    Err(err)
}

pub(crate) struct ConstantFactory {
    pub(crate) instance: Instance,
    pub(crate) members: Option<Arc<Initializable>>,
}

impl InternalFactory for ConstantFactory {
    fn get(&self, owner: &Container, _binding: &Binding, ctx: &mut InternalContext, _request: &Request) -> Result<Instance, ResolveErrorKind> {
        if let Some(members) = &self.members {
            members.ensure_injected(owner, ctx)?;
        }
        Ok(self.instance.clone())
    }
}

/// Calls a provider: a closure instantiator, a provider object or a provider looked up by key.
pub(crate) struct ProviderFactory {
    pub(crate) instantiator: BoxedInstantiator,
    /// Members of the provider object, injected before it's first called.
    pub(crate) members: Option<Arc<Initializable>>,
}

impl InternalFactory for ProviderFactory {
    fn get(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        if ctx.construction(binding.id).is_constructing() {
            return circular_proxy(owner, binding, ctx, request);
        }
        if let Some(members) = &self.members {
            members.ensure_injected(owner, ctx)?;
        }
        ctx.construction(binding.id).start_construction();

        let result = listener::provision(owner, binding, ctx, &mut |ctx: &mut InternalContext| {
            let provided = (self.instantiator)(&mut Provision::new(owner, ctx, Some(binding.key)));
            provided.map_err(|err| instantiator_error(binding, ctx, err))
        })
        .and_then(|instance| {
            ctx.construction(binding.id)
                .set_proxy_delegates(&instance)
                .map_err(|actual| incorrect_type(binding.key.type_info, actual))?;
            Ok(instance)
        });

        ctx.release_construction(binding.id);
        result
    }
}

/// Constructs an [`Injectable`] and injects its members.
pub(crate) struct ConstructorFactory<T>(pub(crate) PhantomData<fn() -> T>);

impl<T: Injectable> ConstructorFactory<T> {
    fn provision(owner: &Container, binding: &Binding, ctx: &mut InternalContext) -> Result<Instance, ResolveErrorKind> {
        let deps = <T::Deps as DependencyResolver>::resolve(&mut Provision::new(owner, ctx, Some(binding.key))).map_err(Into::into)?;
        let value = T::construct(deps).map_err(|err| factory_error(binding, ctx, err))?;

        let mut instance = Instance::new(Arc::new(value));
        for interceptor in owner.interceptors_for(&binding.key) {
            instance = interceptor
                .intercept(&binding.key, instance)
                .map_err(|err| factory_error(binding, ctx, err))?;
        }
        let value = instance
            .downcast::<T>()
            .map_err(|actual| incorrect_type(TypeInfo::of::<T>(), actual))?
            .ok_or_else(|| incorrect_type(TypeInfo::of::<T>(), instance.type_info()))?;

        let construction = ctx.construction(binding.id);
        let delegated = construction.set_proxy_delegates(&instance);
        construction.finish_construction();
        delegated.map_err(|actual| incorrect_type(binding.key.type_info, actual))?;

        construction.set_current_reference(instance.clone());
        let injected = value.inject_members(&mut Provision::new(owner, ctx, Some(binding.key)));
        ctx.construction(binding.id).remove_current_reference();
        injected.map_err(|err| factory_error(binding, ctx, err))?;

        debug!("Constructed");
        Ok(instance)
    }
}

impl<T: Injectable> InternalFactory for ConstructorFactory<T> {
    fn get(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        let construction = ctx.construction(binding.id);
        if construction.is_constructing() {
            return circular_proxy(owner, binding, ctx, request);
        }
        if let Some(current) = construction.current_reference() {
            if owner.options().disable_circular_proxies {
                let err = ResolveErrorKind::CircularDependencyDisabled {
                    key: request.dependency.key,
                    chain: ctx.chain(),
                };
                error!("{}", err);
                return Err(err);
            }
            debug!("Members are being injected, reusing the instance");
            return Ok(current.clone());
        }
        construction.start_construction();

        let result = listener::provision(owner, binding, ctx, &mut |ctx: &mut InternalContext| {
            Self::provision(owner, binding, ctx)
        }).and_then(|instance| {
            // A listener may have provided the instance instead
            ctx.construction(binding.id)
                .set_proxy_delegates(&instance)
                .map_err(|actual| incorrect_type(binding.key.type_info, actual))?;
            Ok(instance)
        });

        ctx.release_construction(binding.id);
        result
    }
}

/// Delegates to the binding of another key in the declaring container.
pub(crate) struct LinkedFactory {
    pub(crate) target: Key,
    pub(crate) recipe: Option<ConstructorRecipe>,
    pub(crate) upcast: Upcast,
}

impl InternalFactory for LinkedFactory {
    fn get(&self, owner: &Container, binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        let (target_owner, target) = owner.lookup(ctx, self.target, self.recipe)?;

        let dependency = Dependency {
            key: self.target,
            injection_point: request.dependency.injection_point,
            nullable: request.dependency.nullable,
        };
        let mut frame = ctx.push(dependency, binding.source);
        let instance = target
            .factory
            .get(&target_owner, &target, &mut frame, &request.linked(self.upcast.clone()))?;

        // Proxies already have the requested type
        if instance.is_proxy() {
            return Ok(instance);
        }
        (self.upcast)(instance).map_err(|actual| incorrect_type(binding.key.type_info, actual))
    }
}

/// Serves a binding of a private child container to its parent.
pub(crate) struct ExposedFactory {
    pub(crate) child: Container,
    pub(crate) target: Arc<Binding>,
}

impl InternalFactory for ExposedFactory {
    fn get(&self, _owner: &Container, _binding: &Binding, ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        self.target.factory.get(&self.child, &self.target, ctx, request)
    }
}

/// Hands out the declaring container itself.
pub(crate) struct ContainerFactory;

impl InternalFactory for ContainerFactory {
    fn get(&self, owner: &Container, _binding: &Binding, _ctx: &mut InternalContext, _request: &Request) -> Result<Instance, ResolveErrorKind> {
        Ok(Instance::new(Arc::new(owner.clone())))
    }
}

/// Hands out a [`Logger`] labelled with the key that requested it.
pub(crate) struct LoggerFactory;

impl InternalFactory for LoggerFactory {
    fn get(&self, _owner: &Container, _binding: &Binding, _ctx: &mut InternalContext, request: &Request) -> Result<Instance, ResolveErrorKind> {
        Ok(Instance::new(Arc::new(Logger::new(request.dependency.injection_point))))
    }
}
