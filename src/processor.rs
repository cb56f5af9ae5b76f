//! Turns recorded declarations into a container tree.

use core::cell::RefCell;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, error, info, info_span};

use crate::{
    binder::{Declaration, Element, Message, OptionElement, PrivateElements, Target},
    binding::{Binding, BindingKind},
    config::{InjectorOptions, Stage},
    container::{Container, ContainerInner, Parent},
    context::InternalContext,
    dependency::Dependency,
    dependency_resolver::Requirement,
    errors::{CreationErrorKind, CreationErrors},
    factory::{ConstantFactory, ContainerFactory, ExposedFactory, InternalFactory, LinkedFactory, LoggerFactory, ProviderFactory},
    initializer::Initializable,
    injectable::ConstructorRecipe,
    instance::Instance,
    intercept::InterceptorBinding,
    key::Key,
    listener::{ListenerBinding, ProvisionListenerStore},
    logger::Logger,
    scope::Scope,
    singleton::Coordinator,
    source::Source,
};

/// Elements of one container, split by kind.
#[derive(Default)]
struct Sorted {
    messages: Vec<Message>,
    injections: Vec<Arc<Initializable>>,
    options: Vec<OptionElement>,
    listeners: Vec<ListenerBinding>,
    interceptors: Vec<InterceptorBinding>,
    declarations: Vec<Declaration>,
    privates: Vec<PrivateElements>,
}

impl Sorted {
    fn new(elements: Vec<Element>) -> Self {
        let mut sorted = Self::default();
        for element in elements {
            match element {
                Element::Binding(declaration) => sorted.declarations.push(declaration),
                Element::Message(message) => sorted.messages.push(message),
                Element::InjectionRequest(injection) => sorted.injections.push(injection),
                Element::Option(option) => sorted.options.push(option),
                Element::Listener(listener) => sorted.listeners.push(listener),
                Element::Interceptor(interceptor) => sorted.interceptors.push(interceptor),
                Element::Private(private) => sorted.privates.push(private),
            }
        }
        sorted
    }

    fn options(&self, stage: Stage, parent: Option<&InjectorOptions>) -> InjectorOptions {
        let mut options = InjectorOptions {
            stage,
            ..InjectorOptions::default()
        };
        for option in &self.options {
            match option {
                OptionElement::RequireExplicitBindings => options.jit_disabled = true,
                OptionElement::DisableCircularProxies => options.disable_circular_proxies = true,
                OptionElement::RequireAtInjectOnConstructors => options.at_inject_required = true,
            }
        }
        options.inherit(parent)
    }
}

/// A built container, its explicit keys in declaration order,
/// and the pre-built instances whose members it injects.
struct Built {
    container: Container,
    order: Vec<Key>,
    injections: Vec<Arc<Initializable>>,
}

pub(crate) fn build(parent: Option<Container>, stage: Stage, elements: Vec<Element>) -> Result<Container, CreationErrors> {
    let span = info_span!("build", ?stage);
    let _guard = span.enter();

    let mut errors = CreationErrors::default();
    let mut built = Vec::new();
    let container = process(parent.map(Parent::Public), stage, Sorted::new(elements), &mut errors, &mut built);

    for Built { container, .. } in &built {
        validate(container, &mut errors);
    }
    if !errors.is_empty() {
        error!("{}", errors);
        return Err(errors);
    }

    for Built { container, injections, .. } in &built {
        inject_members(container, injections, &mut errors);
    }
    for Built { container, order, .. } in &built {
        instantiate_eager(container, order, &mut errors);
    }
    if !errors.is_empty() {
        error!("{}", errors);
        return Err(errors);
    }

    debug!(containers = built.len(), "Built");
    Ok(container)
}

fn process(parent: Option<Parent>, stage: Stage, sorted: Sorted, errors: &mut CreationErrors, built: &mut Vec<Built>) -> Container {
    let parent_container = parent.as_ref().and_then(|parent| match parent {
        Parent::Public(parent) => Some(parent.clone()),
        Parent::Private(parent) => parent.upgrade().map(Container::from_inner),
    });
    let options = sorted.options(stage, parent_container.as_ref().map(Container::options));

    let mut listeners = parent_container
        .as_ref()
        .map(|parent| parent.listeners().bindings().to_vec())
        .unwrap_or_default();
    listeners.extend(sorted.listeners);
    let mut interceptors = parent_container
        .as_ref()
        .map(|parent| parent.inner.interceptors.clone())
        .unwrap_or_default();
    interceptors.extend(sorted.interceptors);
    let coordinator = parent_container
        .as_ref()
        .map_or_else(|| Arc::new(Coordinator::new()), |parent| parent.inner.coordinator.clone());

    for Message { error, source } in sorted.messages {
        if error.chain().count() > 1 {
            info!(%source, root = %error.root_cause(), "An error was caught and reported");
        }
        errors.push(CreationErrorKind::Message { error, binding_source: source });
    }

    let container = Container::from_inner(Arc::new(ContainerInner {
        parent,
        options,
        bindings: RwLock::new(BTreeMap::new()),
        jit: ReentrantMutex::new(RefCell::new(HashMap::new())),
        blacklist: Mutex::new(HashSet::new()),
        listeners: ProvisionListenerStore::new(listeners),
        interceptors,
        coordinator,
    }));
    bind_special(&container);

    let mut processor = Processor {
        container: &container,
        errors,
        order: Vec::new(),
        injections: sorted.injections,
    };
    let (untargetted, declarations): (Vec<_>, Vec<_>) = sorted
        .declarations
        .into_iter()
        .partition(|declaration| matches!(declaration.target, Target::Untargetted(_)));
    for declaration in declarations.into_iter().chain(untargetted) {
        processor.declare(declaration);
    }
    let Processor { errors, order, injections, .. } = processor;

    for key in &order {
        for ancestor in core::iter::successors(container.parent(), Container::parent) {
            ancestor.inner.blacklist.lock().insert(*key);
        }
    }
    built.push(Built {
        container: container.clone(),
        order,
        injections,
    });

    for private in sorted.privates {
        let child = process(
            Some(Parent::Private(Arc::downgrade(&container.inner))),
            stage,
            Sorted::new(private.elements),
            errors,
            built,
        );
        expose(&container, &child, private.exposures, errors);
    }

    container
}

fn bind_special(container: &Container) {
    let coordinator = &container.inner.coordinator;
    let special = |key: Key, factory: Arc<dyn InternalFactory>| {
        Binding::new(key, Source::UNKNOWN, Scope::Unscoped, BindingKind::Instance, factory, Vec::new(), None, coordinator).internal()
    };

    let mut bindings = container.inner.bindings.write();
    for binding in [
        special(Key::of::<Container>(), Arc::new(ContainerFactory)),
        special(
            Key::of::<Stage>(),
            Arc::new(ConstantFactory {
                instance: Instance::new(Arc::new(container.stage())),
                members: None,
            }),
        ),
        special(Key::of::<Logger>(), Arc::new(LoggerFactory)),
    ] {
        bindings.insert(binding.key, Arc::new(binding));
    }
}

struct Processor<'a> {
    container: &'a Container,
    errors: &'a mut CreationErrors,
    order: Vec<Key>,
    injections: Vec<Arc<Initializable>>,
}

impl Processor<'_> {
    fn declare(&mut self, declaration: Declaration) {
        let Declaration {
            key,
            source,
            scope,
            target,
            proxy,
        } = declaration;

        let mut members: Option<Arc<Initializable>> = None;
        let (kind, factory, requirements, default_scope) = match target {
            Target::None => {
                self.errors.push(CreationErrorKind::MissingImplementation { key, binding_source: source });
                return;
            }
            Target::Instance { instance, members: injected } => {
                members = injected.clone();
                (
                    BindingKind::Instance,
                    Arc::new(ConstantFactory {
                        instance,
                        members: injected,
                    }) as Arc<dyn InternalFactory>,
                    Vec::new(),
                    Scope::Unscoped,
                )
            }
            Target::Provider {
                instantiator,
                requirements,
                kind,
                members: injected,
            } => {
                if kind == BindingKind::ProviderKey(key) {
                    self.errors.push(CreationErrorKind::RecursiveBinding { key, binding_source: source });
                    return;
                }
                members = injected.clone();
                let factory = ProviderFactory {
                    instantiator,
                    members: injected,
                };
                (kind, Arc::new(factory) as Arc<dyn InternalFactory>, requirements, Scope::Unscoped)
            }
            Target::Linked { target, recipe, upcast } => {
                if target == key {
                    self.errors.push(CreationErrorKind::RecursiveBinding { key, binding_source: source });
                    return;
                }
                let requirement = Requirement {
                    dependency: Dependency::new(target),
                    recipe,
                };
                (
                    BindingKind::Linked(target),
                    Arc::new(LinkedFactory { target, recipe, upcast }) as Arc<dyn InternalFactory>,
                    vec![requirement],
                    Scope::Unscoped,
                )
            }
            Target::Constructor(recipe) => match self.constructor(key, source, recipe) {
                Some(requirements) => (BindingKind::Constructor, (recipe.factory)(), requirements, recipe.scope),
                None => return,
            },
            Target::Untargetted(recipe) => match self.constructor(key, source, recipe) {
                Some(requirements) => (BindingKind::Untargetted, (recipe.factory)(), requirements, recipe.scope),
                None => return,
            },
        };

        let binding = Binding::new(
            key,
            source,
            scope.unwrap_or(default_scope),
            kind,
            factory,
            requirements,
            proxy,
            &self.container.inner.coordinator,
        );
        if insert(self.container, binding, self.errors) {
            self.order.push(key);
            self.injections.extend(members);
        }
    }

    fn constructor(&mut self, key: Key, source: Source, recipe: ConstructorRecipe) -> Option<Vec<Requirement>> {
        if self.container.options().at_inject_required && !recipe.inject_constructor {
            self.errors.push(CreationErrorKind::MissingConstructorMarker { key, binding_source: source });
            return None;
        }
        Some((recipe.requirements)())
    }
}

/// Adds an explicit binding, reporting a collision if the key is already bound in `container`.
fn insert(container: &Container, binding: Binding, errors: &mut CreationErrors) -> bool {
    let mut bindings = container.inner.bindings.write();
    if let Some(existing) = bindings.get(&binding.key) {
        errors.push(CreationErrorKind::BindingAlreadySet {
            key: binding.key,
            sources: vec![existing.source, binding.source],
        });
        return false;
    }

    debug!(key = %binding.key, kind = ?binding.kind, "Bound");
    bindings.insert(binding.key, Arc::new(binding));
    true
}

/// Binds the keys exposed by a private environment in its parent.
fn expose(parent: &Container, child: &Container, exposures: Vec<(Key, Source)>, errors: &mut CreationErrors) {
    for (key, source) in exposures {
        let target = child.inner.bindings.read().get(&key).cloned();
        let Some(target) = target.filter(|target| !target.internal) else {
            errors.push(CreationErrorKind::ExposedButNotBound { key, binding_source: source });
            continue;
        };

        let proxy = target.proxy;
        let binding = Binding::new(
            key,
            source,
            Scope::Unscoped,
            BindingKind::Exposed,
            Arc::new(ExposedFactory {
                child: child.clone(),
                target,
            }),
            Vec::new(),
            proxy,
            &parent.inner.coordinator,
        );
        insert(parent, binding, errors);
    }
}

/// Checks that the dependencies of every explicit binding can be found.
fn validate(container: &Container, errors: &mut CreationErrors) {
    let mut ctx = InternalContext::new();
    for binding in container.bindings() {
        if let Err(err) = container.validate(&mut ctx, &binding) {
            errors.push(CreationErrorKind::Resolve(err));
        }
    }
}

/// Injects the members of pre-built instances that weren't needed before.
fn inject_members(container: &Container, injections: &[Arc<Initializable>], errors: &mut CreationErrors) {
    if container.stage() == Stage::Tool {
        return;
    }
    for injection in injections {
        if let Err(err) = injection.ensure_injected(container, &mut InternalContext::new()) {
            errors.push(CreationErrorKind::Resolve(err));
        }
    }
}

fn instantiate_eager(container: &Container, order: &[Key], errors: &mut CreationErrors) {
    let stage = container.stage();
    for key in order {
        let Some(binding) = container.get_binding(key) else {
            continue;
        };
        if !binding.scope.is_eager_in(stage) {
            continue;
        }

        debug!(%key, "Instantiating eager singleton");
        if let Err(err) = container.provide(&mut InternalContext::new(), Dependency::new(*key), None) {
            errors.push(CreationErrorKind::Resolve(err));
        }
    }
}
