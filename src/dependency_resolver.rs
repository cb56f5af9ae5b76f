use crate::{
    context::Provision,
    dependency::Dependency,
    errors::ResolveErrorKind,
    injectable::{ConstructorRecipe, Injectable},
};

/// A dependency declared by a resolver.
///
/// Requirements are checked when a binding is created, so a missing dependency fails
/// the build (or the implicit binding) instead of the first request.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub dependency: Dependency,
    pub(crate) recipe: Option<ConstructorRecipe>,
}

impl Requirement {
    #[inline]
    #[must_use]
    pub fn new(dependency: Dependency) -> Self {
        Self { dependency, recipe: None }
    }

    /// A requirement that may be satisfied by binding `T` implicitly.
    #[inline]
    #[must_use]
    pub fn implicit<T: Injectable>() -> Self {
        let recipe = ConstructorRecipe::of::<T>();
        Self {
            dependency: Dependency::new(recipe.key()),
            recipe: Some(recipe),
        }
    }
}

pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error>;

    /// Dependencies requested by [`Self::resolve`], checked ahead of the first request.
    #[inline]
    #[must_use]
    fn requirements() -> Vec<Requirement> {
        Vec::new()
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(provision: &mut Provision<'_>) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(provision).map_err(Into::into)?,)*))
            }

            #[inline]
            fn requirements() -> Vec<Requirement> {
                let mut requirements = Vec::new();
                $( requirements.extend($ty::requirements()); )*
                requirements
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);

#[cfg(test)]
mod tests {
    use super::DependencyResolver;
    use crate::{
        inject::{Implicit, Inject, InjectNullable, Named},
        key::{Key, Qualifier},
        Injectable, InstantiateErrorKind,
    };

    struct Primary;

    impl Qualifier for Primary {
        const NAME: &'static str = "primary";
    }

    struct Config;

    impl Injectable for Config {
        type Deps = ();

        fn construct((): ()) -> Result<Self, InstantiateErrorKind> {
            Ok(Self)
        }
    }

    #[test]
    #[allow(dead_code)]
    fn test_dependency_resolver_impls() {
        fn resolver<T: DependencyResolver>() {}
        fn resolver_with_dep<Dep: ?Sized + Send + Sync + 'static>() {
            resolver::<Inject<Dep>>();
            resolver::<InjectNullable<Dep>>();
            resolver::<Named<Dep, Primary>>();
            resolver::<(Inject<Dep>, InjectNullable<Dep>, Implicit<Config>)>();
        }
    }

    #[test]
    fn test_tuple_requirements_in_order() {
        let requirements = <(Inject<u8>, Named<u16, Primary>, InjectNullable<u32>, Implicit<Config>)>::requirements();
        let keys: Vec<_> = requirements.iter().map(|requirement| requirement.dependency.key).collect();

        assert_eq!(
            keys,
            [Key::of::<u8>(), Key::qualified::<u16, Primary>(), Key::of::<u32>(), Key::of::<Config>()],
        );
        assert!(requirements[2].dependency.nullable);
        assert!(requirements[3].recipe.is_some());
        assert!(requirements[0].recipe.is_none());
    }
}
