use tracing::debug;

use crate::{
    any::TypeInfo,
    config::InjectorOptions,
    factory::Request,
    instance::Instance,
    proxy::PendingProxy,
};

/// Why a stand-in proxy couldn't be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProxyRefusal {
    Disabled,
    Unsupported,
}

/// Bookkeeping of one binding being constructed.
///
/// Lives in the provisioning context of the constructing thread,
/// or in a singleton cell when proxies are issued to other threads.
#[derive(Default)]
pub(crate) struct ConstructionContext {
    /// Instance whose members are being injected, handed out to re-entrant requests.
    current_reference: Option<Instance>,
    constructing: bool,
    pending: Vec<PendingProxy>,
}

impl ConstructionContext {
    #[inline]
    #[must_use]
    pub(crate) fn is_constructing(&self) -> bool {
        self.constructing
    }

    #[inline]
    pub(crate) fn start_construction(&mut self) {
        self.constructing = true;
    }

    /// Ends the construction. Proxies that weren't back-filled are dropped unresolved.
    #[inline]
    pub(crate) fn finish_construction(&mut self) {
        self.constructing = false;
        self.pending.clear();
    }

    #[inline]
    #[must_use]
    pub(crate) fn current_reference(&self) -> Option<&Instance> {
        self.current_reference.as_ref()
    }

    #[inline]
    pub(crate) fn set_current_reference(&mut self, instance: Instance) {
        self.current_reference = Some(instance);
    }

    #[inline]
    pub(crate) fn remove_current_reference(&mut self) {
        self.current_reference = None;
    }

    /// Issues a stand-in for the requested key, to be back-filled by [`Self::set_proxy_delegates`].
    pub(crate) fn create_proxy(&mut self, options: &InjectorOptions, request: &Request) -> Result<Instance, ProxyRefusal> {
        if options.disable_circular_proxies {
            return Err(ProxyRefusal::Disabled);
        }
        let Some(proxy_factory) = request.proxy else {
            return Err(ProxyRefusal::Unsupported);
        };

        let (proxy, slot) = proxy_factory();
        self.pending.push(PendingProxy {
            slot,
            upcasts: request.upcasts.clone(),
        });
        debug!(key = %request.dependency.key, "Circular proxy created");

        Ok(proxy)
    }

    /// Makes every proxy issued so far delegate to `instance`.
    pub(crate) fn set_proxy_delegates(&mut self, instance: &Instance) -> Result<(), TypeInfo> {
        for pending in self.pending.drain(..) {
            pending.resolve(instance)?;
        }
        Ok(())
    }
}
