//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The repository wrangling the services a process implements and consumes.
//!
//! Most interaction with the [`ServiceRegistry`] happens during startup:
//! [`implement`](ServiceRegistry::implement) the services this process hosts,
//! [`consume`](ServiceRegistry::consume) the remote ones it calls, then let
//! the proxies do the talking. At shutdown,
//! [`disconnect_all`](ServiceRegistry::disconnect_all) releases every
//! transport in parallel.
//!
//! One process registers at most one receiver and at most one proxy per
//! contract; a duplicate registration is rejected and the first one stays
//! functional.

use crate::config::BusConfig;
use crate::context::{ContextProvider, ThreadLocalContextProvider};
use crate::error::BusError;
use crate::proxy::ClientProxy;
use crate::receiver::{ReceiverCore, ServiceAdapter};
use crate::transport::{BusDispatcher, BusReceiver, TransportBindings};
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Repository of the services this process implements and consumes.
///
/// The registry exclusively owns the receivers and dispatchers it creates;
/// they own their transport resources. Lookups are concurrent; mutations
/// only happen on the registration and teardown paths.
pub struct ServiceRegistry {
    receivers: RwLock<HashMap<String, Arc<dyn BusReceiver>>>,
    dispatchers: RwLock<HashMap<String, Arc<dyn BusDispatcher>>>,
    context: Arc<dyn ContextProvider>,
}

impl ServiceRegistry {
    /// Creates a registry with the thread-local context provider.
    pub fn new() -> Self {
        Self::with_context_provider(Arc::new(ThreadLocalContextProvider::new()))
    }

    /// Creates a registry with a custom ambient context provider, for
    /// embedders whose runtime has its own notion of "current context".
    pub fn with_context_provider(context: Arc<dyn ContextProvider>) -> Self {
        Self {
            receivers: RwLock::new(HashMap::new()),
            dispatchers: RwLock::new(HashMap::new()),
            context,
        }
    }

    /// The ambient context provider shared by everything this registry
    /// creates.
    pub fn context_provider(&self) -> Arc<dyn ContextProvider> {
        self.context.clone()
    }

    /// Connects a service implementation to the transport, putting it into a
    /// ready state to receive work requests.
    ///
    /// # Errors
    ///
    /// [`BusError::AlreadyRegistered`] if this registry already implements
    /// the adapter's contract; transport errors if the receiver cannot
    /// connect.
    pub async fn implement<S, B>(
        &self,
        adapter: ServiceAdapter<S, B::Codec>,
        bindings: &B,
        config: BusConfig,
    ) -> Result<(), BusError>
    where
        S: Send + Sync + 'static,
        B: TransportBindings,
    {
        let contract = adapter.contract().to_string();
        if self.receivers.read().contains_key(&contract) {
            return Err(BusError::AlreadyRegistered(contract));
        }

        info!(service = %contract, "implementing service");
        let core = Arc::new(ReceiverCore::new(
            adapter,
            bindings.codec(),
            self.context.clone(),
        ));
        let receiver = bindings.receiver(core, config);
        receiver.connect().await?;

        // Registration raced with another implement() for the same
        // contract: the slower one must not clobber the live receiver.
        let mut receivers = self.receivers.write();
        if receivers.contains_key(&contract) {
            drop(receivers);
            warn!(service = %contract, "lost implement race, disconnecting");
            receiver.disconnect().await?;
            return Err(BusError::AlreadyRegistered(contract));
        }
        receivers.insert(contract, receiver);
        Ok(())
    }

    /// Initializes a client proxy for a remote service so the caller can
    /// start performing operations on it.
    ///
    /// It is up to you to hand this the same transport scheme the
    /// implementing side connected with; an HTTP proxy talking at a broker
    /// receiver will get nowhere.
    ///
    /// # Errors
    ///
    /// [`BusError::AlreadyRegistered`] if this registry already consumes the
    /// contract; transport errors if the dispatcher cannot connect.
    pub async fn consume<B>(
        &self,
        contract: &str,
        bindings: &B,
        config: BusConfig,
    ) -> Result<ClientProxy<B::Codec>, BusError>
    where
        B: TransportBindings,
    {
        if self.dispatchers.read().contains_key(contract) {
            return Err(BusError::AlreadyRegistered(contract.to_string()));
        }

        info!(service = %contract, "creating proxy for consumed service");
        let request_ttl = config.request_ttl;
        let dispatcher = bindings.dispatcher(contract, config);
        dispatcher.connect().await?;

        let mut dispatchers = self.dispatchers.write();
        if dispatchers.contains_key(contract) {
            drop(dispatchers);
            warn!(service = %contract, "lost consume race, disconnecting");
            dispatcher.disconnect().await?;
            return Err(BusError::AlreadyRegistered(contract.to_string()));
        }
        dispatchers.insert(contract.to_string(), dispatcher.clone());
        drop(dispatchers);

        Ok(ClientProxy::new(
            contract,
            dispatcher,
            bindings.codec(),
            Some(request_ttl),
            self.context.clone(),
        ))
    }

    /// Disconnects every implemented service and every consumed proxy, in
    /// parallel, resolving once everything has shut down.
    ///
    /// Call this during the shutdown phase of the application. The executor
    /// itself is not stopped here: the runtime belongs to the embedder, and
    /// a borrowed handle cannot (and must not) shut it down.
    pub async fn disconnect_all(&self) {
        let receivers: Vec<_> = self.receivers.write().drain().collect();
        let dispatchers: Vec<_> = self.dispatchers.write().drain().collect();

        let teardown = receivers
            .iter()
            .map(|(contract, receiver)| {
                let receiver = receiver.clone();
                let contract = contract.clone();
                async move {
                    if let Err(e) = receiver.disconnect().await {
                        warn!(service = %contract, "receiver disconnect failed: {e}");
                    }
                }
            })
            .collect::<Vec<_>>();
        let proxy_teardown = dispatchers
            .iter()
            .map(|(contract, dispatcher)| {
                let dispatcher = dispatcher.clone();
                let contract = contract.clone();
                async move {
                    if let Err(e) = dispatcher.disconnect().await {
                        warn!(service = %contract, "dispatcher disconnect failed: {e}");
                    }
                }
            })
            .collect::<Vec<_>>();

        futures_util::future::join(join_all(teardown), join_all(proxy_teardown)).await;
        info!("all services disconnected");
    }

    /// Number of services this registry currently implements.
    pub fn implemented_count(&self) -> usize {
        self.receivers.read().len()
    }

    /// Number of remote services this registry currently consumes.
    pub fn consumed_count(&self) -> usize {
        self.dispatchers.read().len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("implemented", &self.implemented_count())
            .field("consumed", &self.consumed_count())
            .finish()
    }
}
