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

//! In-process transport: direct hand-off between a dispatcher and a receiver
//! living in the same process.
//!
//! A [`LocalBindings`] value owns a hub mapping contract names to connected
//! services. Dispatchers and receivers created from the *same* bindings
//! share that hub: the lookup is scoped to the bindings value, threaded
//! explicitly to both ends, never an ambient global. Dispatch is a direct
//! call: no envelope framing, no daemons, no framework-level timeouts.

use crate::config::BusConfig;
use crate::envelope::{ServiceRequest, ServiceResponse};
use crate::error::BusError;
use crate::receiver::InboundService;
use crate::codec::Codec;
use crate::transport::{BusDispatcher, BusReceiver, TransportBindings};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// The shared lookup the dispatcher uses to find the other end of the bus.
#[derive(Default)]
struct LocalHub {
    services: RwLock<HashMap<String, Arc<dyn InboundService>>>,
}

impl LocalHub {
    fn lookup(&self, contract: &str) -> Option<Arc<dyn InboundService>> {
        self.services.read().get(contract).cloned()
    }
}

/// Bindings that let two objects in the same process interact as bus
/// services.
///
/// Clones share the hub, so handing a clone to another component keeps both
/// ends connected to the same set of services.
pub struct LocalBindings<C: Codec> {
    codec: Arc<C>,
    hub: Arc<LocalHub>,
}

impl<C: Codec> LocalBindings<C> {
    /// Creates bindings with a fresh, empty hub.
    ///
    /// The codec is never used to frame the envelope on this transport; it
    /// only encodes argument and result payloads at the call boundary, so
    /// both ends agree with any remote peers that share the same service
    /// code.
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            hub: Arc::new(LocalHub::default()),
        }
    }
}

impl<C: Codec> Clone for LocalBindings<C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            hub: self.hub.clone(),
        }
    }
}

impl<C: Codec> TransportBindings for LocalBindings<C> {
    type Codec = C;

    fn codec(&self) -> Arc<C> {
        self.codec.clone()
    }

    fn dispatcher(&self, contract: &str, _config: BusConfig) -> Arc<dyn BusDispatcher> {
        Arc::new(LocalDispatcher {
            contract: contract.to_string(),
            hub: self.hub.clone(),
            connected: AtomicBool::new(false),
        })
    }

    fn receiver(
        &self,
        service: Arc<dyn InboundService>,
        _config: BusConfig,
    ) -> Arc<dyn BusReceiver> {
        Arc::new(LocalReceiver {
            hub: self.hub.clone(),
            service,
        })
    }
}

/// Dispatcher half: looks the service up in the hub and calls it.
struct LocalDispatcher {
    contract: String,
    hub: Arc<LocalHub>,
    connected: AtomicBool,
}

#[async_trait]
impl BusDispatcher for LocalDispatcher {
    fn contract(&self) -> &str {
        &self.contract
    }

    /// The receiver side owns all setup, so this just marks the dispatcher
    /// connected.
    async fn connect(&self) -> Result<(), BusError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn apply(&self, request: ServiceRequest) -> Result<ServiceResponse, BusError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected(format!(
                "local dispatcher for [{}] is not connected",
                self.contract
            )));
        }
        let service = self.hub.lookup(&request.service_type).ok_or_else(|| {
            BusError::NotConnected(format!(
                "no local receiver connected for [{}]",
                request.service_type
            ))
        })?;
        Ok(service.apply(request).await)
    }
}

/// Receiver half: installs the service in the hub while connected.
struct LocalReceiver {
    hub: Arc<LocalHub>,
    service: Arc<dyn InboundService>,
}

#[async_trait]
impl BusReceiver for LocalReceiver {
    fn contract(&self) -> &str {
        self.service.contract()
    }

    async fn connect(&self) -> Result<(), BusError> {
        let contract = self.service.contract().to_string();
        info!(service = %contract, "connecting local receiver");
        self.hub
            .services
            .write()
            .insert(contract, self.service.clone());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.hub.services.write().remove(self.service.contract());
        Ok(())
    }
}
