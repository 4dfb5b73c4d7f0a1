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

//! Transport bindings: the pluggable seam between the envelope and a wire.
//!
//! Every transport supplies the same two objects:
//!
//! - a [`BusDispatcher`] (the client end) that ships a request and resolves
//!   its completion with the correlated response, and
//! - a [`BusReceiver`] (the server end) that pulls requests off the wire,
//!   feeds them to an [`InboundService`](crate::receiver::InboundService),
//!   and ships the responses back by whatever reply mechanism the transport
//!   has.
//!
//! A [`TransportBindings`] value is the factory pairing the two, plus the
//! codec they share. Three bindings are provided: [`local`] (same process),
//! [`http`] (POST per request), and [`amqp`] (broker-mediated queues).
//!
//! It is up to the embedder to hand matching bindings to both sides: a
//! dispatcher speaking HTTP to a receiver listening on a broker is going to
//! have a bad time.

use crate::codec::Codec;
use crate::config::BusConfig;
use crate::envelope::{ServiceRequest, ServiceResponse};
use crate::error::BusError;
use crate::receiver::InboundService;
use async_trait::async_trait;
use std::sync::Arc;

pub mod amqp;
pub mod http;
pub mod local;

/// The client end of a transport: dispatches requests for one service
/// contract across the bus.
#[async_trait]
pub trait BusDispatcher: Send + Sync + 'static {
    /// The contract this dispatcher sends requests for.
    fn contract(&self) -> &str;

    /// Performs the connection setup and resource allocation this transport
    /// needs before it can dispatch: opening broker connections, declaring
    /// queues, starting pump daemons. Idempotence is not required; connect
    /// once.
    async fn connect(&self) -> Result<(), BusError>;

    /// Releases every connection and resource held by this dispatcher. The
    /// dispatcher cannot be used afterwards.
    async fn disconnect(&self) -> Result<(), BusError>;

    /// Ships the request and resolves with its response.
    ///
    /// The returned future is the caller's completion: it suspends until
    /// response arrival, cancellation, or expiry, and resolves exactly once.
    async fn apply(&self, request: ServiceRequest) -> Result<ServiceResponse, BusError>;
}

/// The server end of a transport: feeds inbound requests for one contract to
/// the service that implements it.
#[async_trait]
pub trait BusReceiver: Send + Sync + 'static {
    /// The contract this receiver accepts requests for.
    fn contract(&self) -> &str;

    /// Fires up the communication channel so requests start flowing to the
    /// held service.
    async fn connect(&self) -> Result<(), BusError>;

    /// Stops taking new requests. Work already started is unaffected.
    async fn disconnect(&self) -> Result<(), BusError>;
}

/// Factory for the two ends of one transport scheme.
///
/// Both factory methods hand out fresh instances; do not call them twice
/// expecting the same object back. The bindings own the codec; dispatchers
/// and receivers created here share it.
pub trait TransportBindings: Send + Sync {
    /// The codec this transport frames values with.
    type Codec: Codec;

    /// The shared codec instance.
    fn codec(&self) -> Arc<Self::Codec>;

    /// Creates the dispatcher (client) end for a contract.
    fn dispatcher(&self, contract: &str, config: BusConfig) -> Arc<dyn BusDispatcher>;

    /// Creates the receiver (server) end wrapping a connected service.
    fn receiver(
        &self,
        service: Arc<dyn InboundService>,
        config: BusConfig,
    ) -> Arc<dyn BusReceiver>;
}
