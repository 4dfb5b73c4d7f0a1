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

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Boson: transport-pluggable RPC service bus
//!
//! Boson lets application code call a locally-held service handle the same
//! way regardless of whether the implementation is in the same process,
//! reachable over HTTP, or reachable through an AMQP message broker.
//!
//! ## Layers
//!
//! - **[`envelope`]**: the [`ServiceRequest`]/[`ServiceResponse`] data model
//!   every transport ships.
//! - **[`codec`]**: the pluggable bytes↔value boundary ([`JsonCodec`],
//!   [`CompactCodec`]).
//! - **[`proxy`]** / **[`receiver`]**: the client-side request synthesis and
//!   the server-side resolve-and-invoke pipeline.
//! - **[`router`]**: correlation of in-flight requests with asynchronously
//!   arriving responses, with expiry reaping.
//! - **[`transport`]**: the three bindings (in-process, HTTP, broker).
//! - **[`registry`]**: the per-process repository tying it all together.
//!
//! ## Quick start
//!
//! ```
//! use boson::codec::JsonCodec;
//! use boson::receiver::ServiceAdapter;
//! use boson::registry::ServiceRegistry;
//! use boson::transport::local::LocalBindings;
//! use boson::BusConfig;
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), boson::BusError> {
//! let registry = ServiceRegistry::new();
//! let bindings = LocalBindings::new(JsonCodec::new());
//!
//! // Server side: adapt the implementation and connect it.
//! let adapter = ServiceAdapter::new("examples.HelloService", Arc::new(Hello))
//!     .method1("say", |_svc, phrase: String| async move {
//!         Ok(phrase.replace("Hello", "Goodbye"))
//!     });
//! registry
//!     .implement(adapter, &bindings, BusConfig::new("local://in-process"))
//!     .await?;
//!
//! // Client side: consume the contract and call it.
//! let proxy = registry
//!     .consume("examples.HelloService", &bindings, BusConfig::new("local://in-process"))
//!     .await?;
//! let reply: String = proxy
//!     .call("say", proxy.arguments().push(&"Hello World".to_string())?)
//!     .await?;
//! assert_eq!(reply, "Goodbye World");
//!
//! registry.disconnect_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! Swapping the `LocalBindings` for
//! [`HttpBindings`](transport::http::HttpBindings) or
//! [`AmqpBindings`](transport::amqp::AmqpBindings) is the whole migration
//! story; the calling code does not change.

pub mod codec;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod proxy;
pub mod receiver;
pub mod registry;
pub mod router;
pub mod transport;

pub use codec::{Codec, CompactCodec, JsonCodec};
pub use config::BusConfig;
pub use context::{ContextProvider, ThreadLocalContextProvider};
pub use envelope::{ServiceContext, ServiceRequest, ServiceResponse};
pub use error::{BusError, FaultKind, HandlerError, ServiceFault};
pub use proxy::ClientProxy;
pub use receiver::{InboundService, ReceiverCore, ServiceAdapter};
pub use registry::ServiceRegistry;
pub use router::ResponseRouter;
pub use transport::{BusDispatcher, BusReceiver, TransportBindings};
