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

//! The client side of a call: synthesizing requests from typed invocations.
//!
//! A [`ClientProxy`] masquerades as the remote service. It turns one method
//! invocation into a [`ServiceRequest`] (contract, method, encoded
//! arguments, ambient context snapshot, deadline), hands it to the
//! transport's dispatcher, and resolves with the decoded result once the
//! response arrives. Typed per-service stubs are a thin hand-written layer
//! over [`call`](ClientProxy::call):
//!
//! ```no_run
//! use boson::codec::JsonCodec;
//! use boson::proxy::ClientProxy;
//! use boson::BusError;
//!
//! struct HelloClient {
//!     proxy: ClientProxy<JsonCodec>,
//! }
//!
//! impl HelloClient {
//!     async fn say(&self, phrase: &str) -> Result<String, BusError> {
//!         self.proxy
//!             .call("say", self.proxy.arguments().push(&phrase.to_string())?)
//!             .await
//!     }
//! }
//! ```

use crate::codec::Codec;
use crate::context::ContextProvider;
use crate::envelope::{type_token, ArgumentBytes, ServiceRequest};
use crate::error::BusError;
use crate::transport::BusDispatcher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Ordered, typed argument payloads under construction for one call.
///
/// Each pushed value records its type token (for overload disambiguation on
/// the worker) alongside its encoded bytes, keeping the two lists in step.
pub struct ArgumentList<C: Codec> {
    codec: Arc<C>,
    types: Vec<String>,
    values: Vec<ArgumentBytes>,
}

impl<C: Codec> ArgumentList<C> {
    fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            types: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends one argument.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Serialization`] if the value cannot be encoded.
    pub fn push<T>(mut self, value: &T) -> Result<Self, BusError>
    where
        T: Serialize,
    {
        self.values.push(self.codec.encode(value)?);
        self.types.push(type_token::<T>().to_string());
        Ok(self)
    }

    /// Number of arguments collected so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no arguments have been collected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn into_parts(self) -> (Vec<String>, Vec<ArgumentBytes>) {
        (self.types, self.values)
    }
}

/// Client-side handle on a remote service.
///
/// Holds the contract identifier and the transport dispatcher; stateless
/// beyond that, and cheap to clone. Created by
/// [`ServiceRegistry::consume`](crate::registry::ServiceRegistry::consume),
/// destroyed when the registry disconnects the underlying dispatcher.
pub struct ClientProxy<C: Codec> {
    contract: String,
    dispatcher: Arc<dyn BusDispatcher>,
    codec: Arc<C>,
    request_ttl: Option<Duration>,
    context: Arc<dyn ContextProvider>,
}

impl<C: Codec> Clone for ClientProxy<C> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            dispatcher: self.dispatcher.clone(),
            codec: self.codec.clone(),
            request_ttl: self.request_ttl,
            context: self.context.clone(),
        }
    }
}

impl<C: Codec> ClientProxy<C> {
    /// Creates a proxy over a connected dispatcher.
    pub fn new(
        contract: impl Into<String>,
        dispatcher: Arc<dyn BusDispatcher>,
        codec: Arc<C>,
        request_ttl: Option<Duration>,
        context: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            contract: contract.into(),
            dispatcher,
            codec,
            request_ttl,
            context,
        }
    }

    /// The contract this proxy fronts.
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Starts an argument list encoded with this proxy's codec.
    pub fn arguments(&self) -> ArgumentList<C> {
        ArgumentList::new(self.codec.clone())
    }

    /// Invokes one operation on the remote service.
    ///
    /// Builds the request (unique id, context snapshot, `now + TTL` expiry
    /// when a TTL is configured), dispatches it, and suspends until the
    /// transport resolves the completion. When the response arrives the
    /// caller's ambient context is restored, since threads may have changed
    /// while the operation sat in a queue, and then:
    ///
    /// - a response carrying an error fails the call with that error;
    /// - otherwise the result payload is decoded into `R`.
    ///
    /// # Errors
    ///
    /// Any of the bus error kinds: transport failures and timeouts surface
    /// from the dispatcher, remote faults are lifted out of the response,
    /// and a result that does not decode into `R` is a
    /// [`BusError::Contract`].
    pub async fn call<R>(&self, method: &str, arguments: ArgumentList<C>) -> Result<R, BusError>
    where
        R: DeserializeOwned,
    {
        let (types, values) = arguments.into_parts();
        let mut request = ServiceRequest::new(self.contract.clone(), method)
            .with_arguments(types, values)
            .with_context(self.context.get());
        if let Some(ttl) = self.request_ttl {
            request = request.ttl(ttl);
        }

        trace!(service = %self.contract, method, "dispatching {request}");
        let context_snapshot = request.context.clone();
        let response = self.dispatcher.apply(request).await?;
        self.context.set(context_snapshot);

        match response.error {
            Some(fault) => Err(fault.into()),
            None => {
                let result = response.result.unwrap_or_default();
                self.codec.decode(&result).map_err(|e| {
                    BusError::Contract(format!(
                        "result of [{}.{}] does not decode: {e}",
                        self.contract, method
                    ))
                })
            }
        }
    }
}

impl<C: Codec> std::fmt::Debug for ClientProxy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProxy")
            .field("contract", &self.contract)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::context::ThreadLocalContextProvider;
    use crate::envelope::{ServiceContext, ServiceResponse};
    use crate::error::{FaultKind, ServiceFault};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Dispatcher double that records the requests it sees and replies from
    /// a canned script.
    struct ScriptedDispatcher {
        seen: Mutex<Vec<ServiceRequest>>,
        reply: Box<dyn Fn(&ServiceRequest) -> Result<ServiceResponse, BusError> + Send + Sync>,
    }

    #[async_trait]
    impl BusDispatcher for ScriptedDispatcher {
        fn contract(&self) -> &str {
            "examples.HelloService"
        }

        async fn connect(&self) -> Result<(), BusError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), BusError> {
            Ok(())
        }

        async fn apply(&self, request: ServiceRequest) -> Result<ServiceResponse, BusError> {
            let reply = (self.reply)(&request);
            self.seen.lock().push(request);
            reply
        }
    }

    fn proxy_over(
        reply: impl Fn(&ServiceRequest) -> Result<ServiceResponse, BusError> + Send + Sync + 'static,
    ) -> (ClientProxy<JsonCodec>, Arc<ScriptedDispatcher>) {
        let dispatcher = Arc::new(ScriptedDispatcher {
            seen: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        });
        let proxy = ClientProxy::new(
            "examples.HelloService",
            dispatcher.clone(),
            Arc::new(JsonCodec::new()),
            Some(Duration::from_secs(300)),
            Arc::new(ThreadLocalContextProvider::new()),
        );
        (proxy, dispatcher)
    }

    #[tokio::test]
    async fn test_call_builds_request_and_decodes_result() {
        let codec = JsonCodec::new();
        let (proxy, dispatcher) = proxy_over(move |request| {
            let phrase: String = codec.decode(&request.arguments[0]).unwrap();
            let reply = phrase.replace("Hello", "Goodbye");
            Ok(ServiceResponse::ok(request, codec.encode(&reply).unwrap()))
        });

        let reply: String = proxy
            .call(
                "say",
                proxy.arguments().push(&"Hello World".to_string()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(reply, "Goodbye World");

        let seen = dispatcher.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].service_type, "examples.HelloService");
        assert_eq!(seen[0].method_name, "say");
        assert_eq!(seen[0].argument_types.len(), 1);
        assert!(seen[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn test_remote_fault_fails_the_call() {
        let (proxy, _) = proxy_over(|request| {
            Ok(ServiceResponse::fail(
                request,
                ServiceFault::new(FaultKind::Invocation, "boom"),
            ))
        });

        let outcome: Result<String, _> = proxy.call("say", proxy.arguments()).await;
        assert!(matches!(outcome, Err(BusError::Invocation(m)) if m == "boom"));
    }

    #[tokio::test]
    async fn test_undecodable_result_is_contract_error() {
        let codec = JsonCodec::new();
        let (proxy, _) = proxy_over(move |request| {
            Ok(ServiceResponse::ok(request, codec.encode(&42).unwrap()))
        });

        let outcome: Result<Vec<String>, _> = proxy.call("say", proxy.arguments()).await;
        assert!(matches!(outcome, Err(BusError::Contract(_))));
    }

    #[tokio::test]
    async fn test_context_rides_the_request_and_is_restored() {
        let provider = ThreadLocalContextProvider::new();
        let mut context = ServiceContext::new();
        context.insert("principal".into(), "rob".into());
        provider.set(context.clone());

        let codec = JsonCodec::new();
        let (proxy, dispatcher) = proxy_over(move |request| {
            Ok(ServiceResponse::ok(request, codec.encode(&()).unwrap()))
        });

        // The dispatcher double completes inline on the calling task, so the
        // restore lands on this thread's provider.
        let _: () = proxy.call("touch", proxy.arguments()).await.unwrap();
        assert_eq!(dispatcher.seen.lock()[0].context, context);
        assert_eq!(provider.get(), context);

        provider.set(ServiceContext::new());
    }
}
