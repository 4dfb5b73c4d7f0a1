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

//! The server side of a call: resolving a request to a target operation and
//! producing its response.
//!
//! A [`ServiceAdapter`] is built once at registration time and maps each
//! exposed operation to a typed thunk that unpacks the encoded arguments,
//! invokes the concrete method on the held implementation, and encodes the
//! return value. The [`ReceiverCore`] drives that table for every inbound
//! request, whichever transport delivered it: install the request's ambient
//! context, resolve `(method name, argument types)`, invoke, and package the
//! outcome, success or failure, into a [`ServiceResponse`].
//!
//! Producing a response never fails. A missing operation, an argument that
//! will not decode, a failing implementation: all of it is captured into the
//! response and shipped back, and the worker moves on to the next request.

use crate::codec::Codec;
use crate::context::ContextProvider;
use crate::envelope::{type_token, ArgumentBytes, ServiceRequest, ServiceResponse};
use crate::error::{FaultKind, HandlerError, ServiceFault};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Transport-facing view of a connected service: something that turns an
/// inbound request into a response.
///
/// Every transport receiver holds one of these and nothing more; the method
/// table, codec, and context plumbing live behind it.
#[async_trait]
pub trait InboundService: Send + Sync + 'static {
    /// The fully-qualified contract this service implements.
    fn contract(&self) -> &str;

    /// Resolves and invokes the requested operation. Never fails; errors are
    /// captured into the returned response.
    async fn apply(&self, request: ServiceRequest) -> ServiceResponse;
}

/// A typed thunk: decodes arguments, invokes the implementation, encodes the
/// result.
type Thunk<C> = Arc<
    dyn Fn(Arc<C>, Vec<ArgumentBytes>) -> BoxFuture<'static, Result<Vec<u8>, ServiceFault>>
        + Send
        + Sync,
>;

/// One exposed operation: its declared parameter types and the thunk that
/// services it.
struct MethodEntry<C> {
    argument_types: Vec<String>,
    thunk: Thunk<C>,
}

/// Registration-time builder mapping the operations of one service
/// implementation to typed thunks.
///
/// This plays the role runtime reflection plays elsewhere: instead of
/// looking a method up by name on a live object, each operation is adapted
/// by hand when the service is implemented. The `method0` … `method3`
/// builders cover the practical arities; handlers receive the shared
/// implementation value and the decoded arguments, and return
/// `Result<R, HandlerError>`.
///
/// ```
/// use boson::codec::JsonCodec;
/// use boson::receiver::ServiceAdapter;
/// use std::sync::Arc;
///
/// struct Hello;
///
/// let adapter: ServiceAdapter<Hello, JsonCodec> =
///     ServiceAdapter::new("examples.HelloService", Arc::new(Hello))
///         .method1("say", |_svc, phrase: String| async move {
///             Ok(phrase.replace("Hello", "Goodbye"))
///         });
/// ```
pub struct ServiceAdapter<S, C: Codec> {
    contract: String,
    service: Arc<S>,
    entries: HashMap<String, Vec<MethodEntry<C>>>,
}

impl<S, C> ServiceAdapter<S, C>
where
    S: Send + Sync + 'static,
    C: Codec,
{
    /// Starts an adapter for the given contract around the implementation
    /// value it will hold for its lifetime.
    pub fn new(contract: impl Into<String>, service: Arc<S>) -> Self {
        Self {
            contract: contract.into(),
            service,
            entries: HashMap::new(),
        }
    }

    /// Exposes a niladic operation.
    pub fn method0<R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        R: Serialize + Send + 'static,
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let service = self.service.clone();
        let handler = Arc::new(handler);
        let thunk: Thunk<C> = Arc::new(move |codec, args| {
            let service = service.clone();
            let handler = handler.clone();
            Box::pin(async move {
                expect_arity(&args, 0)?;
                let value = (*handler)(service)
                    .await
                    .map_err(|e| ServiceFault::invocation(&e))?;
                encode_result(&*codec, &value)
            })
        });
        self.insert(name, Vec::new(), thunk);
        self
    }

    /// Exposes a one-argument operation.
    pub fn method1<A1, R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        A1: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<S>, A1) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let service = self.service.clone();
        let handler = Arc::new(handler);
        let thunk: Thunk<C> = Arc::new(move |codec, args| {
            let service = service.clone();
            let handler = handler.clone();
            Box::pin(async move {
                expect_arity(&args, 1)?;
                let a1: A1 = decode_argument(&*codec, &args[0], 0)?;
                let value = (*handler)(service, a1)
                    .await
                    .map_err(|e| ServiceFault::invocation(&e))?;
                encode_result(&*codec, &value)
            })
        });
        self.insert(name, vec![type_token::<A1>().to_string()], thunk);
        self
    }

    /// Exposes a two-argument operation.
    pub fn method2<A1, A2, R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        A1: DeserializeOwned + Send + 'static,
        A2: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<S>, A1, A2) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let service = self.service.clone();
        let handler = Arc::new(handler);
        let thunk: Thunk<C> = Arc::new(move |codec, args| {
            let service = service.clone();
            let handler = handler.clone();
            Box::pin(async move {
                expect_arity(&args, 2)?;
                let a1: A1 = decode_argument(&*codec, &args[0], 0)?;
                let a2: A2 = decode_argument(&*codec, &args[1], 1)?;
                let value = (*handler)(service, a1, a2)
                    .await
                    .map_err(|e| ServiceFault::invocation(&e))?;
                encode_result(&*codec, &value)
            })
        });
        self.insert(
            name,
            vec![
                type_token::<A1>().to_string(),
                type_token::<A2>().to_string(),
            ],
            thunk,
        );
        self
    }

    /// Exposes a three-argument operation.
    pub fn method3<A1, A2, A3, R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        A1: DeserializeOwned + Send + 'static,
        A2: DeserializeOwned + Send + 'static,
        A3: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<S>, A1, A2, A3) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let service = self.service.clone();
        let handler = Arc::new(handler);
        let thunk: Thunk<C> = Arc::new(move |codec, args| {
            let service = service.clone();
            let handler = handler.clone();
            Box::pin(async move {
                expect_arity(&args, 3)?;
                let a1: A1 = decode_argument(&*codec, &args[0], 0)?;
                let a2: A2 = decode_argument(&*codec, &args[1], 1)?;
                let a3: A3 = decode_argument(&*codec, &args[2], 2)?;
                let value = (*handler)(service, a1, a2, a3)
                    .await
                    .map_err(|e| ServiceFault::invocation(&e))?;
                encode_result(&*codec, &value)
            })
        });
        self.insert(
            name,
            vec![
                type_token::<A1>().to_string(),
                type_token::<A2>().to_string(),
                type_token::<A3>().to_string(),
            ],
            thunk,
        );
        self
    }

    /// The contract this adapter exposes.
    pub fn contract(&self) -> &str {
        &self.contract
    }

    fn insert(&mut self, name: &str, argument_types: Vec<String>, thunk: Thunk<C>) {
        self.entries.entry(name.to_string()).or_default().push(MethodEntry {
            argument_types,
            thunk,
        });
    }
}

fn expect_arity(args: &[ArgumentBytes], expected: usize) -> Result<(), ServiceFault> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ServiceFault::new(
            FaultKind::Contract,
            format!("expected {expected} arguments, received {}", args.len()),
        ))
    }
}

fn decode_argument<C: Codec, A: DeserializeOwned>(
    codec: &C,
    bytes: &[u8],
    position: usize,
) -> Result<A, ServiceFault> {
    codec.decode(bytes).map_err(|e| {
        ServiceFault::new(
            FaultKind::Contract,
            format!("argument {position} does not decode: {e}"),
        )
    })
}

fn encode_result<C: Codec, R: Serialize>(codec: &C, value: &R) -> Result<Vec<u8>, ServiceFault> {
    codec
        .encode(value)
        .map_err(|e| ServiceFault::new(FaultKind::Serialization, e.to_string()))
}

/// Resolves inbound requests against a service's method table and produces
/// their responses.
pub struct ReceiverCore<C: Codec> {
    contract: String,
    entries: HashMap<String, Vec<MethodEntry<C>>>,
    codec: Arc<C>,
    context: Arc<dyn ContextProvider>,
    service_info: String,
}

impl<C: Codec> ReceiverCore<C> {
    /// Builds the core from a finished adapter, the transport's codec, and
    /// the ambient context provider.
    pub fn new<S>(
        adapter: ServiceAdapter<S, C>,
        codec: Arc<C>,
        context: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            contract: adapter.contract,
            entries: adapter.entries,
            codec,
            context,
            service_info: format!("worker pid {}", std::process::id()),
        }
    }

    /// Looks up the thunk for `(method name, argument types)`.
    ///
    /// Exact type-list match wins. Failing that, a unique arity match is
    /// accepted: callers compiled elsewhere may carry differently spelled
    /// type tokens for the same shapes. No match and non-unique arity
    /// matches both resolve to a fault.
    fn resolve(&self, request: &ServiceRequest) -> Result<Thunk<C>, ServiceFault> {
        let candidates = self.entries.get(&request.method_name).ok_or_else(|| {
            ServiceFault::new(
                FaultKind::Resolution,
                format!(
                    "no operation [{}] on service [{}]",
                    request.method_name, self.contract
                ),
            )
        })?;

        if let Some(entry) = candidates
            .iter()
            .find(|entry| entry.argument_types == request.argument_types)
        {
            return Ok(entry.thunk.clone());
        }

        let mut by_arity = candidates
            .iter()
            .filter(|entry| entry.argument_types.len() == request.argument_types.len());
        match (by_arity.next(), by_arity.next()) {
            (Some(entry), None) => Ok(entry.thunk.clone()),
            (Some(_), Some(_)) => Err(ServiceFault::new(
                FaultKind::Resolution,
                format!(
                    "ambiguous operation [{}/{}] on service [{}]",
                    request.method_name,
                    request.argument_types.len(),
                    self.contract
                ),
            )),
            (None, _) => Err(ServiceFault::new(
                FaultKind::Resolution,
                format!(
                    "no operation [{}] with matching arguments on service [{}]",
                    request.method_name, self.contract
                ),
            )),
        }
    }
}

#[async_trait]
impl<C: Codec> InboundService for ReceiverCore<C> {
    fn contract(&self) -> &str {
        &self.contract
    }

    async fn apply(&self, request: ServiceRequest) -> ServiceResponse {
        // The principal/authorization information must be in place before
        // the method body runs.
        self.context.set(request.context.clone());

        let outcome = match self.resolve(&request) {
            Ok(thunk) => thunk(self.codec.clone(), request.arguments.clone()).await,
            Err(fault) => Err(fault),
        };

        let mut response = match outcome {
            Ok(result) => ServiceResponse::ok(&request, result),
            Err(fault) => {
                debug!(service = %self.contract, "{request} failed: {fault}");
                ServiceResponse::fail(&request, fault)
            }
        };
        response.service_info = Some(self.service_info.clone());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::context::ThreadLocalContextProvider;
    use crate::envelope::ServiceContext;

    struct Calculator;

    impl Calculator {
        async fn add(&self, a: i32, b: i32) -> Result<i32, HandlerError> {
            Ok(a + b)
        }

        async fn div(&self, a: i32, b: i32) -> Result<i32, HandlerError> {
            if b == 0 {
                Err("division by zero".into())
            } else {
                Ok(a / b)
            }
        }
    }

    fn calculator_core() -> ReceiverCore<JsonCodec> {
        let codec = Arc::new(JsonCodec::new());
        let adapter = ServiceAdapter::new("examples.Calculator", Arc::new(Calculator))
            .method2("add", |svc: Arc<Calculator>, a: i32, b: i32| async move {
                svc.add(a, b).await
            })
            .method2("div", |svc: Arc<Calculator>, a: i32, b: i32| async move {
                svc.div(a, b).await
            })
            .method0("ping", |_svc| async move { Ok("pong".to_string()) });
        ReceiverCore::new(adapter, codec, Arc::new(ThreadLocalContextProvider::new()))
    }

    fn request_for(method: &str, args: &[i32]) -> ServiceRequest {
        let codec = JsonCodec::new();
        let types = args.iter().map(|_| type_token::<i32>().to_string()).collect();
        let values = args.iter().map(|a| codec.encode(a).unwrap()).collect();
        ServiceRequest::new("examples.Calculator", method).with_arguments(types, values)
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let core = calculator_core();
        let response = core.apply(request_for("add", &[2, 3])).await;
        assert!(response.is_success());
        let value: i32 = JsonCodec::new().decode(&response.result.unwrap()).unwrap();
        assert_eq!(value, 5);
        assert!(response.service_info.unwrap().contains("pid"));
    }

    #[tokio::test]
    async fn test_invocation_error_is_captured() {
        let core = calculator_core();
        let response = core.apply(request_for("div", &[1, 0])).await;
        let fault = response.error.unwrap();
        assert_eq!(fault.kind, FaultKind::Invocation);
        assert!(fault.message.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_unknown_method_resolution_fault() {
        let core = calculator_core();
        let response = core.apply(request_for("mul", &[2, 3])).await;
        assert_eq!(response.error.unwrap().kind, FaultKind::Resolution);
    }

    #[tokio::test]
    async fn test_wrong_arity_resolution_fault() {
        let core = calculator_core();
        let response = core.apply(request_for("add", &[2])).await;
        assert_eq!(response.error.unwrap().kind, FaultKind::Resolution);
    }

    #[tokio::test]
    async fn test_arity_fallback_for_foreign_type_tokens() {
        let core = calculator_core();
        let codec = JsonCodec::new();
        let request = ServiceRequest::new("examples.Calculator", "add").with_arguments(
            vec!["int".into(), "int".into()],
            vec![codec.encode(&4).unwrap(), codec.encode(&5).unwrap()],
        );
        let response = core.apply(request).await;
        let value: i32 = codec.decode(&response.result.unwrap()).unwrap();
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_undecodable_argument_contract_fault() {
        let core = calculator_core();
        let codec = JsonCodec::new();
        let request = ServiceRequest::new("examples.Calculator", "add").with_arguments(
            vec![
                type_token::<i32>().to_string(),
                type_token::<i32>().to_string(),
            ],
            vec![
                codec.encode(&"not a number").unwrap(),
                codec.encode(&2).unwrap(),
            ],
        );
        let response = core.apply(request).await;
        assert_eq!(response.error.unwrap().kind, FaultKind::Contract);
    }

    #[tokio::test]
    async fn test_context_installed_before_invocation() {
        struct Peek;
        let provider = Arc::new(ThreadLocalContextProvider::new());
        let codec = Arc::new(JsonCodec::new());
        let adapter = ServiceAdapter::new("examples.Peek", Arc::new(Peek)).method0(
            "who",
            |_svc: Arc<Peek>| async move {
                Ok(ThreadLocalContextProvider::new()
                    .get()
                    .get("principal")
                    .cloned()
                    .unwrap_or_default())
            },
        );
        let core = ReceiverCore::new(adapter, codec, provider);

        let mut context = ServiceContext::new();
        context.insert("principal".into(), "rob".into());
        let request = ServiceRequest::new("examples.Peek", "who").with_context(context);
        let response = core.apply(request).await;
        let who: String = JsonCodec::new().decode(&response.result.unwrap()).unwrap();
        assert_eq!(who, "rob");
    }
}
