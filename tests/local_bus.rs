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

//! End-to-end scenarios over the in-process transport.

use boson::codec::JsonCodec;
use boson::context::{ContextProvider, ThreadLocalContextProvider};
use boson::envelope::ServiceContext;
use boson::error::{BusError, HandlerError};
use boson::proxy::ClientProxy;
use boson::receiver::ServiceAdapter;
use boson::registry::ServiceRegistry;
use boson::transport::local::LocalBindings;
use boson::BusConfig;
use std::sync::Arc;

const HELLO_CONTRACT: &str = "examples.HelloService";

/// Responds to text like "Hello World" with the equivalent goodbye phrase.
struct SimpleHelloService;

impl SimpleHelloService {
    async fn say(&self, phrase: String) -> Result<String, HandlerError> {
        Ok(phrase
            .split(' ')
            .map(|tok| match tok {
                "Hello" => "Goodbye",
                "hello" => "goodbye",
                other => other,
            })
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn refuse(&self) -> Result<String, HandlerError> {
        Err("not in the mood".into())
    }
}

fn hello_adapter() -> ServiceAdapter<SimpleHelloService, JsonCodec> {
    ServiceAdapter::new(HELLO_CONTRACT, Arc::new(SimpleHelloService))
        .method1("say", |svc: Arc<SimpleHelloService>, phrase: String| {
            async move { svc.say(phrase).await }
        })
        .method0("refuse", |svc: Arc<SimpleHelloService>| async move {
            svc.refuse().await
        })
}

/// Hand-written typed stub over the call primitive.
struct HelloClient {
    proxy: ClientProxy<JsonCodec>,
}

impl HelloClient {
    async fn say(&self, phrase: &str) -> Result<String, BusError> {
        self.proxy
            .call("say", self.proxy.arguments().push(&phrase.to_string())?)
            .await
    }
}

fn config() -> BusConfig {
    BusConfig::new("local://in-process")
}

fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn hello_bus() -> (ServiceRegistry, LocalBindings<JsonCodec>, HelloClient) {
    trace_init();
    let registry = ServiceRegistry::new();
    let bindings = LocalBindings::new(JsonCodec::new());
    registry
        .implement(hello_adapter(), &bindings, config())
        .await
        .unwrap();
    let proxy = registry
        .consume(HELLO_CONTRACT, &bindings, config())
        .await
        .unwrap();
    (registry, bindings, HelloClient { proxy })
}

#[tokio::test]
async fn test_in_process_echo() {
    let (_registry, _bindings, client) = hello_bus().await;
    let reply = client.say("Hello World").await.unwrap();
    assert_eq!(reply, "Goodbye World");
}

#[tokio::test]
async fn test_duplicate_implement_is_rejected_and_first_survives() {
    let (registry, bindings, client) = hello_bus().await;

    let second = registry.implement(hello_adapter(), &bindings, config()).await;
    assert!(matches!(second, Err(BusError::AlreadyRegistered(c)) if c == HELLO_CONTRACT));

    // The first registration keeps working.
    let reply = client.say("Hello again").await.unwrap();
    assert_eq!(reply, "Goodbye again");
}

#[tokio::test]
async fn test_duplicate_consume_is_rejected() {
    let (registry, bindings, _client) = hello_bus().await;
    let second = registry.consume(HELLO_CONTRACT, &bindings, config()).await;
    assert!(matches!(second, Err(BusError::AlreadyRegistered(_))));
}

#[tokio::test]
async fn test_unknown_method_is_a_resolution_error() {
    let (_registry, _bindings, client) = hello_bus().await;
    let outcome: Result<String, _> = client.proxy.call("shout", client.proxy.arguments()).await;
    assert!(matches!(outcome, Err(BusError::Resolution(_))));
}

#[tokio::test]
async fn test_implementation_failure_reaches_the_caller() {
    let (_registry, _bindings, client) = hello_bus().await;
    let outcome: Result<String, _> = client.proxy.call("refuse", client.proxy.arguments()).await;
    assert!(matches!(outcome, Err(BusError::Invocation(m)) if m.contains("not in the mood")));
}

#[tokio::test]
async fn test_wrong_argument_count_is_rejected() {
    let (_registry, _bindings, client) = hello_bus().await;
    let args = client
        .proxy
        .arguments()
        .push(&"Hello".to_string())
        .unwrap()
        .push(&"World".to_string())
        .unwrap();
    let outcome: Result<String, _> = client.proxy.call("say", args).await;
    assert!(matches!(outcome, Err(BusError::Resolution(_))));
}

#[tokio::test]
async fn test_context_travels_with_the_call() {
    const PEEK_CONTRACT: &str = "examples.ContextAwareHelloService";

    struct ContextAware;
    let registry = ServiceRegistry::new();
    let bindings = LocalBindings::new(JsonCodec::new());
    let adapter = ServiceAdapter::new(PEEK_CONTRACT, Arc::new(ContextAware)).method1(
        "greet",
        |_svc: Arc<ContextAware>, name: String| async move {
            let principal = ThreadLocalContextProvider::new()
                .get()
                .get("principal")
                .cloned()
                .unwrap_or_else(|| "stranger".to_string());
            Ok(format!("{principal} says hello to {name}"))
        },
    );
    registry.implement(adapter, &bindings, config()).await.unwrap();
    let proxy = registry.consume(PEEK_CONTRACT, &bindings, config()).await.unwrap();

    let provider = ThreadLocalContextProvider::new();
    let mut context = ServiceContext::new();
    context.insert("principal".into(), "rob".into());
    provider.set(context.clone());

    let reply: String = proxy
        .call("greet", proxy.arguments().push(&"ann".to_string()).unwrap())
        .await
        .unwrap();
    assert_eq!(reply, "rob says hello to ann");

    // The caller's context survived the round trip.
    assert_eq!(provider.get(), context);
    provider.set(ServiceContext::new());
}

#[tokio::test]
async fn test_disconnect_all_tears_everything_down() {
    let (registry, _bindings, client) = hello_bus().await;
    assert_eq!(registry.implemented_count(), 1);
    assert_eq!(registry.consumed_count(), 1);

    registry.disconnect_all().await;
    assert_eq!(registry.implemented_count(), 0);
    assert_eq!(registry.consumed_count(), 0);

    // The proxy outlives the registry entry but its transport is gone.
    let outcome = client.say("Hello?").await;
    assert!(matches!(outcome, Err(BusError::NotConnected(_))));
}
