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

//! Ambient context propagation.
//!
//! A [`ContextProvider`] stores the caller's context (think principal,
//! tenant, trace ids) for the duration of a call or series of calls. The
//! proxy reads it at call start and places the snapshot in the request; the
//! receiver installs it before invoking the implementation; the proxy
//! restores it when the completion resolves, because the resumption may land
//! on a different thread than the one that made the call.
//!
//! The default [`ThreadLocalContextProvider`] scopes the context to the
//! current worker thread, which fits thread-affine embedders. Runtimes that
//! hop tasks between threads mid-call should rely on the explicit
//! snapshot/restore the proxy already performs, or plug in a provider that
//! matches their own ambient mechanism.

use crate::envelope::ServiceContext;
use std::cell::RefCell;

/// Adapter for attaching a context to a call or series of calls.
///
/// An implementation usually matches the threading model of the framework
/// hosting the application.
pub trait ContextProvider: Send + Sync + 'static {
    /// The current context for the request or series of service calls.
    /// Empty when none has been applied.
    fn get(&self) -> ServiceContext;

    /// Applies the context to automatically pass along to remote calls.
    fn set(&self, context: ServiceContext);
}

thread_local! {
    static CONTEXTS: RefCell<ServiceContext> = RefCell::new(ServiceContext::new());
}

/// The reference provider: stores the context on the current thread.
///
/// Wipe the context before a pooled thread is reused, the same way you would
/// any other thread-local.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalContextProvider;

impl ThreadLocalContextProvider {
    /// Creates the provider. All instances share the same per-thread slot.
    pub fn new() -> Self {
        Self
    }
}

impl ContextProvider for ThreadLocalContextProvider {
    fn get(&self) -> ServiceContext {
        CONTEXTS.with(|slot| slot.borrow().clone())
    }

    fn set(&self, context: ServiceContext) {
        CONTEXTS.with(|slot| *slot.borrow_mut() = context);
    }
}
