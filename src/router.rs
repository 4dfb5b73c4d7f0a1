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

//! Correlation of in-flight requests with asynchronously arriving responses.
//!
//! Some transports have no 1-to-1 line of communication between the code
//! that dispatches a request and the code that observes its response: the
//! broker transport pulls replies off a queue on a pump task that knows
//! nothing about callers. The [`ResponseRouter`] owns the pending entry for
//! every outstanding request, completes the right caller when a correlated
//! response shows up, and expires entries whose deadline passed.
//!
//! A completion is resolved at most once: `complete`, `cancel`, and
//! `reap_expired` all go through an atomic remove on the pending map, so no
//! two of them can observe the same entry.

use crate::envelope::{ServiceRequest, ServiceResponse};
use crate::error::BusError;
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// The caller's half of a pending call: resolves with the response, or with
/// the error that ended the wait.
pub type Completion = oneshot::Receiver<Result<ServiceResponse, BusError>>;

/// Links a request to the sender that completes its caller when the
/// correlating response finally arrives.
struct PendingRequest {
    request: ServiceRequest,
    tx: oneshot::Sender<Result<ServiceResponse, BusError>>,
}

/// Correlates outstanding requests with inbound responses and expires the
/// stale ones.
///
/// The pending map is touched by at least three actors: the dispatching
/// task (`open`), the response pump (`complete`), and the reaper
/// (`reap_expired`). Every mutation happens under one async mutex, and
/// removal is the only way an entry leaves the map.
pub struct ResponseRouter {
    /// Requests still waiting for a response, keyed by request id.
    pending: Mutex<HashMap<Uuid, PendingRequest>>,
    /// The service this router routes for; debugging only.
    service_name: String,
}

impl ResponseRouter {
    /// Creates a router for the named service.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            pending: Mutex::new(HashMap::with_capacity(1024)),
            service_name: service_name.into(),
        }
    }

    /// Creates a route for the given request and returns the completion its
    /// caller will wait on.
    ///
    /// Call this BEFORE handing the request to the transport. Opening the
    /// route after publishing leaves a window where an extremely fast reply
    /// finds no pending entry and is discarded as unroutable.
    pub async fn open(&self, request: ServiceRequest) -> Completion {
        let (tx, rx) = oneshot::channel();
        let entry = PendingRequest { request, tx };
        self.pending.lock().await.insert(entry.request.id, entry);
        rx
    }

    /// Routes the response to the request waiting on it, resolving the
    /// caller's completion.
    ///
    /// A response with no pending entry (already completed, cancelled,
    /// expired, or never ours) is logged once and dropped.
    pub async fn complete(&self, response: ServiceResponse) {
        let entry = self.pending.lock().await.remove(&response.id);
        match entry {
            Some(pending) => {
                trace!(service = %self.service_name, "routing {response}");
                // The oneshot wakes the caller on its own task; nothing runs
                // inline on the pump. A dropped receiver means the caller
                // stopped listening, which is its prerogative.
                let _ = pending.tx.send(Ok(response));
            }
            None => {
                warn!(service = %self.service_name, "no pending request for {response}");
            }
        }
    }

    /// Cancels the given request if it is still awaiting a response, failing
    /// its completion with a timeout.
    pub async fn cancel(&self, request: &ServiceRequest) {
        self.cancel_id(request.id).await;
    }

    /// Finds all requests that missed their window for receiving a response
    /// and cancels them.
    pub async fn reap_expired(&self) {
        trace!(service = %self.service_name, "canceling expired requests");

        // Snapshot the expired ids first, then remove one by one: no
        // mutation while walking the map, and an entry that completes
        // between the snapshot and the remove simply is not there anymore.
        let expired: Vec<Uuid> = self
            .pending
            .lock()
            .await
            .values()
            .filter(|pending| pending.request.is_expired())
            .map(|pending| pending.request.id)
            .collect();

        for id in expired {
            self.cancel_id(id).await;
        }
    }

    /// The number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn cancel_id(&self, id: Uuid) {
        let entry = self.pending.lock().await.remove(&id);
        if let Some(pending) = entry {
            debug!(
                service = %self.service_name,
                "canceling {}", pending.request
            );
            let timeout = BusError::Timeout {
                service: self.service_name.clone(),
                request_id: id,
            };
            if pending.tx.send(Err(timeout)).is_err() {
                // The caller went away before we could fail it; nothing left
                // to clean up, but worth a line if it keeps happening.
                error!(service = %self.service_name, %id, "canceled request had no listener");
            }
        }
    }
}

impl std::fmt::Debug for ResponseRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseRouter")
            .field("service_name", &self.service_name)
            .finish()
    }
}
