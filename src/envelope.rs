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

//! The RPC envelope: the self-describing unit of work and its reply.
//!
//! A [`ServiceRequest`] carries everything a remote worker needs to invoke
//! one operation: the contract, the method, the typed argument payloads, an
//! ambient context snapshot, an optional deadline, and the correlation value
//! some transports need to route the reply back. A [`ServiceResponse`]
//! mirrors the request's id and correlation and carries exactly one of a
//! result or a [`ServiceFault`].
//!
//! Requests are immutable once dispatched; every field a transport is allowed
//! to fill in (the correlation) is set before the request leaves the
//! dispatcher.

use crate::error::ServiceFault;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Opaque caller-supplied key/value map carried across the wire and
/// reinstated at both ends of a call.
pub type ServiceContext = HashMap<String, String>;

/// A single codec-encoded argument payload.
///
/// Arguments travel individually encoded so the receiver's typed method
/// table can decode each one to its declared parameter type.
pub type ArgumentBytes = Vec<u8>;

/// Returns the stable identifier used for a type in
/// [`ServiceRequest::argument_types`].
pub fn type_token<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}

/// Encapsulates all of the information required to invoke a remote method on
/// a service.
///
/// Different transports may not need every field (an HTTP call has no use
/// for `correlation` since the reply rides the same connection), but this is
/// sufficient for every implemented scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Globally unique identifier distinguishing this request from any other
    /// that flows through the bus. Generated at creation.
    pub id: Uuid,
    /// Fully-qualified name of the service contract the target implements.
    pub service_type: String,
    /// Name of the operation to invoke on the implementation.
    pub method_name: String,
    /// Ordered type identifiers for the arguments; disambiguates targets
    /// with the same method name.
    pub argument_types: Vec<String>,
    /// Ordered, individually encoded argument values. Always the same length
    /// as `argument_types`.
    pub arguments: Vec<ArgumentBytes>,
    /// Opaque value some transports use to address the reply destination,
    /// e.g. the name of the caller's private reply queue. Set by the
    /// transport, not by the proxy.
    pub correlation: Option<String>,
    /// Absolute wall-clock instant after which the caller gives up on a
    /// reply.
    pub expires_at: Option<SystemTime>,
    /// Snapshot of the caller's ambient context, reinstated on the worker
    /// before invocation and restored on the caller when the reply arrives.
    pub context: ServiceContext,
}

impl ServiceRequest {
    /// Creates a request for one operation on a contract. The id is
    /// generated here; arguments, context, and expiry are applied by the
    /// proxy before dispatch.
    pub fn new(service_type: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_type: service_type.into(),
            method_name: method_name.into(),
            argument_types: Vec::new(),
            arguments: Vec::new(),
            correlation: None,
            expires_at: None,
            context: ServiceContext::new(),
        }
    }

    /// Applies the typed argument payloads.
    pub fn with_arguments(mut self, types: Vec<String>, values: Vec<ArgumentBytes>) -> Self {
        debug_assert_eq!(types.len(), values.len());
        self.argument_types = types;
        self.arguments = values;
        self
    }

    /// Applies the caller's ambient context snapshot.
    pub fn with_context(mut self, context: ServiceContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the expiration to occur after the given amount of time.
    ///
    /// This is an upper bound on how long the caller is willing to wait, not
    /// a cancellation of in-progress work: a worker that blows past it still
    /// finishes, the caller just gets a timeout instead of the result.
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.expires_at = Some(SystemTime::now() + duration);
        self
    }

    /// Sets the correlation id/address for this request.
    pub fn correlate(mut self, correlation: impl Into<String>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }

    /// Has this request surpassed its window for being completed?
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => SystemTime::now() > expires_at,
            None => false,
        }
    }
}

impl std::fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServiceRequest[{}]", self.id)
    }
}

/// The reply to a [`ServiceRequest`].
///
/// Exactly one of `result` / `error` is present; construction goes through
/// [`ok`](ServiceResponse::ok) or [`fail`](ServiceResponse::fail) so the
/// invariant holds by shape. Response construction never fails; failures
/// are what responses carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// Mirrors the originating request's id.
    pub id: Uuid,
    /// Mirrors the originating request's correlation.
    pub correlation: Option<String>,
    /// The encoded return value. Present iff the invocation succeeded.
    pub result: Option<Vec<u8>>,
    /// The captured failure. Present iff the invocation failed.
    pub error: Option<ServiceFault>,
    /// Point in time after which a queueing transport should purge this
    /// reply if the caller has not consumed it. Meaningless to transports
    /// that hold the connection open.
    pub expires_at: Option<SystemTime>,
    /// Debug stamp identifying the worker that serviced the request. Serves
    /// no transport purpose.
    pub service_info: Option<String>,
}

impl ServiceResponse {
    /// A successful response carrying the encoded return value.
    pub fn ok(request: &ServiceRequest, result: Vec<u8>) -> Self {
        Self {
            id: request.id,
            correlation: request.correlation.clone(),
            result: Some(result),
            error: None,
            expires_at: None,
            service_info: None,
        }
    }

    /// A failed response carrying the captured fault.
    pub fn fail(request: &ServiceRequest, fault: ServiceFault) -> Self {
        Self {
            id: request.id,
            correlation: request.correlation.clone(),
            result: None,
            error: Some(fault),
            expires_at: None,
            service_info: None,
        }
    }

    /// Did the invocation complete with a valid return value?
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl std::fmt::Display for ServiceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServiceResponse[{}]", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;

    #[test]
    fn test_request_ids_are_unique() {
        let a = ServiceRequest::new("svc", "m");
        let b = ServiceRequest::new("svc", "m");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_expiry() {
        let fresh = ServiceRequest::new("svc", "m");
        assert!(!fresh.is_expired());

        let expired = ServiceRequest::new("svc", "m").ttl(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(expired.is_expired());

        let alive = ServiceRequest::new("svc", "m").ttl(Duration::from_secs(300));
        assert!(!alive.is_expired());
    }

    #[test]
    fn test_response_mirrors_request() {
        let request = ServiceRequest::new("svc", "m").correlate("reply-queue-7");
        let ok = ServiceResponse::ok(&request, vec![1, 2, 3]);
        assert_eq!(ok.id, request.id);
        assert_eq!(ok.correlation.as_deref(), Some("reply-queue-7"));
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let fail = ServiceResponse::fail(
            &request,
            ServiceFault::new(FaultKind::Invocation, "boom"),
        );
        assert_eq!(fail.id, request.id);
        assert!(!fail.is_success());
        assert!(fail.result.is_none());
    }

    #[test]
    fn test_display() {
        let request = ServiceRequest::new("svc", "m");
        assert_eq!(
            request.to_string(),
            format!("ServiceRequest[{}]", request.id)
        );
    }
}
