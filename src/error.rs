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

//! Error types for the service bus.
//!
//! Two shapes exist because errors live in two places:
//!
//! - [`BusError`] is the rich, transport-agnostic error callers see on a
//!   failed completion. It is never serialized.
//! - [`ServiceFault`] is the serializable form that travels inside a
//!   [`ServiceResponse`](crate::envelope::ServiceResponse) when the remote
//!   side captured a failure. It carries a [`FaultKind`] and a message and
//!   converts losslessly into a [`BusError`] on arrival.
//!
//! Implementation failures are captured into the response (they are never
//! fatal to the worker); everything else surfaces as an exceptionally
//! completed call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Boxed application error returned by service implementations.
///
/// Handler closures registered through
/// [`ServiceAdapter`](crate::receiver::ServiceAdapter) fail with this type;
/// the receiver core folds it into an [`Invocation`](FaultKind::Invocation)
/// fault on the wire.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The transport-agnostic error kinds of the framework.
///
/// This is the classification shared by [`BusError`] and [`ServiceFault`];
/// it is stable on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// Operation invoked on a dispatcher or receiver that is not connected.
    NotConnected,
    /// The registry was asked to register a duplicate contract.
    AlreadyRegistered,
    /// Argument shape mismatch between caller and implementation.
    Contract,
    /// The receiver cannot resolve `(method, argument types)` on the held
    /// implementation.
    Resolution,
    /// The codec failed to encode or decode bytes.
    Serialization,
    /// Wire-level failure: HTTP status outside 2xx, broker channel closed
    /// unexpectedly, connection refused.
    Transport,
    /// The request deadline elapsed before a reply arrived, or a socket read
    /// timed out.
    Timeout,
    /// The service implementation itself failed; forwarded in the response.
    Invocation,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotConnected => "not-connected",
            Self::AlreadyRegistered => "already-registered",
            Self::Contract => "contract",
            Self::Resolution => "resolution",
            Self::Serialization => "serialization",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Invocation => "invocation",
        };
        f.write_str(name)
    }
}

/// The serializable failure carried inside a `ServiceResponse`.
///
/// Exactly one of `result` / `error` is present on a response; when it is the
/// error, this is its shape. The worker host never dies because of an
/// invocation failure; it is packaged here and shipped back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceFault {
    /// Classification of the failure.
    pub kind: FaultKind,
    /// Human-readable description.
    pub message: String,
}

impl ServiceFault {
    /// Creates a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an [`Invocation`](FaultKind::Invocation) fault wrapping
    /// an application error.
    pub fn invocation(error: &HandlerError) -> Self {
        Self::new(FaultKind::Invocation, error.to_string())
    }
}

/// Error type observed by callers of the service bus.
///
/// Every caller-visible failure is one of these kinds; transports map their
/// native failures (HTTP statuses, broker shutdowns, socket timeouts) onto
/// them so application code never has to match on transport specifics.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Operation invoked on a dispatcher or receiver that is not in a
    /// connected state.
    #[error("service transport is not connected: {0}")]
    NotConnected(String),

    /// The registry already holds a receiver or proxy for this contract.
    #[error("service [{0}] is already registered")]
    AlreadyRegistered(String),

    /// Argument shape mismatch: wrong argument count, an argument that does
    /// not decode to the declared parameter type, or a result that does not
    /// decode to the caller's expected type.
    #[error("contract violation: {0}")]
    Contract(String),

    /// No target operation matches `(method, argument types)`, or more than
    /// one does.
    #[error("cannot resolve target operation: {0}")]
    Resolution(String),

    /// The codec failed to encode or decode bytes.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Wire-level failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request missed its window for receiving a response.
    #[error("call to [{service}] timed out for request ServiceRequest[{request_id}]")]
    Timeout {
        /// Contract of the service that was called.
        service: String,
        /// Id of the request that was abandoned.
        request_id: Uuid,
    },

    /// The implementation failed; the failure was forwarded in the response.
    #[error("service implementation failed: {0}")]
    Invocation(String),
}

impl BusError {
    /// The wire classification of this error.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::NotConnected(_) => FaultKind::NotConnected,
            Self::AlreadyRegistered(_) => FaultKind::AlreadyRegistered,
            Self::Contract(_) => FaultKind::Contract,
            Self::Resolution(_) => FaultKind::Resolution,
            Self::Serialization(_) => FaultKind::Serialization,
            Self::Transport(_) => FaultKind::Transport,
            Self::Timeout { .. } => FaultKind::Timeout,
            Self::Invocation(_) => FaultKind::Invocation,
        }
    }

    /// Converts into the serializable form carried in a response.
    pub fn to_fault(&self) -> ServiceFault {
        ServiceFault::new(self.kind(), self.to_string())
    }
}

impl From<ServiceFault> for BusError {
    fn from(fault: ServiceFault) -> Self {
        match fault.kind {
            FaultKind::NotConnected => Self::NotConnected(fault.message),
            FaultKind::AlreadyRegistered => Self::AlreadyRegistered(fault.message),
            FaultKind::Contract => Self::Contract(fault.message),
            FaultKind::Resolution => Self::Resolution(fault.message),
            FaultKind::Serialization => Self::Serialization(fault.message),
            FaultKind::Transport => Self::Transport(fault.message),
            // A remote timeout fault loses its structured fields on the
            // wire; keep the kind, carry the full message in `service`.
            FaultKind::Timeout => Self::Timeout {
                service: fault.message,
                request_id: Uuid::nil(),
            },
            FaultKind::Invocation => Self::Invocation(fault.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        let kinds = [
            FaultKind::NotConnected,
            FaultKind::AlreadyRegistered,
            FaultKind::Contract,
            FaultKind::Resolution,
            FaultKind::Serialization,
            FaultKind::Transport,
            FaultKind::Timeout,
            FaultKind::Invocation,
        ];
        for kind in kinds {
            let fault = ServiceFault::new(kind, "boom");
            let error = BusError::from(fault);
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn test_timeout_message() {
        let error = BusError::Timeout {
            service: "examples.HelloService".into(),
            request_id: Uuid::nil(),
        };
        let text = error.to_string();
        assert!(text.contains("examples.HelloService"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn test_fault_serializes() {
        let fault = ServiceFault::new(FaultKind::Resolution, "no such method");
        let json = serde_json::to_string(&fault).unwrap();
        let back: ServiceFault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }
}
