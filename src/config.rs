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

//! Connection, timing, and security settings for a service bus transport.
//!
//! The same [`BusConfig`] type feeds every transport; it is all in how each
//! one translates the values. To the in-process transport the URI means
//! nothing; to the HTTP transport it supplies host, port, and whether to
//! speak TLS; to the broker transport it locates the broker. Ideally the
//! producer and consumer sides of one service are handed configs with the
//! same values and link up on their own.

use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;

/// Default window a request has before both sides give up on it.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(5 * 60);

/// Default window an unclaimed broker reply survives before the broker
/// discards it.
pub const DEFAULT_REPLY_TTL: Duration = Duration::from_secs(60);

/// Configuration for one dispatcher or receiver.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Where the transport connects or listens. The scheme selects behavior:
    /// `http://` vs `https://` for the HTTP transport, `amqp://` for the
    /// broker transport.
    pub uri: String,
    /// How long a request may wait for a response before the caller receives
    /// a timeout.
    pub request_ttl: Duration,
    /// How long a queued reply survives unclaimed (broker transport only).
    pub reply_ttl: Duration,
    /// Username for transports whose channel requires authentication.
    pub username: Option<String>,
    /// Password half of the credentials.
    pub password: Option<String>,
    /// PEM bundle (certificate chain plus private key) used by the HTTPS
    /// receiver to terminate TLS.
    pub keystore_path: Option<PathBuf>,
    /// Password protecting the keystore, where the format uses one.
    pub keystore_password: Option<String>,
    /// Whether the HTTPS dispatcher accepts certificates no authority
    /// vouches for. Off by default; opt in only on locked-down private
    /// networks.
    pub accept_self_signed: bool,
    /// Runtime handle that supplies threads for daemons and per-request
    /// work. Defaults to the runtime the transport is driven from.
    pub executor: Option<Handle>,
}

impl BusConfig {
    /// Creates a config pointing at the given URI, with a 5 minute request
    /// TTL and no credentials.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            request_ttl: DEFAULT_REQUEST_TTL,
            reply_ttl: DEFAULT_REPLY_TTL,
            username: None,
            password: None,
            keystore_path: None,
            keystore_password: None,
            accept_self_signed: false,
            executor: None,
        }
    }

    /// Defines how long a request has to be completely serviced before both
    /// sides give up on it.
    pub fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.request_ttl = ttl;
        self
    }

    /// Defines how long a queued reply survives unclaimed.
    pub fn with_reply_ttl(mut self, ttl: Duration) -> Self {
        self.reply_ttl = ttl;
        self
    }

    /// Supplies credentials for transports whose channel requires
    /// authentication (e.g. a message broker).
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Specifies the keystore used to terminate TLS on the receiving side.
    pub fn with_keystore(
        mut self,
        path: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Self {
        self.keystore_path = Some(path.into());
        self.keystore_password = Some(password.into());
        self
    }

    /// Allows the dispatcher to accept self-signed certificates from the
    /// remote endpoint.
    pub fn accepting_self_signed(mut self) -> Self {
        self.accept_self_signed = true;
        self
    }

    /// Supplies the runtime handle used to spawn daemons and per-request
    /// work.
    pub fn with_executor(mut self, handle: Handle) -> Self {
        self.executor = Some(handle);
        self
    }

    /// Are any auth credentials set on this configuration?
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.trim().is_empty())
            || self.password.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// The handle work is spawned on: the configured executor, or the
    /// current runtime.
    pub fn spawner(&self) -> Handle {
        self.executor.clone().unwrap_or_else(Handle::current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BusConfig::new("amqp://localhost:5672");
        assert_eq!(config.request_ttl, DEFAULT_REQUEST_TTL);
        assert_eq!(config.reply_ttl, DEFAULT_REPLY_TTL);
        assert!(!config.accept_self_signed);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_chaining() {
        let config = BusConfig::new("https://svc.example:8443")
            .with_request_ttl(Duration::from_millis(500))
            .with_credentials("guest", "guest")
            .with_keystore("/etc/boson/keys.pem", "sekrit")
            .accepting_self_signed();
        assert_eq!(config.request_ttl, Duration::from_millis(500));
        assert!(config.has_credentials());
        assert!(config.accept_self_signed);
        assert_eq!(
            config.keystore_path.as_deref(),
            Some(std::path::Path::new("/etc/boson/keys.pem"))
        );
    }

    #[test]
    fn test_blank_credentials_do_not_count() {
        let config = BusConfig::new("amqp://localhost").with_credentials("  ", "");
        assert!(!config.has_credentials());
    }
}
