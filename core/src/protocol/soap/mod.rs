/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Casella, a file-based bridge to a remote message queue.
 *
 * Casella is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Casella is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Casella.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Blocking SOAP 1.1 queue client over `ureq`.

mod message;

pub use message::{
    build_get_request, build_put_request, fault_of, parse_get_response, parse_put_response, OP_GET, OP_PUT,
    SOAP_ENV_NS,
};

use std::time::Duration;

use tracing::{debug, trace};
use ureq::Agent;

use crate::config::{BridgeConfig, Credentials};
use crate::queue::{GetResponse, PutResponse, QueueClient, QueueNames, QueueType, TransportError};

const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Queue client bound to one endpoint and one set of credentials.
pub struct SoapQueueClient {
    agent: Agent,
    endpoint: String,
    namespace: String,
    credentials: Credentials,
    queue_names: QueueNames,
}

impl SoapQueueClient {
    pub fn new(endpoint: impl Into<String>, namespace: impl Into<String>, credentials: Credentials, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into(),
            namespace: namespace.into(),
            credentials,
            queue_names: QueueNames::default(),
        }
    }

    pub fn with_queue_names(mut self, queue_names: QueueNames) -> Self {
        self.queue_names = queue_names;
        self
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.namespace.clone(),
            config.credentials.clone(),
            config.timeout,
        )
        .with_queue_names(config.queue_names.clone())
    }

    /// Post one request and return the response body. A non-2xx response is a SOAP fault
    /// when its body parses to one, otherwise an HTTP error.
    fn call(&self, operation: &str, request: String) -> Result<String, TransportError> {
        let action = format!("{}{}", self.namespace, operation);
        trace!(operation, bytes = request.len(), "SOAP request");
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("SOAPAction", &action)
            .send(request)
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        debug!(operation, status, bytes = body.len(), "SOAP response");
        if !(200..300).contains(&status) {
            return Err(fault_of(&body)
                .unwrap_or_else(|| TransportError::Http(format!("{} returned HTTP {}", self.endpoint, status))));
        }
        Ok(body)
    }
}

impl std::fmt::Debug for SoapQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapQueueClient")
            .field("endpoint", &self.endpoint)
            .field("namespace", &self.namespace)
            .field("credentials", &self.credentials)
            .field("queue_names", &self.queue_names)
            .finish()
    }
}

impl QueueClient for SoapQueueClient {
    fn put(&self, queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError> {
        let queue_name = self.queue_names.wire_name(queue);
        let request = build_put_request(&self.namespace, &self.credentials, queue_name, envelope)?;
        let body = self.call(OP_PUT, request)?;
        parse_put_response(&body)
    }

    fn get(&self, queue: QueueType, ack_msg_id: i64) -> Result<GetResponse, TransportError> {
        let queue_name = self.queue_names.wire_name(queue);
        let request = build_get_request(&self.namespace, &self.credentials, queue_name, ack_msg_id)?;
        let body = self.call(OP_GET, request)?;
        parse_get_response(&body)
    }
}
