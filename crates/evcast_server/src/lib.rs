//! # evcast Server
//!
//! Producer-node surface for evcast: consumer registration,
//! subscription-status reconciliation, and dispatch wiring.
//!
//! This crate provides:
//! - The registration endpoint logic (credentials + sync cursor)
//! - The reconciliation protocol against remote mirror records
//! - Credential generation and HMAC-SHA256 request signing
//! - An HTTP backend abstraction for the remote site client
//! - The [`ProducerNode`] facade tying registry, event log,
//!   dispatcher, and reconciler together
//!
//! # Reconciliation
//!
//! Subscription status lives in two places: the producer's local
//! consumer record and a mirror record on the consumer's node. A
//! genuine local change (an administrative approval, say) pushes the
//! projected statuses to the mirror exactly once; the push sets the
//! mirror's one-shot `incoming_change` marker so the remote update
//! handler does not echo the write back. Locally the same loop is
//! broken by an explicit write origin instead of a persisted flag.
//!
//! # Registration
//!
//! ```
//! use evcast_dispatch::{MemoryRetryQueue, MockProber, MockSiteClient};
//! use evcast_protocol::RegisterRequest;
//! use evcast_server::{NodeConfig, ProducerNode};
//! use std::sync::Arc;
//!
//! let node = ProducerNode::new(
//!     NodeConfig::new("https://producer.example.com"),
//!     Arc::new(MockProber::new()),
//!     Arc::new(MockSiteClient::new()),
//!     Arc::new(MemoryRetryQueue::new()),
//! );
//!
//! let request = RegisterRequest::new(
//!     "https://consumer.example.com",
//!     "ops@example.com",
//!     vec!["order".into()],
//! );
//! let response = node.register(&request).unwrap();
//! assert!(response.last_update > 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod http;
mod node;
mod reconcile;
mod registration;

pub use auth::{CredentialPair, RequestSigner};
pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use http::{HttpBackend, HttpProber, HttpResponse, HttpSiteClient};
pub use node::ProducerNode;
pub use reconcile::{DoctypeMapping, ReconcileReport, Reconciler};
pub use registration::RegistrationService;
