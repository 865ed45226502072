//! Typed HTTP client for the Flotilla API server (spec.md §6), used by every
//! other process in the control plane in place of a direct KV/bus connection.
//! Grounded on the teacher's `kaniop_k8s_util::client` module and
//! `kaniop_oauth2::image`'s reqwest usage, with `kube::Api<K>` replaced by
//! plain typed routes since there is no real Kubernetes API server here.

pub mod client;
pub mod error;

pub use client::{FlotillaClient, SchedulerHandoff};
pub use error::{ClientError, Result};
