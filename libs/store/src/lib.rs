//! KV store and message bus abstractions the rest of the control plane is built
//! on (spec.md §6): both are treated as external dependencies accessed through a
//! narrow trait, with an in-memory implementation for tests and a Redis-backed
//! one for real deployments.

pub mod bus;
pub mod error;
pub mod kv;
pub mod memory;
pub mod redis_backend;
pub mod retry;

pub use bus::{Delivery, MessageBus, TypedBus};
pub use error::{Result, StoreError};
pub use kv::{KvStore, TypedKv};
pub use memory::{InMemoryKvStore, InMemoryMessageBus};
pub use redis_backend::{RedisKvStore, RedisMessageBus};
pub use retry::{backend_backoff, with_retry};
