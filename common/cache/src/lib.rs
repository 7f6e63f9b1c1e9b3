//! Caching layer for the storefront backend services.
//!
//! Order management, chat retrieval and user-profile assembly all read
//! through this crate to keep latency and database load down. It provides:
//!
//! - JSON value serialization with temporal fidelity ([`Timestamp`])
//! - Versioned, namespaced physical keys ([`Namespace`], [`physical_key`])
//! - [`CacheStore`]: single-key and batch get/set/delete, pattern-based bulk
//!   invalidation, counters and health checks, all degrading to safe defaults
//!   when the backend is unreachable
//! - [`RefreshCoordinator`]: stale-while-revalidate reads through a
//!   caller-supplied loader
//!
//! # Example
//!
//! ```rust,ignore
//! use common_cache::{CacheConfig, CacheStore, Namespace, RefreshCoordinator};
//! use envconfig::Envconfig;
//!
//! let config = CacheConfig::init_from_env()?;
//! let store = CacheStore::connect(config).await;
//! let coordinator = RefreshCoordinator::new(store.clone());
//!
//! let profile: UserProfile = coordinator
//!     .get_or_refresh(&user_id, Namespace::USER, move || async move {
//!         load_profile_from_database(&user_id).await
//!     })
//!     .await?;
//! ```
//!
//! The cache is an optimization, never a dependency: every failure mode reads
//! as a cold cache, not an error.

pub mod config;
pub mod keys;
pub mod refresh;
pub mod serializer;
pub mod store;

pub use config::CacheConfig;
pub use keys::{physical_key, physical_pattern, Namespace};
pub use refresh::RefreshCoordinator;
pub use serializer::{SerializerError, Timestamp, INSTANT_TAG};
pub use store::CacheStore;
