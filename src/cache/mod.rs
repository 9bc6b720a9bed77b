//! Cache layer
//!
//! This module provides the in-process cache primitive used by the relevance
//! engine. The cache holds only derived, rebuildable data; it is never the
//! source of truth and is not persisted across restarts.
//!
//! # Usage
//!
//! ```rust,ignore
//! use manuscript::cache::ActorMap;
//!
//! let map: ActorMap<String, i64> = ActorMap::new();
//! map.set("go".to_string(), 2).await?;
//! assert_eq!(map.get(&"go".to_string()).await?, Some(2));
//! ```

pub mod actor_map;

pub use actor_map::{ActorMap, ActorMapError, ActorMapResult};
