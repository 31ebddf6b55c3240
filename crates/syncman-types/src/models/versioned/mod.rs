//! Revision-ordered replication of watched items.
//!
//! Stores with monotonic revisions (etcd create/mod revisions, Kubernetes
//! resourceVersion) can deliver watch events late, twice, or out of order.
//! Every replicated item is wrapped in a [`Versioned`] envelope and merged into a
//! [`VersionedSet`], which discards anything that does not move the item forward.
//!
//! # Merge rule
//!
//! A PUT for a tracked item is applied only when its create version is not older
//! than the tracked one, and either its create or its modification version is
//! strictly newer. A DELETE is applied only when its modification version is
//! strictly newer than the tracked one.

mod envelope;


pub use envelope::{Version, Versioned, VersionedSet};
