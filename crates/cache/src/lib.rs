//! GPU resource cache for the prism lifecycle manager.
//!
//! Buffers, images, and pipelines live in an indexed table owned solely by
//! the cache; everything else holds opaque [`ResourceHandle`]s, never the
//! resources themselves. Identical descriptors memoize to the identical
//! handle, and destruction is deferred until no in-flight frame can still
//! reference the resource.
//!
//! The reference-count bookkeeping is a pure structure,
//! [`ledger::CacheLedger`], tested without any GPU; [`cache::ResourceCache`]
//! binds it to real resource construction through the rhi crate.

pub mod cache;
pub mod descriptor;
pub mod ledger;

mod error;

pub use cache::{GpuResource, ResourceCache, SharedResourceCache};
pub use descriptor::ResourceDescriptor;
pub use error::{CacheError, CacheResult};
pub use ledger::{CacheLedger, ResourceHandle};
