//! Core implementation: pagination, container format, page cache

pub mod builder;
pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod page_cache;
pub mod page_folder;
pub mod paginator;
pub mod raster;
pub mod session;
pub mod sidecar;
