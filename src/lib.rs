//! # Directory Repo Library
//!
//! Tenant-aware relational data-access layer of the directory service. It
//! provides a small SQL query builder and a family of CRUD primitives that
//! domain repositories compose instead of writing SQL by hand, and it is the
//! single place where tenant isolation is enforced.

pub mod config;
pub mod error;
pub mod pagination;
pub mod persistence;
pub mod repo;
pub mod resource;
pub mod telemetry;

pub use error::{Error, ErrorKind, Result};
pub use pagination::{Collection, Page};
pub use persistence::{Context, Executor};
pub use resource::ResourceType;
