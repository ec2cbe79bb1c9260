//! Relational side of the Hypha governance views
//!
//! This crate provides:
//! - Sea-ORM entities for spaces, people and documents
//! - A database handle with explicit scoped (row-level security) and admin paths
//! - Bearer JWT verification
//! - Offset and page list envelopes
//! - Address-keyed queries that compare addresses case-insensitively

pub mod auth;
pub mod database;
pub mod entity;
pub mod error;
pub mod pagination;
pub mod repository;

pub use auth::{bearer_token, verify_jwt, AuthConfig, AuthInfo, Claims};
pub use database::{Database, ScopedConnection};
pub use error::{Result, StoreError};
pub use pagination::{OffsetPage, OffsetRequest, PageInfo, PageRequest, Paginated};
pub use repository::HybridRepository;
