//! Router Module Index
//!
//! Routes are grouped by how they are reached rather than by who may call them: write
//! endpoints share their path with the public read endpoint of the same resource, and the
//! admin check happens inside those handlers through `AuthUser::require_admin`.

/// Health check, contact form and the media gatekeeper.
pub mod public;

/// The `/api/` content endpoints (public reads, admin-only writes).
pub mod api;
