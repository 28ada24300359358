// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for the sandbox lifecycle domain.
//!
//! `SandboxId` and `AssociationId` are minted by this crate via
//! [`crate::define_id`] (random, prefixed). `ProjectId` and `TenantId` are
//! handed in by callers and only need [`crate::define_key`]'s parsing
//! machinery.

crate::define_id! {
    /// Identifies one sandbox container instance, e.g. `sbx-V1StGXR8_Z5jdHi6B`.
    pub struct SandboxId("sbx-");
}

crate::define_id! {
    /// Identifies one durable Association row, e.g. `asc-V1StGXR8_Z5jdHi6B`.
    pub struct AssociationId("asc-");
}

crate::define_key! {
    /// Caller-supplied project identifier; unique key for the single-sandbox
    /// invariant.
    pub struct ProjectId;
}

crate::define_key! {
    /// Caller-supplied tenant identifier; scopes an Association to one tenant.
    pub struct TenantId;
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
