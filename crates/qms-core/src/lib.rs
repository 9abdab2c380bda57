//! # qms-core
//!
//! Core types, lifecycle rules, and error types for the QMS backend.
//!
//! This crate provides the foundational types shared across all QMS crates:
//! - Entity structs for audits, checklists, evaluations, non-conformities,
//!   corrective actions, RCA steps, users, and documents
//! - Status enums with transition rules
//! - Pure lifecycle rules for the non-conformity engine
//! - ID prefix constants
//! - Cross-cutting error types
//! - API view and metrics response types

pub mod activity_detail;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod lifecycle;
pub mod responses;
