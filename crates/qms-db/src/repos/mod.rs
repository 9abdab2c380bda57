//! Repository implementations, one `impl QmsService` block per aggregate.

pub mod action;
pub mod activity;
pub mod audit;
pub mod catalog;
pub mod checklist;
pub mod dashboard;
pub mod document;
pub mod nc;
pub mod rca;
pub mod reminders;
pub mod user;
