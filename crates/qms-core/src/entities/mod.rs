//! Entity structs for all QMS domain objects.
//!
//! Each entity maps to a table in the libSQL schema. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and
//! schema validation.

mod action;
mod activity;
mod audit;
mod catalog;
mod checklist;
mod document;
mod instance;
mod nc;
mod rca;
mod user;

pub use action::{ActionReview, CorrectiveAction};
pub use activity::ActivityEntry;
pub use audit::Audit;
pub use catalog::{Clause, ClauseMapping, Standard};
pub use checklist::{Checklist, ChecklistItem};
pub use document::Document;
pub use instance::Instance;
pub use nc::NonConformity;
pub use rca::{RcaStep, RcaStepInput};
pub use user::User;
