//! ID prefix constants.
//!
//! IDs are generated by the database layer as `{prefix}-{8 hex chars}`,
//! e.g. `ncr-a3f8b2c1`.

pub const PREFIX_USER: &str = "usr";
pub const PREFIX_STANDARD: &str = "std";
pub const PREFIX_CLAUSE: &str = "cls";
pub const PREFIX_MAPPING: &str = "map";
pub const PREFIX_AUDIT: &str = "adt";
pub const PREFIX_CHECKLIST: &str = "chk";
pub const PREFIX_ITEM: &str = "itm";
pub const PREFIX_INSTANCE: &str = "ins";
pub const PREFIX_NC: &str = "ncr";
pub const PREFIX_ACTION: &str = "cap";
pub const PREFIX_RCA: &str = "rca";
pub const PREFIX_DOCUMENT: &str = "doc";
pub const PREFIX_ACTIVITY: &str = "act";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_USER,
    PREFIX_STANDARD,
    PREFIX_CLAUSE,
    PREFIX_MAPPING,
    PREFIX_AUDIT,
    PREFIX_CHECKLIST,
    PREFIX_ITEM,
    PREFIX_INSTANCE,
    PREFIX_NC,
    PREFIX_ACTION,
    PREFIX_RCA,
    PREFIX_DOCUMENT,
    PREFIX_ACTIVITY,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefixes_are_unique_and_three_chars() {
        let unique: HashSet<_> = ALL_PREFIXES.iter().collect();
        assert_eq!(unique.len(), ALL_PREFIXES.len());
        assert!(ALL_PREFIXES.iter().all(|p| p.len() == 3));
    }
}
