//! Serde roundtrip and JsonSchema validation tests for entity and view types.

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use schemars::schema_for;
use qms_core::activity_detail::{ClosedDetail, StatusChangedDetail};
use qms_core::entities::*;
use qms_core::enums::*;
use qms_core::responses::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

fn sample_nc() -> NonConformity {
    NonConformity {
        id: "ncr-b7a3f9e2".into(),
        audit_id: "adt-c4e2d1f0".into(),
        instance_id: Some("ins-00aa11bb".into()),
        clause_id: Some("cls-7f3e2a10".into()),
        title: "Supplier evaluation overdue".into(),
        description: "Three approved suppliers lack a current evaluation".into(),
        severity: Severity::High,
        status: NcStatus::InProgress,
        created_by: Some("usr-11111111".into()),
        assigned_to: "usr-22222222".into(),
        evidence: vec!["EV-001".into(), "EV-002".into()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn sample_action() -> CorrectiveAction {
    CorrectiveAction {
        id: "cap-0a0b0c0d".into(),
        nc_id: "ncr-b7a3f9e2".into(),
        description: "Run supplier evaluations".into(),
        responsible_id: "usr-22222222".into(),
        due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        status: ActionStatus::Completed,
        review: Some(ActionReview {
            reviewer_id: "usr-33333333".into(),
            approved: true,
            comments: Some("Evidence checked".into()),
            reviewed_at: Utc::now(),
        }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

roundtrip_and_validate!(nc_roundtrip, NonConformity, sample_nc());

roundtrip_and_validate!(action_roundtrip, CorrectiveAction, sample_action());

roundtrip_and_validate!(
    rca_step_roundtrip,
    RcaStep,
    RcaStep {
        id: "rca-01020304".into(),
        nc_id: "ncr-b7a3f9e2".into(),
        step_number: 1,
        why_text: "The evaluation reminder was never scheduled".into(),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    audit_roundtrip,
    Audit,
    Audit {
        id: "adt-c4e2d1f0".into(),
        title: "Q1 internal audit".into(),
        scope: "Purchasing and supplier control".into(),
        department: Some("Procurement".into()),
        start_date: NaiveDate::from_ymd_opt(2026, 1, 10),
        end_date: None,
        status: AuditStatus::InProgress,
        created_by: None,
        auditor_ids: vec!["usr-11111111".into()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    instance_roundtrip,
    Instance,
    Instance {
        id: "ins-00aa11bb".into(),
        audit_id: "adt-c4e2d1f0".into(),
        checklist_item_id: "itm-99887766".into(),
        clause_id: "cls-7f3e2a10".into(),
        conformity_status: None,
        severity: None,
        comments: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    user_roundtrip,
    User,
    User {
        id: "usr-11111111".into(),
        name: "Dana Auditor".into(),
        email: "dana@example.com".into(),
        department: None,
        roles: vec![Role::Auditor, Role::Reviewer],
        active: true,
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    clause_mapping_roundtrip,
    ClauseMapping,
    ClauseMapping {
        id: "map-12121212".into(),
        source_clause_id: "cls-7f3e2a10".into(),
        target_clause_id: "cls-7f3e2a11".into(),
        relation: MappingRelation::Partial,
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    nc_view_roundtrip,
    NcView,
    NcView {
        nc: sample_nc(),
        actions: vec![sample_action()],
        rca_steps: Vec::new(),
        documents: vec![Document {
            id: "doc-0f0f0f0f".into(),
            title: "Supplier list".into(),
            reference: "s3://qms/docs/suppliers.pdf".into(),
            uploaded_by: None,
            created_at: Utc::now(),
        }],
    }
);

roundtrip_and_validate!(
    status_changed_detail_roundtrip,
    StatusChangedDetail,
    StatusChangedDetail {
        from: "PENDING".into(),
        to: "IN_PROGRESS".into(),
        reason: Some("first corrective action".into()),
    }
);

roundtrip_and_validate!(
    closed_detail_roundtrip,
    ClosedDetail,
    ClosedDetail {
        evidence_added: vec!["EV-9".into()],
        reviewer_comment: None,
    }
);

#[test]
fn nc_view_flattens_nc_fields() {
    let view = NcView {
        nc: sample_nc(),
        actions: Vec::new(),
        rca_steps: Vec::new(),
        documents: Vec::new(),
    };
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "IN_PROGRESS");
    assert_eq!(json["severity"], "HIGH");
    assert!(json["actions"].as_array().unwrap().is_empty());
}

#[test]
fn audit_progress_uses_camel_case() {
    let progress = AuditProgress {
        total_clauses: 4,
        evaluated_clauses: 1,
        completion_percentage: 25.0,
    };
    let json = serde_json::to_value(progress).unwrap();
    assert_eq!(json["totalClauses"], 4);
    assert_eq!(json["completionPercentage"], 25.0);
}
