// ==========================================
// 同步批量导入集成测试
// ==========================================
// 覆盖: 映射 → 转换 → 引用解析 → 校验 → 查重 → 持久化 全流程
// ==========================================


use std::io::Write;
use tabular_import::api::DEFAULT_PREVIEW_ROWS;
use tabular_import::domain::{PermissionLevel, Role};
use tabular_import::repository::{EntityRepository, EntityRepositoryImpl};
use tabular_import::{ApiError, EntityKind, FieldMapping, NormalizedRecord};
use test_helpers::{create_test_api, row};

#[tokio::test]
async fn test_user_import_success() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let rows = vec![row(&[
        ("externalId", "U1"),
        ("firstName", "Ada"),
        ("lastName", "Lovelace"),
        ("emails", "ada@x.com"),
    ])];

    let result = api
        .run_batch_import("user", rows, &FieldMapping::new())
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.saved_identifiers, vec!["U1".to_string()]);
}

#[tokio::test]
async fn test_user_missing_identifier_and_name() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let original = row(&[("externalId", ""), ("firstName", ""), ("emails", "")]);

    let result = api
        .run_batch_import("user", vec![original.clone()], &FieldMapping::new())
        .await
        .unwrap();

    assert_eq!(result.success_count, 0);
    assert_eq!(result.error_count, 1);
    let failure = &result.failures[0];
    assert_eq!(failure.row_number, 1);
    assert_eq!(failure.original_row, original);
    assert!(failure.errors.contains(&"identifier required".to_string()));
    assert!(failure.errors.contains(&"first name required".to_string()));
}

#[tokio::test]
async fn test_scientific_notation_phone_is_normalized() {
    let (_tmp, db_path, api) = create_test_api().await;
    let rows = vec![row(&[
        ("externalId", "U3"),
        ("firstName", "Cem"),
        ("phone", "5.952159955E9"),
    ])];

    let result = api
        .run_batch_import("user", rows, &FieldMapping::new())
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);

    let repo = EntityRepositoryImpl::new(&db_path).unwrap();
    match repo.find_by_natural_key(EntityKind::User, "U3").await.unwrap() {
        Some(NormalizedRecord::User(user)) => {
            assert_eq!(user.phone.as_deref(), Some("+905952159955"));
            assert_eq!(user.role, Some(Role::Customer));
        }
        other => panic!("unexpected record: {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_organization_in_same_file() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let rows = vec![
        row(&[("externalId", "ORG1"), ("name", "Acme")]),
        row(&[("externalId", "ORG1"), ("name", "Acme again")]),
    ];

    let result = api
        .run_batch_import("organization", rows, &FieldMapping::new())
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.failures[0].row_number, 2);
    assert!(result.failures[0]
        .errors
        .iter()
        .any(|e| e.starts_with("duplicate externalId in file")));
}

#[tokio::test]
async fn test_custom_field_permission_aliases_and_default() {
    let (_tmp, db_path, api) = create_test_api().await;
    let rows = vec![
        row(&[
            ("key", "order_no"),
            ("type", "text"),
            ("name", "Order number"),
            ("permission", "Read-Write"),
        ]),
        row(&[
            ("key", "region"),
            ("type", "dropdown"),
            ("name", "Region"),
            ("permission", "whatever"),
            ("options", "North$South"),
        ]),
    ];

    let result = api
        .run_batch_import("custom-field", rows, &FieldMapping::new())
        .await
        .unwrap();
    assert_eq!(result.import_type, "customfield");
    assert_eq!(result.success_count, 2);

    let repo = EntityRepositoryImpl::new(&db_path).unwrap();
    for key in ["order_no", "region"] {
        match repo
            .find_by_natural_key(EntityKind::CustomField, key)
            .await
            .unwrap()
        {
            Some(NormalizedRecord::CustomField(cf)) => {
                assert_eq!(cf.permission, Some(PermissionLevel::EditableByEndUsers));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_count_invariant_on_mixed_batch() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let rows = vec![
        row(&[("externalId", "U1"), ("firstName", "Ada"), ("emails", "ada@x.com")]),
        row(&[("externalId", "U2"), ("firstName", "Bob"), ("emails", "not-an-email")]),
        row(&[("externalId", "U1"), ("firstName", "Ada 2")]),
        row(&[("phone", "00905551112233"), ("firstName", "Deniz")]),
    ];

    let result = api
        .run_batch_import("contact", rows, &FieldMapping::new())
        .await
        .unwrap();

    assert_eq!(result.import_type, "user");
    assert_eq!(result.total_records, 4);
    assert_eq!(
        result.success_count + result.error_count,
        result.total_records
    );
    assert_eq!(result.success_count, result.saved_identifiers.len());
    assert_eq!(result.error_count, result.failures.len());
    assert_eq!(
        result.saved_identifiers,
        vec!["U1".to_string(), "+905551112233".to_string()]
    );
}

#[tokio::test]
async fn test_explicit_mapping_overrides_column_names() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let mapping = FieldMapping::from_pairs(vec![
        ("Kimlik", "externalId"),
        ("Ad", "firstName"),
        ("E-posta", "emails"),
    ]);
    let rows = vec![row(&[
        ("Kimlik", "U10"),
        ("Ad", "Elif"),
        ("E-posta", "elif@x.com"),
    ])];

    let result = api.run_batch_import("user", rows, &mapping).await.unwrap();

    assert_eq!(result.saved_identifiers, vec!["U10".to_string()]);
}

#[tokio::test]
async fn test_ticket_references_create_org_and_skip_unknown_user() {
    let (_tmp, db_path, api) = create_test_api().await;
    let rows = vec![row(&[
        ("externalId", "T1"),
        ("subject", "Printer is broken"),
        ("status", "open"),
        ("priority", "urgent"),
        ("organization", "ORG7"),
        ("assignee", "ghost"),
        ("createdAt", "2024-03-01 09:30:00"),
    ])];

    let result = api
        .run_batch_import("ticket", rows, &FieldMapping::new())
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);

    let repo = EntityRepositoryImpl::new(&db_path).unwrap();
    assert!(repo
        .find_by_natural_key(EntityKind::Organization, "ORG7")
        .await
        .unwrap()
        .is_some());
    match repo.find_by_natural_key(EntityKind::Ticket, "T1").await.unwrap() {
        Some(NormalizedRecord::Ticket(ticket)) => {
            assert_eq!(ticket.organization.as_deref(), Some("ORG7"));
            assert_eq!(ticket.assignee, None);
            assert!(ticket.created_at.is_some());
        }
        other => panic!("unexpected record: {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_import_type() {
    let (_tmp, _db_path, api) = create_test_api().await;

    let result = api
        .run_batch_import("invoice", vec![row(&[("a", "b")])], &FieldMapping::new())
        .await;

    assert!(matches!(result, Err(ApiError::UnsupportedImportType(ref t)) if t == "invoice"));
}

#[tokio::test]
async fn test_import_csv_file() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let mut csv_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(csv_file, "externalId,name,domains").unwrap();
    writeln!(csv_file, "ORG1,Acme,\"acme.com, acme.org\"").unwrap();
    writeln!(csv_file, ",,").unwrap();
    writeln!(csv_file, ",Nameless,").unwrap();

    let result = api
        .import_file("organization", csv_file.path(), &FieldMapping::new())
        .await
        .unwrap();

    assert_eq!(result.total_records, 2);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failures[0].row_number, 2);
    assert_eq!(result.failures[0].errors, vec!["externalId required".to_string()]);
}

#[tokio::test]
async fn test_preview_file_returns_headers_and_first_rows() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let mut csv_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(csv_file, "Kimlik,Ad").unwrap();
    writeln!(csv_file, ",").unwrap();
    for i in 1..=7 {
        writeln!(csv_file, "U{},Kişi {}", i, i).unwrap();
    }

    let preview = api
        .preview_file(csv_file.path(), DEFAULT_PREVIEW_ROWS)
        .unwrap();

    assert_eq!(preview.headers, vec!["Kimlik".to_string(), "Ad".to_string()]);
    assert_eq!(preview.rows.len(), 5);
    assert_eq!(preview.rows[0], vec!["U1".to_string(), "Kişi 1".to_string()]);
    assert_eq!(preview.rows[4][0], "U5");

    let short = api.preview_file(csv_file.path(), 2).unwrap();
    assert_eq!(short.rows.len(), 2);
}

#[tokio::test]
async fn test_preview_rejects_unknown_extension() {
    let (_tmp, _db_path, api) = create_test_api().await;
    let txt_file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();

    let result = api.preview_file(txt_file.path(), DEFAULT_PREVIEW_ROWS);

    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_discovered_fields_drive_an_import() {
    let (_tmp, _db_path, api) = create_test_api().await;
    assert!(api.supported_types().contains(&"organization".to_string()));

    // 只填必填字段即可导入
    let fields = api.import_fields("organization").unwrap();
    let pairs: Vec<(&str, &str)> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| (f.name.as_str(), "ORG9"))
        .collect();
    assert_eq!(pairs, vec![("externalId", "ORG9")]);

    let result = api
        .run_batch_import("organization", vec![row(&pairs)], &FieldMapping::new())
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);
}
