// Integration tests for @request.* paths
use rulesql::filter::{ComparisonOp, FilterExpr, Operand};
use rulesql::request_info::RequestInfo;
use rulesql::resolver::{RecordFieldResolver, ResolverError};
use rulesql::sql::ToSql;
use serde_json::{json, Value};

use super::common::{catalog, compile};

fn request() -> RequestInfo {
    RequestInfo::from_json_str(
        r#"{
            "context": "default",
            "method": "GET",
            "query": {"a": "", "b": "123"},
            "headers": {"x_token": "abc"},
            "body": {
                "title": "test",
                "number": "12",
                "datetime": "2024-01-02T03:04:05Z",
                "select_many": ["a", "b", "a"],
                "rel_one": "u1",
                "rel_many": ["u1", "u2"],
                "json": {"raw_json": "{\"a\": {\"b\": 1}}"},
                "obj": {"sub": [1, 2]}
            },
            "auth": {
                "collectionId": "_pb_users_auth_",
                "id": "u0",
                "data": {"email": "test@example.com", "name": "Auth"}
            }
        }"#,
    )
    .unwrap()
}

/// Resolve `path` on demo1 and return the identifier and the value of its
/// first parameter.
fn resolve_static(info: Option<&RequestInfo>, path: &str) -> (String, Option<Value>) {
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, info, false);

    let result = resolver.resolve(path).unwrap();
    assert!(resolver.joins().is_empty(), "{} should not join", path);

    let value = result
        .params
        .first()
        .and_then(|name| resolver.param(name))
        .cloned();
    (result.identifier, value)
}

#[test]
fn test_isset_distinguishes_missing_from_empty() {
    let info = request();

    assert_eq!(resolve_static(Some(&info), "@request.query.missing:isset").0, "FALSE");
    assert_eq!(resolve_static(Some(&info), "@request.query.a:isset").0, "TRUE");
    assert_eq!(resolve_static(Some(&info), "@request.body.number:isset").0, "TRUE");
    assert_eq!(resolve_static(Some(&info), "@request.body.nope:isset").0, "FALSE");
    assert_eq!(resolve_static(Some(&info), "@request.auth.name:isset").0, "TRUE");
}

#[test]
fn test_missing_key_is_bare_null() {
    let info = request();

    assert_eq!(
        resolve_static(Some(&info), "@request.query.missing"),
        ("NULL".to_string(), None)
    );
    assert_eq!(
        resolve_static(Some(&info), "@request.query.a"),
        ("{:p1}".to_string(), Some(json!("")))
    );
}

#[test]
fn test_static_request_values() {
    let info = request();
    let cases = [
        ("@request.context", json!("default")),
        ("@request.method", json!("GET")),
        ("@request.query.b", json!("123")),
        ("@request.headers.x_token", json!("abc")),
        ("@request.body.title", json!("test")),
        ("@request.body.number", json!(12)),
        ("@request.body.datetime", json!("2024-01-02 03:04:05.000Z")),
        ("@request.body.obj.sub", json!("[1,2]")),
        ("@request.body.obj.sub.1", json!(2)),
        ("@request.body.json", json!(r#"{"a": {"b": 1}}"#)),
        ("@request.body.json.a.b", json!(1)),
        ("@request.auth.id", json!("u0")),
        ("@request.auth.collectionId", json!("_pb_users_auth_")),
        ("@request.auth.collectionName", json!("users")),
        ("@request.auth.email", json!("test@example.com")),
    ];

    for (path, expected) in cases {
        let (identifier, value) = resolve_static(Some(&info), path);
        assert_eq!(identifier, "{:p1}", "{}", path);
        assert_eq!(value, Some(expected), "{}", path);
    }

    assert_eq!(
        resolve_static(Some(&info), "@request.body.json.x.y").0,
        "NULL"
    );
    assert_eq!(
        resolve_static(Some(&info), "@request.auth.email:lower"),
        ("LOWER({:p1})".to_string(), Some(json!("test@example.com")))
    );
}

#[test]
fn test_without_request_info() {
    assert_eq!(resolve_static(None, "@request.query.a").0, "NULL");
    assert_eq!(resolve_static(None, "@request.auth.id:isset").0, "FALSE");
    assert_eq!(resolve_static(None, "@request.body.rel_one.name").0, "NULL");

    let mut guest = request();
    guest.auth = None;
    assert_eq!(resolve_static(Some(&guest), "@request.auth.id").0, "NULL");
    assert_eq!(resolve_static(Some(&guest), "@request.auth.rel.title").0, "NULL");
}

#[test]
fn test_body_modifiers() {
    let info = request();
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, Some(&info), false);

    assert_eq!(
        resolver.resolve("@request.body.select_many:length").unwrap().identifier,
        "2"
    );
    assert_eq!(
        resolver.resolve("@request.body.file_many:length").unwrap().identifier,
        "0"
    );
    assert!(matches!(
        resolver.resolve("@request.body.text:length"),
        Err(ResolverError::InvalidModifier { .. })
    ));

    let each = resolver.resolve("@request.body.select_many:each").unwrap();
    assert_eq!(each.identifier, r#""__dataEach_select_many_je"."value""#);
    assert!(each.multi_match.is_some());
    assert_eq!(
        resolver.param("__dataEach_select_many_je__items"),
        Some(&json!(r#"["a","b"]"#))
    );
    assert_eq!(
        resolver.joins()[0].to_sql(),
        r#"LEFT JOIN pb_json_each({:__dataEach_select_many_je__items}) "__dataEach_select_many_je" ON TRUE"#
    );
}

#[test]
fn test_body_relation_joins_submitted_ids() {
    let info = request();
    let catalog = catalog();

    let query = compile(
        &catalog,
        "demo1",
        Some(&info),
        false,
        &FilterExpr::comparison(
            Operand::field("@request.body.rel_one.username"),
            ComparisonOp::AnyEq,
            Operand::text("x"),
        ),
    );
    assert_eq!(
        query.to_sql(),
        r#"SELECT DISTINCT "demo1".* FROM "demo1" LEFT JOIN "users" "__data_users_rel_one" ON "__data_users_rel_one"."id" = {:__data_users_rel_one__0} WHERE "__data_users_rel_one"."username" = {:p1}"#
    );

    let (sql, values) = query.to_positional().unwrap();
    assert_eq!(
        sql,
        r#"SELECT DISTINCT "demo1".* FROM "demo1" LEFT JOIN "users" "__data_users_rel_one" ON "__data_users_rel_one"."id" = $1 WHERE "__data_users_rel_one"."username" = $2"#
    );
    assert_eq!(values, vec![json!("u1"), json!("x")]);

    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, Some(&info), false);
    let result = resolver.resolve("@request.body.rel_many.name").unwrap();
    assert_eq!(result.identifier, r#""__data_users_rel_many"."name""#);
    assert!(result.multi_match.is_some());
    assert_eq!(
        resolver.joins()[0].on.as_deref(),
        Some(r#""__data_users_rel_many"."id" IN ({:__data_users_rel_many__0}, {:__data_users_rel_many__1})"#)
    );

    // request paths are system filters, so submitted relations expose emails
    let result = resolver.resolve("@request.body.rel_one.email").unwrap();
    assert_eq!(result.identifier, r#""__data_users_rel_one"."email""#);
    assert_eq!(result.after_build, None);
}

#[test]
fn test_auth_record_join() {
    let info = request();
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, Some(&info), false);

    assert_eq!(
        resolver.resolve("@request.auth.name").unwrap().identifier,
        r#""__auth_users"."name""#
    );
    assert_eq!(
        resolver.resolve("@request.auth.rel.title").unwrap().identifier,
        r#""__auth_users_rel"."title""#
    );
    assert_eq!(
        resolver.resolve("@request.auth.password").unwrap().identifier,
        r#""__auth_users"."password""#
    );

    let joins: Vec<String> = resolver.joins().iter().map(|j| j.to_sql()).collect();
    assert_eq!(
        joins,
        vec![
            r#"LEFT JOIN "users" "__auth_users" ON "__auth_users"."id" = {:__auth_users__id}"#.to_string(),
            r#"LEFT JOIN "demo2" "__auth_users_rel" ON "__auth_users_rel"."id" = "__auth_users"."rel""#.to_string(),
        ]
    );
    assert_eq!(resolver.param("__auth_users__id"), Some(&json!("u0")));

    // fields the auth collection does not define resolve to NULL
    assert_eq!(resolver.resolve("@request.auth.missing").unwrap().identifier, "NULL");
    assert_eq!(resolver.resolve("@request.auth.nope.title").unwrap().identifier, "NULL");
}

#[test]
fn test_empty_request_value_comparison() {
    let info = request();
    let catalog = catalog();

    let sql = compile(
        &catalog,
        "demo1",
        Some(&info),
        false,
        &FilterExpr::and(vec![
            FilterExpr::comparison(
                Operand::field("text"),
                ComparisonOp::Eq,
                Operand::field("@request.query.a"),
            ),
            FilterExpr::comparison(
                Operand::field("number"),
                ComparisonOp::Eq,
                Operand::field("@request.body.number"),
            ),
        ]),
    )
    .to_sql();

    assert_eq!(
        sql,
        r#"SELECT "demo1".* FROM "demo1" WHERE (("demo1"."text" = '' OR "demo1"."text" IS NULL) AND "demo1"."number" = {:p2})"#
    );
}
