// Integration tests for filters applied to a SelectQuery
use rulesql::filter::{apply_filter, ComparisonOp, FilterBuildError, FilterExpr, Operand};
use rulesql::resolver::{RecordFieldResolver, ResolverError};
use rulesql::sql::{Join, SelectQuery, ToSql};
use serde_json::json;

use super::common::{catalog, compile};

#[test]
fn test_filter_is_and_ed_into_existing_conditions() {
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, None, false);

    let mut query = SelectQuery::for_table("demo1");
    query.and_where(r#""demo1"."bool" = TRUE"#);

    apply_filter(
        &mut query,
        &FilterExpr::comparison(
            Operand::field("text"),
            ComparisonOp::Like,
            Operand::text("50%_off"),
        ),
        &mut resolver,
    )
    .unwrap();

    assert_eq!(
        query.to_sql(),
        r#"SELECT "demo1".* FROM "demo1" WHERE ("demo1"."bool" = TRUE) AND ("demo1"."text"::text LIKE {:p1} ESCAPE '\')"#
    );
    // the value has its own wildcard and is used as given
    assert_eq!(query.params().get("p1"), Some(&json!("50%_off")));
}

#[test]
fn test_existing_join_with_same_alias() {
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let filter = FilterExpr::comparison(
        Operand::field("rel_one.name"),
        ComparisonOp::Eq,
        Operand::text("x"),
    );

    // an identical join is reused
    let mut query = SelectQuery::for_table("demo1");
    query.left_join(Join::table(
        "users",
        "demo1_rel_one",
        Some(r#""demo1_rel_one"."id" = "demo1"."rel_one""#.to_string()),
    ));
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, None, false);
    apply_filter(&mut query, &filter, &mut resolver).unwrap();
    assert_eq!(query.joins().len(), 1);
    assert!(query.is_distinct());

    // a different join under that alias is refused
    let mut query = SelectQuery::for_table("demo1");
    query.left_join(Join::table("demo2", "demo1_rel_one", None));
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, None, false);
    assert_eq!(
        apply_filter(&mut query, &filter, &mut resolver),
        Err(FilterBuildError::Resolver(ResolverError::AmbiguousAlias(
            "demo1_rel_one".to_string()
        )))
    );
}

#[test]
fn test_json_filter_document() {
    let catalog = catalog();
    let filter: FilterExpr = serde_json::from_value(json!({
        "type": "group",
        "join": "or",
        "items": [
            {"type": "comparison", "left": {"field": "number"}, "op": ">=", "right": {"number": 2.5}},
            {"type": "comparison", "left": {"field": "select_one"}, "op": "!=", "right": {"text": "x"}}
        ]
    }))
    .unwrap();

    let query = compile(&catalog, "demo1", None, false, &filter);
    let (sql, values) = query.to_positional().unwrap();

    assert_eq!(
        sql,
        r#"SELECT "demo1".* FROM "demo1" WHERE ("demo1"."number" >= $1 OR "demo1"."select_one" IS DISTINCT FROM $2)"#
    );
    assert_eq!(values, vec![json!(2.5), json!("x")]);
}

#[test]
fn test_failed_filter_leaves_query_untouched() {
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, None, false);
    let mut query = SelectQuery::for_table("demo1");

    let result = apply_filter(
        &mut query,
        &FilterExpr::and(vec![
            FilterExpr::comparison(
                Operand::field("rel_one.name"),
                ComparisonOp::Eq,
                Operand::text("x"),
            ),
            FilterExpr::comparison(Operand::field("nope"), ComparisonOp::Eq, Operand::Null),
        ]),
        &mut resolver,
    );

    assert!(matches!(
        result,
        Err(FilterBuildError::Resolver(ResolverError::UnknownField(_)))
    ));
    assert_eq!(query.to_sql(), r#"SELECT "demo1".* FROM "demo1""#);
    assert!(query.params().is_empty());
}

#[test]
fn test_empty_group() {
    let catalog = catalog();
    let demo1 = catalog.get("demo1").unwrap();
    let mut resolver = RecordFieldResolver::new(&catalog, demo1, None, false);
    let mut query = SelectQuery::for_table("demo1");

    assert_eq!(
        apply_filter(&mut query, &FilterExpr::or(Vec::new()), &mut resolver),
        Err(FilterBuildError::EmptyGroup)
    );
}
