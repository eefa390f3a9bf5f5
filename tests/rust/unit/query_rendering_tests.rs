//! SQL rendering and filter JSON parsing through the public API.

#[cfg(test)]
mod query_rendering {
    use rulesql::filter::{ComparisonOp, FilterExpr, LogicalOp, Operand};
    use rulesql::request_info::{BodyValue, RequestInfo};
    use rulesql::sql::{Join, SelectQuery, ToSql};
    use serde_json::json;

    #[test]
    fn test_positional_placeholders_reuse_positions() {
        let mut query = SelectQuery::for_table("posts");
        query
            .left_join(Join::table(
                "users",
                "__auth_users",
                Some(r#""__auth_users"."id" = {:auth}"#.to_string()),
            ))
            .distinct(true)
            .and_where(r#""posts"."author" = {:auth} OR "posts"."title" = {:p1}"#)
            .bind("p1", json!("hello"))
            .bind("auth", json!("u1"));

        let (sql, values) = query.to_positional().unwrap();
        assert_eq!(
            sql,
            r#"SELECT DISTINCT "posts".* FROM "posts" LEFT JOIN "users" "__auth_users" ON "__auth_users"."id" = $1 WHERE "posts"."author" = $1 OR "posts"."title" = $2"#
        );
        assert_eq!(values, vec![json!("u1"), json!("hello")]);
    }

    #[test]
    fn test_multiple_conditions_are_and_ed() {
        let mut query = SelectQuery::for_table("posts");
        query.and_where("a = 1").and_where("  ").and_where("b = 2");

        assert_eq!(
            query.to_sql(),
            r#"SELECT "posts".* FROM "posts" WHERE (a = 1) AND (b = 2)"#
        );
    }

    #[test]
    fn test_filter_from_json() {
        let expr: FilterExpr = serde_json::from_str(
            r#"{"type": "group", "join": "and", "items": [
                {"type": "comparison", "left": {"field": "tags:length"}, "op": ">", "right": {"number": 2}}
            ]}"#,
        )
        .unwrap();

        let FilterExpr::Group { join, items } = expr else {
            panic!("expected a group");
        };
        assert_eq!(join, LogicalOp::And);
        assert_eq!(
            items,
            vec![FilterExpr::comparison(
                Operand::field("tags:length"),
                ComparisonOp::Gt,
                Operand::Number(2.0)
            )]
        );
    }

    #[test]
    fn test_request_info_defaults() {
        let info = RequestInfo::from_json_str(r#"{"body": {"tags": "[\"a\",\"b\"]"}}"#).unwrap();

        assert!(info.auth.is_none());
        assert!(info.query.is_empty());
        assert_eq!(info.body["tags"].unique_strings(), vec!["a", "b"]);
        assert!(matches!(info.body["tags"], BodyValue::Plain(_)));
    }
}
