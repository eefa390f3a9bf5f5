//! Identifier quoting and the JSON helper functions installed in the database.
//!
//! The `pb_json_*` functions are created by the schema migrations; they accept
//! both json and plain text columns, so the resolver can treat select, file and
//! relation columns uniformly whether they hold one value or an array.

/// Quote an identifier for PostgreSQL.
///
/// ```
/// use rulesql::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("posts"), r#""posts""#);
/// assert_eq!(quote_identifier(r#"a"b"#), r#""a""b""#);
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a `table.column` reference.
pub fn quote_column(table_alias: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(table_alias), quote_identifier(column))
}

/// Strip everything that is not a letter, digit or underscore.
///
/// Used to derive table aliases from user supplied path segments.
///
/// ```
/// use rulesql::sql::columnify;
///
/// assert_eq!(columnify("demo1:alias"), "demo1alias");
/// assert_eq!(columnify("rel_one"), "rel_one");
/// ```
pub fn columnify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Named placeholder for a bound parameter.
pub fn placeholder(name: &str) -> String {
    format!("{{:{}}}", name)
}

/// Set-returning unnest of a JSON array (or a plain value treated as a one item array).
pub fn json_each(expr: &str) -> String {
    format!("pb_json_each({})", expr)
}

/// Element count of a JSON array; `0` for NULL, empty string and non-arrays.
pub fn json_array_length(expr: &str) -> String {
    format!("pb_json_array_length({})", expr)
}

/// JSON path extraction.
///
/// A path that does not start with array notation is prefixed with `.`, so
/// `a.b` becomes `$.a.b` and `[0]` becomes `$[0]`.
///
/// ```
/// use rulesql::sql::json_extract;
///
/// assert_eq!(json_extract(r#""t"."data""#, "a.b"), r#"pb_json_extract("t"."data", '$.a.b')"#);
/// assert_eq!(json_extract(r#""t"."data""#, "[0]"), r#"pb_json_extract("t"."data", '$[0]')"#);
/// assert_eq!(json_extract(r#""t"."data""#, ""), r#"pb_json_extract("t"."data", '$')"#);
/// ```
pub fn json_extract(expr: &str, path: &str) -> String {
    let path = if !path.is_empty() && !path.starts_with('[') {
        format!(".{}", path)
    } else {
        path.to_string()
    };

    // path segments are \w+ or [n], so they cannot break out of the literal
    format!("pb_json_extract({}, '${}')", expr, path.replace('\'', "''"))
}
