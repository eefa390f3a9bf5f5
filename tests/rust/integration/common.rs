use rulesql::collection_catalog::{CatalogConfig, CollectionCatalog};
use rulesql::filter::{apply_filter, FilterExpr};
use rulesql::request_info::RequestInfo;
use rulesql::resolver::RecordFieldResolver;
use rulesql::sql::{SelectQuery, ToSql};

const FIXTURE: &str = include_str!("../../fixtures/collections.yaml");

pub fn catalog() -> CollectionCatalog {
    CatalogConfig::from_yaml_str(FIXTURE)
        .expect("fixture parses")
        .to_catalog()
        .expect("fixture is valid")
}

/// Apply `filter` to a fresh query on `collection` and render it.
pub fn compile(
    catalog: &CollectionCatalog,
    collection: &str,
    request_info: Option<&RequestInfo>,
    allow_hidden_fields: bool,
    filter: &FilterExpr,
) -> SelectQuery {
    let base = catalog.get(collection).expect("collection exists");
    let mut resolver = RecordFieldResolver::new(catalog, base, request_info, allow_hidden_fields);
    let mut query = SelectQuery::for_table(&base.name);
    apply_filter(&mut query, filter, &mut resolver).expect("filter compiles");
    query
}

pub fn compile_sql(
    catalog: &CollectionCatalog,
    collection: &str,
    request_info: Option<&RequestInfo>,
    filter: &FilterExpr,
) -> String {
    compile(catalog, collection, request_info, false, filter).to_sql()
}
