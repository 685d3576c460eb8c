//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from an entity definition.

use crate::model::{ColumnDef, EntityDef};
use crate::store::{Filter, ListQuery, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the entity model).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its typed placeholder, e.g. `$2::bigint`.
    fn push_param(&mut self, v: Value, col: Option<&ColumnDef>) -> String {
        self.params.push(v);
        let n = self.params.len();
        match col {
            Some(c) => format!("${}::{}", n, c.kind.cast()),
            None => format!("${}", n),
        }
    }
}

/// Escape LIKE metacharacters so the needle matches literally.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn select_column_list(entity: &EntityDef) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE clause for list filters; filters on unknown columns are skipped.
fn where_clause(entity: &EntityDef, filters: &[Filter], q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for f in filters {
        let Some(col) = entity.column(f.column()) else { continue };
        let ident = quoted(col.name);
        let part = match f {
            Filter::Eq { value, .. } => {
                let ph = q.push_param(value.clone(), Some(col));
                format!("{} = {}", ident, ph)
            }
            Filter::IContains { needle, .. } => {
                let ph = q.push_param(Value::String(like_pattern(needle)), None);
                format!("{}::text ILIKE {}", ident, ph)
            }
            Filter::AtLeast { value, .. } => {
                let ph = q.push_param(value.clone(), Some(col));
                format!("{} >= {}", ident, ph)
            }
            Filter::Before { value, .. } => {
                let ph = q.push_param(value.clone(), Some(col));
                format!("{} < {}", ident, ph)
            }
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT one page: filters ANDed, ORDER BY pk, LIMIT/OFFSET.
pub fn select_page(entity: &EntityDef, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(entity, &query.filters, &mut q);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(entity),
        quoted(entity.table),
        where_sql,
        quoted(entity.pk().name),
        query.limit,
        query.offset.min(i64::MAX as u64)
    );
    q
}

/// SELECT COUNT(*) with the same filters as [`select_page`].
pub fn count(entity: &EntityDef, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(entity, filters, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(entity.table), where_sql);
    q
}

/// SELECT by primary key.
pub fn select_by_id(entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = entity.pk();
    let ph = q.push_param(Value::from(id), Some(pk));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        quoted(entity.table),
        quoted(pk.name),
        ph
    );
    q
}

/// SELECT EXISTS(column = value [AND pk <> exclude_id]).
pub fn exists(entity: &EntityDef, column: &ColumnDef, value: &Value, exclude_id: Option<i64>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(value.clone(), Some(column));
    let mut cond = format!("{} = {}", quoted(column.name), ph);
    if let Some(id) = exclude_id {
        let pk = entity.pk();
        let ph = q.push_param(Value::from(id), Some(pk));
        cond.push_str(&format!(" AND {} <> {}", quoted(pk.name), ph));
    }
    q.sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", quoted(entity.table), cond);
    q
}

/// INSERT writable columns present in `values`; omitted ones take their DB default.
pub fn insert(entity: &EntityDef, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in entity.writable_columns() {
        let Some(v) = values.get(c.name) else { continue };
        placeholders.push(q.push_param(v.clone(), Some(c)));
        cols.push(quoted(c.name));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", quoted(entity.table), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(entity.table),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only writable columns present in `values`.
/// With nothing to set, selects the row unchanged.
pub fn update(entity: &EntityDef, id: i64, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = entity.pk();
    let mut sets = Vec::new();
    for c in entity.writable_columns() {
        let Some(v) = values.get(c.name) else { continue };
        let ph = q.push_param(v.clone(), Some(c));
        sets.push(format!("{} = {}", quoted(c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_ph = q.push_param(Value::from(id), Some(pk));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(entity.table),
        sets.join(", "),
        quoted(pk.name),
        id_ph,
        select_column_list(entity)
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = entity.pk();
    let ph = q.push_param(Value::from(id), Some(pk));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(entity.table),
        quoted(pk.name),
        ph,
        quoted(pk.name)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AMBIENTE, HISTORICO, SENSOR};
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn page_query_applies_filters_in_order() {
        let query = ListQuery {
            filters: vec![
                Filter::IContains { column: "sensor", needle: "Temp".into() },
                Filter::Eq { column: "status", value: json!(true) },
            ],
            limit: 10,
            offset: 20,
        };
        let q = select_page(&SENSOR, &query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"sensor\", \"mac_address\", \"unidade_med\", \"latitude\", \"longitude\", \"status\" \
             FROM \"sensor\" WHERE \"sensor\"::text ILIKE $1 AND \"status\" = $2::boolean \
             ORDER BY \"id\" LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!("%Temp%"), json!(true)]);
    }

    #[test]
    fn page_offset_stays_within_bigint() {
        let query = ListQuery {
            filters: vec![],
            limit: 10,
            offset: u64::MAX,
        };
        let q = select_page(&AMBIENTE, &query);
        assert!(q.sql.ends_with("LIMIT 10 OFFSET 9223372036854775807"), "{}", q.sql);
    }

    #[test]
    fn count_shares_the_where_clause() {
        let filters = vec![
            Filter::AtLeast { column: "timestamp", value: json!("2024-01-01T00:00:00.000000Z") },
            Filter::Before { column: "timestamp", value: json!("2024-01-02T00:00:00.000000Z") },
        ];
        let q = count(&HISTORICO, &filters);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"historico\" WHERE \"timestamp\" >= $1::timestamptz AND \"timestamp\" < $2::timestamptz"
        );
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }

    #[test]
    fn insert_skips_read_only_and_omitted_columns() {
        let values = record(json!({"sensor": 1, "ambiente": 2, "valor": 21.5}));
        let q = insert(&HISTORICO, &values);
        assert_eq!(
            q.sql,
            "INSERT INTO \"historico\" (\"sensor\", \"ambiente\", \"valor\") \
             VALUES ($1::bigint, $2::bigint, $3::float8) \
             RETURNING \"id\", \"sensor\", \"ambiente\", \"valor\", \"timestamp\""
        );
        assert_eq!(q.params, vec![json!(1), json!(2), json!(21.5)]);
    }

    #[test]
    fn update_sets_only_supplied_columns() {
        let values = record(json!({"responsavel": "Bob", "id": 99}));
        let q = update(&AMBIENTE, 7, &values);
        assert_eq!(
            q.sql,
            "UPDATE \"ambiente\" SET \"responsavel\" = $1::varchar WHERE \"id\" = $2::bigint \
             RETURNING \"id\", \"descricao\", \"sig\", \"ni\", \"responsavel\""
        );
        assert_eq!(q.params, vec![json!("Bob"), json!(7)]);
    }

    #[test]
    fn empty_update_reads_the_row() {
        let q = update(&AMBIENTE, 7, &Record::new());
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![json!(7)]);
    }

    #[test]
    fn exists_can_exclude_the_row_being_updated() {
        let sig = AMBIENTE.column("sig").unwrap();
        let q = exists(&AMBIENTE, sig, &json!("LAB1"), Some(3));
        assert_eq!(
            q.sql,
            "SELECT EXISTS(SELECT 1 FROM \"ambiente\" WHERE \"sig\" = $1::varchar AND \"id\" <> $2::bigint)"
        );
        let q = exists(&AMBIENTE, sig, &json!("LAB1"), None);
        assert_eq!(q.params, vec![json!("LAB1")]);
    }

    #[test]
    fn delete_returns_the_key() {
        let q = delete(&SENSOR, 4);
        assert_eq!(q.sql, "DELETE FROM \"sensor\" WHERE \"id\" = $1::bigint RETURNING \"id\"");
    }
}
