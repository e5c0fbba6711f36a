//! In-memory [`SqlExecutor`] double for integration tests.
//!
//! Parses the narrow statement shapes the PostgreSQL dialect emits and
//! maintains real schemas, tables, and rows, so the write path can be
//! exercised end to end without a live backend. State lives behind an
//! `Arc<Mutex<_>>` handle the test keeps, since the transaction consumes
//! the executor.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use docrel::backend::{ColumnDescription, SqlParam, SqlExecutor, TableDescription};
use docrel::error::BackendError;

/// Installs a fmt subscriber once per test binary so `RUST_LOG` surfaces
/// engine logs on failure.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<ColumnDescription>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Vec<SqlParam>>,
}

impl MockTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell value, NULL when the row predates the column.
    pub fn cell<'a>(&self, row: &'a [SqlParam], column: &str) -> Option<&'a SqlParam> {
        self.column_index(column).and_then(|i| row.get(i))
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// schema name -> table name -> table
    pub schemas: BTreeMap<String, BTreeMap<String, MockTable>>,
    /// Every statement executed, in order.
    pub statements: Vec<String>,
    /// Row counts of each `execute_batch` call.
    pub batch_calls: Vec<usize>,
    /// One-shot failure: the first statement containing the substring fails
    /// with the given error.
    pub fail_on: Option<(String, BackendError)>,
    pub began: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

impl MockState {
    pub fn table(&self, schema: &str, table: &str) -> Option<&MockTable> {
        self.schemas.get(schema).and_then(|s| s.get(table))
    }

    pub fn row_count(&self, schema: &str, table: &str) -> usize {
        self.table(schema, table).map_or(0, |t| t.rows.len())
    }

    pub fn table_names_of(&self, schema: &str) -> Vec<String> {
        self.schemas
            .get(schema)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_fail(&mut self, sql: &str) -> Result<(), BackendError> {
        let hit = self
            .fail_on
            .as_ref()
            .is_some_and(|(needle, _)| sql.contains(needle.as_str()));
        if hit {
            let (_, err) = self.fail_on.take().unwrap();
            return Err(err);
        }
        Ok(())
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> Result<&mut MockTable, BackendError> {
        self.schemas
            .get_mut(schema)
            .and_then(|s| s.get_mut(table))
            .ok_or_else(|| {
                BackendError::new(
                    format!("relation \"{schema}\".\"{table}\" does not exist"),
                    Some("42P01".to_string()),
                )
            })
    }

    fn apply(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, BackendError> {
        if let Some(rest) = sql.strip_prefix("CREATE SCHEMA ") {
            let name = unquote(rest.trim());
            if self.schemas.contains_key(&name) {
                return Err(BackendError::new(
                    format!("schema \"{name}\" already exists"),
                    Some("42P06".to_string()),
                ));
            }
            self.schemas.insert(name, BTreeMap::new());
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("DROP SCHEMA ") {
            let name = unquote(rest.trim_end_matches(" CASCADE").trim());
            self.schemas.remove(&name).ok_or_else(|| {
                BackendError::new(
                    format!("schema \"{name}\" does not exist"),
                    Some("3F000".to_string()),
                )
            })?;
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let open = rest.find(" (").ok_or_else(|| syntax(sql))?;
            let (schema, table) = parse_qualified(&rest[..open])?;
            let defs = rest[open + 2..].strip_suffix(')').ok_or_else(|| syntax(sql))?;
            let mut mock = MockTable::default();
            for def in split_top_level(defs) {
                let def = def.trim();
                if let Some(pk) = def.strip_prefix("PRIMARY KEY (") {
                    let pk = pk.strip_suffix(')').ok_or_else(|| syntax(sql))?;
                    mock.primary_key = pk.split(", ").map(unquote).collect();
                } else {
                    mock.columns.push(parse_column_def(def).ok_or_else(|| syntax(sql))?);
                }
            }
            let tables = self.schemas.get_mut(&schema).ok_or_else(|| {
                BackendError::new(
                    format!("schema \"{schema}\" does not exist"),
                    Some("3F000".to_string()),
                )
            })?;
            if tables.contains_key(&table) {
                return Err(BackendError::new(
                    format!("relation \"{table}\" already exists"),
                    Some("42P07".to_string()),
                ));
            }
            tables.insert(table, mock);
            return Ok(0);
        }
        if sql.starts_with("CREATE INDEX ") {
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("DROP TABLE ") {
            let (schema, table) = parse_qualified(rest.trim())?;
            let tables = self.schemas.get_mut(&schema).ok_or_else(|| syntax(sql))?;
            tables.remove(&table).ok_or_else(|| {
                BackendError::new(
                    format!("relation \"{table}\" does not exist"),
                    Some("42P01".to_string()),
                )
            })?;
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            let marker = " ADD COLUMN ";
            let at = rest.find(marker).ok_or_else(|| syntax(sql))?;
            let (schema, table) = parse_qualified(&rest[..at])?;
            let def = rest[at + marker.len()..].trim();
            let column = parse_column_def(def).ok_or_else(|| syntax(sql))?;
            let mock = self.table_mut(&schema, &table)?;
            if mock.column_index(&column.name).is_some() {
                return Err(BackendError::new(
                    format!("column \"{}\" already exists", column.name),
                    Some("42701".to_string()),
                ));
            }
            mock.columns.push(column);
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            let open = rest.find(" (").ok_or_else(|| syntax(sql))?;
            let (schema, table) = parse_qualified(&rest[..open])?;
            let close = rest.find(") VALUES").ok_or_else(|| syntax(sql))?;
            let columns: Vec<String> = rest[open + 2..close].split(", ").map(unquote).collect();
            let mock = self.table_mut(&schema, &table)?;
            assert_eq!(
                columns.len(),
                params.len(),
                "bound parameter count must match the statement column list"
            );
            // Align the bound values to the table's declared column order.
            let mut row: Vec<SqlParam> = Vec::with_capacity(mock.columns.len());
            for declared in mock.columns.clone() {
                match columns.iter().position(|c| *c == declared.name) {
                    Some(i) => row.push(params[i].clone()),
                    None => row.push(SqlParam::Null(docrel::FieldType::Null)),
                }
            }
            for name in &columns {
                assert!(
                    mock.column_index(name).is_some(),
                    "statement names unknown column {name}"
                );
            }
            mock.rows.push(row);
            return Ok(1);
        }
        if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let marker = " WHERE ";
            let at = rest.find(marker).ok_or_else(|| syntax(sql))?;
            let (schema, table) = parse_qualified(&rest[..at])?;
            let predicate = &rest[at + marker.len()..];

            if let Some(ids) = predicate
                .strip_prefix("\"did\" IN (")
                .and_then(|p| p.strip_suffix(')'))
            {
                let dids: Vec<i64> = ids
                    .split(", ")
                    .map(|v| v.parse().map_err(|_| syntax(sql)))
                    .collect::<Result<_, _>>()?;
                let mock = self.table_mut(&schema, &table)?;
                let before = mock.rows.len();
                let did_idx = mock.column_index("did").ok_or_else(|| syntax(sql))?;
                mock.rows
                    .retain(|row| !matches!(row.get(did_idx), Some(SqlParam::I64(d)) if dids.contains(d)));
                return Ok((before - mock.rows.len()) as u64);
            }

            // "col" = $1 [AND "col" = $2 ...]
            let columns: Vec<String> = predicate
                .split(" AND ")
                .map(|clause| {
                    clause
                        .split(" = ")
                        .next()
                        .map(unquote)
                        .ok_or_else(|| syntax(sql))
                })
                .collect::<Result<_, _>>()?;
            assert_eq!(columns.len(), params.len());
            let mock = self.table_mut(&schema, &table)?;
            let before = mock.rows.len();
            let indices: Vec<Option<usize>> =
                columns.iter().map(|c| mock.column_index(c)).collect();
            mock.rows.retain(|row| {
                !indices
                    .iter()
                    .zip(params)
                    .all(|(idx, want)| idx.and_then(|i| row.get(i)) == Some(want))
            });
            return Ok((before - mock.rows.len()) as u64);
        }
        Err(syntax(sql))
    }
}

fn syntax(sql: &str) -> BackendError {
    BackendError::new(format!("unsupported statement: {sql}"), Some("42601".to_string()))
}

fn unquote(s: impl AsRef<str>) -> String {
    s.as_ref()
        .trim()
        .trim_matches('"')
        .replace("\"\"", "\"")
}

fn parse_qualified(s: &str) -> Result<(String, String), BackendError> {
    let s = s.trim();
    let inner = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| syntax(s))?;
    let (schema, table) = inner.split_once("\".\"").ok_or_else(|| syntax(s))?;
    Ok((schema.to_string(), table.to_string()))
}

/// Split a CREATE TABLE column list on commas outside parentheses.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// `"name" type [NOT NULL] [NULL] [UNIQUE]`
fn parse_column_def(def: &str) -> Option<ColumnDescription> {
    let def = def.trim();
    let rest = def.strip_prefix('"')?;
    let (name, mut spec) = rest.split_once('"')?;
    spec = spec.trim();
    let nullable = !spec.contains("NOT NULL");
    let type_name = spec
        .trim_end_matches("UNIQUE")
        .trim()
        .trim_end_matches("NOT NULL")
        .trim()
        .trim_end_matches("NULL")
        .trim()
        .to_string();
    Some(ColumnDescription {
        name: name.to_string(),
        type_name,
        nullable,
    })
}

/// Executor handle over shared [`MockState`].
#[derive(Clone)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    pub fn new() -> (Self, Arc<Mutex<MockState>>) {
        init_tracing();
        let state = Arc::new(Mutex::new(MockState::default()));
        (Self { state: Arc::clone(&state) }, state)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn begin(&mut self) -> Result<(), BackendError> {
        self.lock().began += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.lock().committed += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.lock().rolled_back += 1;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, BackendError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.check_fail(sql)?;
        state.apply(sql, params)
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        rows: &[Vec<SqlParam>],
    ) -> Result<u64, BackendError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.batch_calls.push(rows.len());
        state.check_fail(sql)?;
        let mut affected = 0;
        for row in rows {
            affected += state.apply(sql, row)?;
        }
        Ok(affected)
    }

    async fn query_dids(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<i64>, BackendError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.check_fail(sql)?;

        let rest = sql.strip_prefix("SELECT \"did\" FROM ").ok_or_else(|| syntax(sql))?;
        let (qualified, filter) = match rest.split_once(" WHERE ") {
            Some((q, predicate)) => {
                let column = predicate
                    .split(" = ")
                    .next()
                    .map(unquote)
                    .ok_or_else(|| syntax(sql))?;
                (q, Some(column))
            }
            None => (rest, None),
        };
        let (schema, table) = parse_qualified(qualified)?;
        let mock = state.table_mut(&schema, &table)?;
        let did_idx = mock.column_index("did").ok_or_else(|| syntax(sql))?;
        let filter_idx = match &filter {
            Some(column) => Some(mock.column_index(column).ok_or_else(|| syntax(sql))?),
            None => None,
        };

        let mut dids = Vec::new();
        for row in &mock.rows {
            if let Some(idx) = filter_idx {
                if row.get(idx) != params.first() {
                    continue;
                }
            }
            if let Some(SqlParam::I64(did)) = row.get(did_idx) {
                dids.push(*did);
            }
        }
        Ok(dids)
    }

    async fn query_text_rows(&mut self, sql: &str) -> Result<Vec<Vec<String>>, BackendError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.check_fail(sql)?;

        let rest = sql.strip_prefix("SELECT ").ok_or_else(|| syntax(sql))?;
        let (column_list, from) = rest.split_once(" FROM ").ok_or_else(|| syntax(sql))?;
        let columns: Vec<String> = column_list.split(", ").map(unquote).collect();
        let qualified = from.split(" ORDER BY ").next().unwrap_or(from);
        let (schema, table) = parse_qualified(qualified)?;
        let mock = state.table_mut(&schema, &table)?;

        let indices: Vec<usize> = columns
            .iter()
            .map(|c| mock.column_index(c).ok_or_else(|| syntax(sql)))
            .collect::<Result<_, _>>()?;
        let mut out = Vec::with_capacity(mock.rows.len());
        for row in &mock.rows {
            let mut cells = Vec::with_capacity(indices.len());
            for idx in &indices {
                match row.get(*idx) {
                    Some(SqlParam::Text(s)) => cells.push(s.clone()),
                    other => {
                        return Err(BackendError::new(
                            format!("non-text cell in text query: {other:?}"),
                            Some("42804".to_string()),
                        ))
                    }
                }
            }
            out.push(cells);
        }
        Ok(out)
    }

    async fn schema_names(&mut self) -> Result<Vec<String>, BackendError> {
        Ok(self.lock().schemas.keys().cloned().collect())
    }

    async fn table_names(&mut self, schema: &str) -> Result<Vec<String>, BackendError> {
        Ok(self.lock().table_names_of(schema))
    }

    async fn describe_table(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<TableDescription, BackendError> {
        let mut state = self.lock();
        let mock = state.table_mut(schema, table)?;
        Ok(TableDescription {
            name: table.to_string(),
            columns: mock.columns.clone(),
            primary_key: mock.primary_key.clone(),
        })
    }
}
