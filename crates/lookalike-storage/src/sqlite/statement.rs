// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL generation from table maps and records, plus value and argument
//! conversion between lookalike and rusqlite types.

use std::sync::Arc;

use lookalike_core::{Args, LookalikeError, Record, Row, TableMap, Value};
use parking_lot::RwLock;
use rusqlite::types::ValueRef;

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Table maps known to an executor, in registration order. Clones share
/// the same maps.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Arc<RwLock<Vec<TableMap>>>,
}

impl TableRegistry {
    pub fn register(&self, table: TableMap) {
        let mut tables = self.tables.write();
        match tables.iter_mut().find(|t| t.name() == table.name()) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for every registered table.
    pub fn create_tables(&self) -> Result<Vec<String>, LookalikeError> {
        self.tables.read().iter().map(create_table_sql).collect()
    }

    /// `CREATE INDEX IF NOT EXISTS` for every declared index.
    pub fn create_indexes(&self) -> Vec<String> {
        self.tables
            .read()
            .iter()
            .flat_map(|table| {
                table.indexes().iter().map(move |index| {
                    format!(
                        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                        if index.unique { "UNIQUE " } else { "" },
                        quote(&index.name),
                        quote(table.name()),
                        quote_list(index.columns.iter().map(String::as_str)),
                    )
                })
            })
            .collect()
    }

    /// Insert statement for `record`. The flag tells whether the table
    /// assigns the key itself.
    pub fn insert(&self, record: &dyn Record) -> Result<(Statement, bool), LookalikeError> {
        self.with_table(record, |table, values| {
            let columns: Vec<&str> = table
                .columns()
                .iter()
                .map(|c| c.name.as_str())
                .filter(|c| !(table.auto_increment() && table.is_key(c)))
                .collect();
            let params = columns
                .iter()
                .map(|c| take_column(table, values, c))
                .collect::<Result<Vec<_>, _>>()?;
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table.name()),
                quote_list(columns.iter().copied()),
                placeholders(1, columns.len()),
            );
            Ok((Statement { sql, params }, table.auto_increment()))
        })
    }

    /// Update by key. `None` when the table has nothing but key columns.
    pub fn update(&self, record: &dyn Record) -> Result<Option<Statement>, LookalikeError> {
        self.with_table(record, |table, values| {
            require_keys(table)?;
            let set: Vec<&str> = table
                .columns()
                .iter()
                .map(|c| c.name.as_str())
                .filter(|c| !table.is_key(c))
                .collect();
            if set.is_empty() {
                return Ok(None);
            }

            let mut params = Vec::with_capacity(table.columns().len());
            let mut assignments = Vec::with_capacity(set.len());
            for column in &set {
                params.push(take_column(table, values, column)?);
                assignments.push(format!("{} = ?{}", quote(column), params.len()));
            }
            let filter = key_filter(table, values, &mut params)?;
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote(table.name()),
                assignments.join(", "),
                filter
            );
            Ok(Some(Statement { sql, params }))
        })
    }

    pub fn delete(&self, record: &dyn Record) -> Result<Statement, LookalikeError> {
        self.with_table(record, |table, values| {
            require_keys(table)?;
            let mut params = Vec::with_capacity(table.keys().len());
            let filter = key_filter(table, values, &mut params)?;
            let sql = format!("DELETE FROM {} WHERE {}", quote(table.name()), filter);
            Ok(Statement { sql, params })
        })
    }

    fn with_table<T>(
        &self,
        record: &dyn Record,
        build: impl FnOnce(&TableMap, &[(&'static str, Value)]) -> Result<T, LookalikeError>,
    ) -> Result<T, LookalikeError> {
        let tables = self.tables.read();
        let name = record.table_name();
        let table = tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| LookalikeError::UnknownTable {
                table: name.to_string(),
            })?;
        build(table, &record.columns())
    }
}

fn create_table_sql(table: &TableMap) -> Result<String, LookalikeError> {
    if table.columns().is_empty() {
        return Err(LookalikeError::Internal(format!(
            "table `{}` declares no columns",
            table.name()
        )));
    }

    let mut defs: Vec<String> = table
        .columns()
        .iter()
        .map(|c| {
            if table.auto_increment() && table.is_key(&c.name) {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(&c.name))
            } else {
                format!("{} {}", quote(&c.name), c.column_type)
            }
        })
        .collect();
    if !table.keys().is_empty() && !table.auto_increment() {
        defs.push(format!(
            "PRIMARY KEY ({})",
            quote_list(table.keys().iter().map(String::as_str))
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table.name()),
        defs.join(", ")
    ))
}

fn require_keys(table: &TableMap) -> Result<(), LookalikeError> {
    if table.keys().is_empty() {
        return Err(LookalikeError::NoKeys {
            table: table.name().to_string(),
        });
    }
    Ok(())
}

fn key_filter(
    table: &TableMap,
    values: &[(&'static str, Value)],
    params: &mut Vec<Value>,
) -> Result<String, LookalikeError> {
    let mut terms = Vec::with_capacity(table.keys().len());
    for key in table.keys() {
        params.push(take_column(table, values, key)?);
        terms.push(format!("{} = ?{}", quote(key), params.len()));
    }
    Ok(terms.join(" AND "))
}

fn take_column(
    table: &TableMap,
    values: &[(&'static str, Value)],
    column: &str,
) -> Result<Value, LookalikeError> {
    values
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| LookalikeError::MissingColumn {
            table: table.name().to_string(),
            column: column.to_string(),
        })
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_list<'a>(idents: impl Iterator<Item = &'a str>) -> String {
    idents.map(quote).collect::<Vec<_>>().join(", ")
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Integer(v) => Sql::Integer(*v),
        Value::Real(v) => Sql::Real(*v),
        Value::Text(v) => Sql::Text(v.clone()),
        Value::Blob(v) => Sql::Blob(v.clone()),
    }
}

pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

/// Bind `args` to a prepared statement. Every placeholder must receive a
/// value; SQLite would otherwise read the unbound ones as NULL.
pub fn bind(stmt: &mut rusqlite::Statement<'_>, args: &Args) -> rusqlite::Result<()> {
    match args {
        Args::None => match stmt.parameter_count() {
            0 => Ok(()),
            expected => Err(rusqlite::Error::InvalidParameterCount(0, expected)),
        },
        Args::Positional(values) => bind_positional(stmt, values),
        Args::Named(pairs) => {
            let mut bound = vec![false; stmt.parameter_count()];
            for (name, value) in pairs {
                let name = if name.starts_with([':', '@', '$']) {
                    name.clone()
                } else {
                    format!(":{name}")
                };
                let index = stmt
                    .parameter_index(&name)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                stmt.raw_bind_parameter(index, to_sql(value))?;
                bound[index - 1] = true;
            }
            match bound.iter().position(|b| !b) {
                None => Ok(()),
                Some(i) => Err(match stmt.parameter_name(i + 1) {
                    Some(name) => rusqlite::Error::InvalidParameterName(name.to_string()),
                    None => rusqlite::Error::InvalidParameterCount(
                        bound.iter().filter(|b| **b).count(),
                        bound.len(),
                    ),
                }),
            }
        }
    }
}

pub fn bind_positional(stmt: &mut rusqlite::Statement<'_>, values: &[Value]) -> rusqlite::Result<()> {
    let expected = stmt.parameter_count();
    if values.len() != expected {
        return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected));
    }
    for (i, value) in values.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, to_sql(value))?;
    }
    Ok(())
}

/// Run a query and collect every row.
pub fn query_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &Args,
) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    bind(&mut stmt, args)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(from_sql))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(Row::new(Arc::clone(&columns), values));
    }
    Ok(out)
}

/// Execute a statement and return the number of changed rows.
pub fn execute(conn: &rusqlite::Connection, sql: &str, args: &Args) -> rusqlite::Result<u64> {
    let mut stmt = conn.prepare(sql)?;
    bind(&mut stmt, args)?;
    Ok(stmt.raw_execute()? as u64)
}

pub fn execute_statement(conn: &rusqlite::Connection, statement: &Statement) -> rusqlite::Result<u64> {
    let mut stmt = conn.prepare(&statement.sql)?;
    bind_positional(&mut stmt, &statement.params)?;
    Ok(stmt.raw_execute()? as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookalike_core::ColumnType;

    #[derive(Debug)]
    struct Hash {
        id: i64,
        hash: i64,
        path: &'static str,
    }

    impl Record for Hash {
        fn table_name(&self) -> &'static str {
            "hashes"
        }

        fn columns(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", self.id.into()),
                ("hash", self.hash.into()),
                ("path", self.path.into()),
            ]
        }
    }

    fn hashes(auto_increment: bool) -> TableMap {
        TableMap::new("hashes")
            .column("id", ColumnType::Integer)
            .column("hash", ColumnType::Integer)
            .column("path", ColumnType::Text)
            .set_keys(auto_increment, &["id"])
            .add_index("hashes_hash", &["hash"])
    }

    fn record() -> Hash {
        Hash {
            id: 3,
            hash: 99,
            path: "a.png",
        }
    }

    #[test]
    fn create_table_declares_primary_key() {
        let registry = TableRegistry::default();
        registry.register(hashes(false));
        let ddl = registry.create_tables().unwrap();
        assert_eq!(
            ddl,
            [r#"CREATE TABLE IF NOT EXISTS "hashes" ("id" INTEGER, "hash" INTEGER, "path" TEXT, PRIMARY KEY ("id"))"#]
        );
        assert_eq!(
            registry.create_indexes(),
            [r#"CREATE INDEX IF NOT EXISTS "hashes_hash" ON "hashes" ("hash")"#]
        );
    }

    #[test]
    fn auto_increment_key_is_left_to_the_database() {
        let registry = TableRegistry::default();
        registry.register(hashes(true));
        assert!(registry.create_tables().unwrap()[0].contains(r#""id" INTEGER PRIMARY KEY AUTOINCREMENT"#));

        let (stmt, assigns_key) = registry.insert(&record()).unwrap();
        assert!(assigns_key);
        assert_eq!(stmt.sql, r#"INSERT INTO "hashes" ("hash", "path") VALUES (?1, ?2)"#);
        assert_eq!(stmt.params, vec![Value::Integer(99), Value::Text("a.png".into())]);
    }

    #[test]
    fn update_sets_non_keys_and_filters_on_keys() {
        let registry = TableRegistry::default();
        registry.register(hashes(false));
        let stmt = registry.update(&record()).unwrap().unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "hashes" SET "hash" = ?1, "path" = ?2 WHERE "id" = ?3"#
        );
        assert_eq!(stmt.params[2], Value::Integer(3));

        let stmt = registry.delete(&record()).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "hashes" WHERE "id" = ?1"#);
    }

    #[test]
    fn keyless_tables_reject_update_and_delete() {
        let registry = TableRegistry::default();
        registry.register(
            TableMap::new("hashes")
                .column("id", ColumnType::Integer)
                .column("hash", ColumnType::Integer)
                .column("path", ColumnType::Text),
        );
        assert!(matches!(registry.update(&record()), Err(LookalikeError::NoKeys { .. })));
        assert!(matches!(registry.delete(&record()), Err(LookalikeError::NoKeys { .. })));
    }

    #[test]
    fn unregistered_table_and_missing_column_are_errors() {
        let registry = TableRegistry::default();
        assert!(matches!(
            registry.insert(&record()),
            Err(LookalikeError::UnknownTable { table }) if table == "hashes"
        ));

        registry.register(hashes(false).column("size", ColumnType::Integer));
        assert!(matches!(
            registry.insert(&record()),
            Err(LookalikeError::MissingColumn { column, .. }) if column == "size"
        ));
    }

    #[test]
    fn named_and_positional_binding() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();

        let rows = query_rows(&conn, "SELECT :a + 1 AS n", &Args::named([("a", 41i64)])).unwrap();
        assert_eq!(rows[0].get::<i64>("n").unwrap(), 42);
        let rows = query_rows(&conn, "SELECT :a AS n", &Args::named([(":a", 7i64)])).unwrap();
        assert_eq!(rows[0].get::<i64>("n").unwrap(), 7);
        let rows = query_rows(&conn, "SELECT :a + :a AS n", &Args::named([("a", 2i64)])).unwrap();
        assert_eq!(rows[0].get::<i64>("n").unwrap(), 4);
        let unknown = query_rows(&conn, "SELECT :a AS n", &Args::named([("b", 1i64)]));
        assert!(matches!(unknown, Err(rusqlite::Error::InvalidParameterName(name)) if name == ":b"));

        let rows = query_rows(
            &conn,
            "SELECT ?1 AS t, ?2 AS b",
            &Args::positional([Value::from("x"), Value::Blob(vec![1, 2])]),
        )
        .unwrap();
        assert_eq!(rows[0].get::<String>("t").unwrap(), "x");
        assert_eq!(rows[0].get::<Vec<u8>>("b").unwrap(), vec![1, 2]);

        let unbound = query_rows(&conn, "SELECT ?1 AS v", &Args::None);
        assert!(matches!(unbound, Err(rusqlite::Error::InvalidParameterCount(0, 1))));
        assert_eq!(query_rows(&conn, "SELECT 1 AS v", &Args::None).unwrap().len(), 1);
        let err = query_rows(&conn, "SELECT ?1", &Args::positional([1i64, 2]));
        assert!(matches!(err, Err(rusqlite::Error::InvalidParameterCount(2, 1))));
    }

    #[test]
    fn partially_bound_named_arguments_are_rejected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER, hash INTEGER); INSERT INTO t VALUES (1, 5);")
            .unwrap();

        let partial = query_rows(
            &conn,
            "SELECT COUNT(*) AS n FROM t WHERE id = :id AND hash = :hash",
            &Args::named([("id", 1i64)]),
        );
        assert!(matches!(partial, Err(rusqlite::Error::InvalidParameterName(name)) if name == ":hash"));

        let full = query_rows(
            &conn,
            "SELECT COUNT(*) AS n FROM t WHERE id = :id AND hash = :hash",
            &Args::named([("id", 1i64), ("hash", 5)]),
        )
        .unwrap();
        assert_eq!(full[0].get::<i64>("n").unwrap(), 1);

        let missing = execute(&conn, "DELETE FROM t WHERE hash = ?1", &Args::None);
        assert!(matches!(missing, Err(rusqlite::Error::InvalidParameterCount(0, 1))));
    }
}
