// query_engine/src/sql/backend.rs
//! Postgres execution of compiled statements via tokio-postgres.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error};
use models::{GraphError, GraphResult};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls};

use crate::backend::{QueryBackend, Row};
use crate::config::BackendConfig;
use crate::embedding::Embedder;
use crate::query::Query;
use crate::sql::compiler::{SqlCompiler, SqlStatement, SqlValue};

pub struct SqlBackend {
    client: Arc<Mutex<Client>>,
    compiler: SqlCompiler,
    embedder: Arc<dyn Embedder>,
}

impl SqlBackend {
    /// Open the connection and spawn its driver task.
    pub async fn connect(
        config: &BackendConfig,
        embedder: Arc<dyn Embedder>,
    ) -> GraphResult<Self> {
        let (client, connection) = tokio_postgres::connect(&config.connection_string, NoTls)
            .await
            .map_err(|e| GraphError::ConnectionError(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {e}");
            }
        });
        Ok(SqlBackend {
            client: Arc::new(Mutex::new(client)),
            compiler: SqlCompiler::new(config.embedding_dim),
            embedder,
        })
    }

    async fn compile(&self, query: &Query) -> GraphResult<SqlStatement> {
        if let Some(search) = &query.vector_search {
            let vector = match (&search.vector, &search.text) {
                (Some(vector), _) => vector.clone(),
                (None, Some(text)) => self.embedder.embed(text).await?,
                // Unreachable after Query::validate, but keep the error honest.
                (None, None) => {
                    return Err(GraphError::InvalidQuery(
                        "vector_search requires either text or vector".to_string(),
                    ))
                }
            };
            return self
                .compiler
                .compile_vector_search(&vector, search, query.return_fields.as_deref());
        }
        self.compiler.compile(query)
    }
}

#[async_trait]
impl QueryBackend for SqlBackend {
    fn name(&self) -> &'static str {
        "sql"
    }

    async fn execute(&self, query: &Query) -> GraphResult<Vec<Row>> {
        let statement = self.compile(query).await?;
        debug!("executing: {}", statement.sql);

        let params: Vec<&(dyn ToSql + Sync)> =
            statement.params.iter().map(SqlValue::as_param).collect();
        let client = self.client.lock().await;
        let rows = client
            .query(statement.sql.as_str(), &params)
            .await
            .map_err(|e| GraphError::StorageError(e.to_string()))?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

impl SqlValue {
    fn as_param(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlValue::Text(v) => v,
            SqlValue::Float(v) => v,
            SqlValue::Int(v) => v,
            SqlValue::Bool(v) => v,
            SqlValue::TextArray(v) => v,
            SqlValue::FloatArray(v) => v,
        }
    }
}

/// Convert a wire row into the JSON row shape, by declared column type.
/// Unhandled types come back as null rather than failing the query.
fn row_to_json(row: &tokio_postgres::Row) -> Row {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::TEXT || *ty == Type::VARCHAR {
            json_opt(row.try_get::<_, Option<String>>(i))
        } else if *ty == Type::FLOAT8 {
            json_opt(row.try_get::<_, Option<f64>>(i))
        } else if *ty == Type::FLOAT4 {
            json_opt(row.try_get::<_, Option<f32>>(i))
        } else if *ty == Type::INT8 {
            json_opt(row.try_get::<_, Option<i64>>(i))
        } else if *ty == Type::INT4 {
            json_opt(row.try_get::<_, Option<i32>>(i))
        } else if *ty == Type::INT2 {
            json_opt(row.try_get::<_, Option<i16>>(i))
        } else if *ty == Type::BOOL {
            json_opt(row.try_get::<_, Option<bool>>(i))
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            json_opt(row.try_get::<_, Option<Value>>(i))
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            json_opt(row.try_get::<_, Option<Vec<String>>>(i))
        } else {
            debug!(
                "column {} has untranslated type {}, emitting null",
                column.name(),
                ty
            );
            Value::Null
        };
        out.insert(column.name().to_string(), value);
    }
    out
}

fn json_opt<T: serde::Serialize>(value: Result<Option<T>, tokio_postgres::Error>) -> Value {
    match value {
        Ok(Some(v)) => serde_json::to_value(v).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
