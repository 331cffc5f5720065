use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, GenericClient};

use super::{Session, Statement};
use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;

type Param = Box<dyn ToSql + Sync + Send>;

/// A [`Session`] over one `tokio_postgres` connection.
///
/// Plain statements share the client and are pipelined. `atomic` takes the
/// client exclusively for the whole transaction: a connection carries one
/// transaction at a time, and a foreign statement sent in between would run
/// inside it.
pub struct PgSession {
    client: RwLock<Client>,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            client: RwLock::new(client),
        }
    }
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let client = self.client.read().await;
        let (stmt, params) = prepare(&*client, sql, params).await?;
        Ok(client.execute(&stmt, &as_refs(&params)).await?)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.read().await;
        run_query(&*client, sql, params).await
    }

    async fn atomic(&self, statements: &[Statement]) -> Result<QueryResult> {
        let mut client = self.client.write().await;
        let tx = client.transaction().await?;

        let mut last = QueryResult::empty();
        for statement in statements {
            last = run_query(&tx, &statement.sql, &statement.params).await?;
        }

        tx.commit().await?;
        Ok(last)
    }
}

async fn prepare<C: GenericClient + Sync>(
    client: &C,
    sql: &str,
    params: &[Value],
) -> Result<(tokio_postgres::Statement, Vec<Param>)> {
    let stmt = client.prepare(sql).await?;

    if stmt.params().len() != params.len() {
        return Err(DbError::TypeMismatch(format!(
            "Statement expects {} parameters, got {}",
            stmt.params().len(),
            params.len()
        )));
    }

    let bound = params
        .iter()
        .zip(stmt.params())
        .map(|(value, ty)| to_param(value, ty))
        .collect::<Result<Vec<_>>>()?;

    Ok((stmt, bound))
}

async fn run_query<C: GenericClient + Sync>(client: &C, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let (stmt, params) = prepare(client, sql, params).await?;
    let rows = client.query(&stmt, &as_refs(&params)).await?;

    let columns = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect::<Vec<_>>();

    let rows = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| decode(row, idx, col.type_()))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryResult::new(columns, rows))
}

fn as_refs(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect()
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

fn to_param(value: &Value, ty: &Type) -> Result<Param> {
    let mismatch = || {
        DbError::TypeMismatch(format!(
            "Cannot bind {} to parameter of type {}",
            value.type_name(),
            ty
        ))
    };

    match value {
        Value::Null => match *ty {
            Type::INT8 => Ok(Box::new(None::<i64>)),
            Type::INT4 => Ok(Box::new(None::<i32>)),
            Type::INT2 => Ok(Box::new(None::<i16>)),
            Type::BOOL => Ok(Box::new(None::<bool>)),
            _ if is_text(ty) => Ok(Box::new(None::<String>)),
            _ => Err(mismatch()),
        },
        Value::Integer(i) => match *ty {
            Type::INT8 => Ok(Box::new(*i)),
            Type::INT4 => i32::try_from(*i)
                .map(|v| Box::new(v) as Param)
                .map_err(|_| mismatch()),
            Type::INT2 => i16::try_from(*i)
                .map(|v| Box::new(v) as Param)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        Value::Text(s) if is_text(ty) => Ok(Box::new(s.clone())),
        Value::Boolean(b) if *ty == Type::BOOL => Ok(Box::new(*b)),
        _ => Err(mismatch()),
    }
}

fn decode(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value> {
    let value = match *ty {
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Integer(i64::from(v))),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Boolean),
        _ if is_text(ty) => row.try_get::<_, Option<String>>(idx)?.map(Value::Text),
        _ => {
            return Err(DbError::TypeMismatch(format!(
                "Unsupported column type {} at position {}",
                ty, idx
            )));
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
