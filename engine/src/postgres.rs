use crate::query::{Connector, Session};
use async_trait::async_trait;
use model::{BoxedError, ConnectionDescriptor};
use sqlx::{Connection, PgConnection};

/// Opens one dedicated PostgreSQL connection per work item execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<PgSession, BoxedError> {
        let conn = PgConnection::connect(descriptor.as_str()).await?;
        Ok(PgSession { conn })
    }
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, statement: &str) -> Result<(), BoxedError> {
        // Statements are opaque text; run them unprepared so any SQL is accepted.
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(statement)).await?;
        Ok(())
    }

    async fn close(self) -> Result<(), BoxedError> {
        self.conn.close().await?;
        Ok(())
    }
}
