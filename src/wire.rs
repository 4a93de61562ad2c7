use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::SecondsFormat;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::ResbookAuthSource;
use crate::engine::{Engine, EngineError, ErrorKind};
use crate::model::*;
use crate::observability::{self, command_label};
use crate::sql::{self, Command, SqlError};

pub struct ResbookHandler {
    engine: Arc<Engine>,
    query_parser: Arc<ResbookQueryParser>,
}

impl ResbookHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(ResbookQueryParser),
        }
    }

    /// Parse, execute and record RED metrics for one statement.
    async fn run(&self, query: &str) -> PgWireResult<Response> {
        let cmd = match sql::parse_sql(query) {
            Ok(cmd) => cmd,
            Err(e) => {
                metrics::counter!(observability::QUERIES_TOTAL, "command" => "invalid", "status" => "error")
                    .increment(1);
                tracing::debug!("rejected statement: {e}");
                return Err(sql_err(e));
            }
        };

        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::SelectResources { id } => {
                let resources = match id {
                    Some(id) => vec![engine.get_resource(&id).await.map_err(engine_err)?],
                    None => engine.list_resources().await.map_err(engine_err)?,
                };
                let schema = Arc::new(resource_schema());
                let rows: Vec<PgWireResult<_>> = resources
                    .iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id)?;
                        encoder.encode_field(&r.name)?;
                        encoder.encode_field(&r.kind)?;
                        encoder.encode_field(&r.capacity.map(i64::from))?;
                        encoder.encode_field(&r.location)?;
                        encoder.encode_field(&r.description)?;
                        encoder.encode_field(&r.status)?;
                        encoder.encode_field(&format_ts(&r.created_at))?;
                        encoder.encode_field(&format_ts(&r.updated_at))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::InsertResource(input) => {
                engine.create_resource(input).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::UpdateResource { id, patch } => {
                engine.update_resource(&id, patch).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::DeleteResource { id } => {
                engine.delete_resource(&id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectBookings(filter) => {
                let bookings = engine.list_bookings().await.map_err(engine_err)?;
                let schema = Arc::new(booking_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .iter()
                    .filter(|b| filter.matches(b))
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id)?;
                        encoder.encode_field(&b.resource_id)?;
                        encoder.encode_field(&b.user_id)?;
                        encoder.encode_field(&b.user_name)?;
                        encoder.encode_field(&b.user_role)?;
                        encoder.encode_field(&format_ts(&b.start_time))?;
                        encoder.encode_field(&format_ts(&b.end_time))?;
                        encoder.encode_field(&b.purpose)?;
                        encoder.encode_field(&b.status.to_string())?;
                        encoder.encode_field(&format_ts(&b.created_at))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::InsertBooking(input) => {
                engine.create_booking(input).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::CancelBooking { id } => {
                engine.cancel_booking(&id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectUtilization => {
                let records = engine.compute_utilization().await.map_err(engine_err)?;
                let schema = Arc::new(utilization_schema());
                let rows: Vec<PgWireResult<_>> = records
                    .iter()
                    .map(|u| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&u.kind)?;
                        encoder.encode_field(&(u.total_resources as i64))?;
                        encoder.encode_field(&(u.total_bookings as i64))?;
                        encoder.encode_field(&u.total_hours)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }
}

fn format_ts(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn resource_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("name"),
        text_field("type"),
        FieldInfo::new("capacity".into(), None, None, Type::INT8, FieldFormat::Text),
        text_field("location"),
        text_field("description"),
        text_field("status"),
        text_field("created_at"),
        text_field("updated_at"),
    ]
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("resource_id"),
        text_field("user_id"),
        text_field("user_name"),
        text_field("user_role"),
        text_field("start_time"),
        text_field("end_time"),
        text_field("purpose"),
        text_field("status"),
        text_field("created_at"),
    ]
}

fn utilization_schema() -> Vec<FieldInfo> {
    vec![
        text_field("type"),
        FieldInfo::new("total_resources".into(), None, None, Type::INT8, FieldFormat::Text),
        FieldInfo::new("total_bookings".into(), None, None, Type::INT8, FieldFormat::Text),
        FieldInfo::new("total_hours".into(), None, None, Type::FLOAT8, FieldFormat::Text),
    ]
}

/// Row shape of a statement, judged from its parsed FROM clause so `$n`
/// placeholders need no binding.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    match sql::select_table(sql).as_deref() {
        Some("resources") => resource_schema(),
        Some("bookings") => booking_schema(),
        Some("utilization") => utilization_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for ResbookHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct ResbookQueryParser;

#[async_trait]
impl QueryParser for ResbookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for ResbookHandler {
    type Statement = String;
    type QueryParser = ResbookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = bind_params(&portal.statement.statement, &portal.parameters[..]);
        self.run(&sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
/// Index one past a quoted run starting at `start`. A doubled quote is an
/// escaped quote, not a terminator.
fn quoted_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Walk `sql`, calling `on_param` with the byte range and number of every
/// `$n` outside quoted text.
fn scan_params(sql: &str, mut on_param: impl FnMut(Range<usize>, usize)) {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = quoted_end(bytes, i),
            b'$' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    on_param(start..i, n);
                }
            }
            _ => i += 1,
        }
    }
}

fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    scan_params(sql, |_, n| max = max.max(n));
    max
}

/// Replace `$1`, `$2`, ... with bound text values in one left-to-right pass.
/// Bound values become quoted literals and are never rescanned.
fn bind_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    scan_params(sql, |range, n| {
        let Some(param) = n.checked_sub(1).and_then(|idx| params.get(idx)) else {
            return;
        };
        out.push_str(&sql[copied..range.start]);
        match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        copied = range.end;
    });
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct ResbookFactory {
    handler: Arc<ResbookHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<ResbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl ResbookFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = ResbookAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(ResbookHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for ResbookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(ResbookFactory::new(engine, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_sqlstate(e: &EngineError) -> &'static str {
    match (e, e.kind()) {
        (EngineError::AlreadyExists { .. }, _) => "23505",
        (_, ErrorKind::Conflict) => "23P01",
        (_, ErrorKind::Validation) => "22023",
        (_, ErrorKind::NotFound) => "02000",
        (_, ErrorKind::Storage) => "58000",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    if e.kind() == ErrorKind::Storage {
        tracing::error!("storage failure: {e}");
    }
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        engine_sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM resources"), 0);
        assert_eq!(count_params("SELECT * FROM bookings WHERE resource_id = $1 AND status = $2"), 2);
        assert_eq!(count_params("UPDATE resources SET name = $2 WHERE id = $10"), 10);
        assert_eq!(count_params("SELECT * FROM resources WHERE id = 'cost $3'"), 0);
    }

    #[test]
    fn bound_values_are_not_rescanned() {
        let sql = "UPDATE resources SET name = $1, description = $2 WHERE id = $3";
        let params = [Some("costs $2"), Some("it's $3 'quoted'"), Some("room-1")];
        assert_eq!(
            bind_params(sql, &params),
            "UPDATE resources SET name = 'costs $2', description = 'it''s $3 ''quoted''' WHERE id = 'room-1'"
        );
    }

    #[test]
    fn binding_skips_literals_and_handles_two_digit_indexes() {
        let mut params: Vec<Option<String>> = (1..=10).map(|i| Some(format!("v{i}"))).collect();
        params[1] = None;
        let sql = "SELECT * FROM bookings WHERE id = $10 AND purpose = '$1' AND resource_id = $2";
        assert_eq!(
            bind_params(sql, &params),
            "SELECT * FROM bookings WHERE id = 'v10' AND purpose = '$1' AND resource_id = NULL"
        );
        assert_eq!(bind_params("SELECT $4", &[Some("a")]), "SELECT $4");
    }

    #[test]
    fn schema_follows_target_table() {
        assert_eq!(result_schema("select * from resources where id = $1").len(), 9);
        assert_eq!(result_schema("SELECT * FROM bookings WHERE resource_id = $1").len(), 10);
        assert_eq!(result_schema("SELECT * FROM utilization").len(), 4);
        assert!(result_schema("DELETE FROM bookings WHERE id = $1").is_empty());
        assert_eq!(result_schema("SELECT * FROM resources WHERE id = 'bookings-hall'").len(), 9);
        assert_eq!(result_schema("SELECT * FROM bookings WHERE purpose = 'utilization review'").len(), 10);
    }

    #[test]
    fn error_codes_by_kind() {
        let code = |e: EngineError| engine_sqlstate(&e);
        assert_eq!(code(EngineError::MissingField("name")), "22023");
        assert_eq!(code(EngineError::resource_not_found("x")), "02000");
        assert_eq!(code(EngineError::AlreadyExists { entity: "resource", id: "x".into() }), "23505");
        assert_eq!(code(EngineError::Conflict(vec![])), "23P01");
        assert_eq!(
            code(EngineError::Storage(crate::store::StoreError::Timeout(std::time::Duration::from_secs(1)))),
            "58000"
        );
    }

    #[test]
    fn timestamps_render_as_utc_millis() {
        let ts = sql::parse_timestamp("2025-03-01T09:30:00+02:00").unwrap();
        assert_eq!(format_ts(&ts), "2025-03-01T07:30:00.000Z");
    }
}
