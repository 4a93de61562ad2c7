use chrono::{DateTime, Utc};
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SelectResources { id: Option<String> },
    InsertResource(NewResource),
    UpdateResource { id: String, patch: ResourcePatch },
    DeleteResource { id: String },
    SelectBookings(BookingFilter),
    InsertBooking(NewBooking),
    CancelBooking { id: String },
    SelectUtilization,
}

const RESOURCE_COLUMNS: [&str; 7] = ["id", "name", "type", "capacity", "location", "description", "status"];
const BOOKING_COLUMNS: [&str; 8] = [
    "id",
    "resource_id",
    "user_id",
    "user_name",
    "user_role",
    "start_time",
    "end_time",
    "purpose",
];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(&table.relation, assignments, selection)
        }
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table named by the FROM clause of a plain `SELECT`, or `None` for any other
/// statement. Unbound `$n` placeholders parse fine here.
pub fn select_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    let Some(Statement::Query(query)) = stmts.first() else {
        return None;
    };
    match query.body.as_ref() {
        SetExpr::Select(select) => select
            .from
            .first()
            .and_then(|from| table_factor_name(&from.relation).ok()),
        _ => None,
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let positional: &[&str] = match table.as_str() {
        "resources" => &RESOURCE_COLUMNS,
        "bookings" => &BOOKING_COLUMNS,
        _ => return Err(SqlError::UnknownTable(table)),
    };

    let columns: Vec<String> = if insert.columns.is_empty() {
        positional.iter().take(values.len()).map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.clone()).collect()
    };
    if columns.len() != values.len() {
        return Err(SqlError::WrongArity(columns.len(), values.len()));
    }
    let pairs = columns.iter().map(String::as_str).zip(values.iter());

    if table == "resources" {
        let mut input = NewResource::default();
        for (column, expr) in pairs {
            match column_key(column).as_str() {
                "id" => input.id = text_or_empty(expr, column)?,
                "name" => input.name = text_or_empty(expr, column)?,
                "type" => input.kind = text_or_empty(expr, column)?,
                "capacity" => input.capacity = parse_capacity(expr)?,
                "location" => input.location = opt_text(expr, column)?,
                "description" => input.description = opt_text(expr, column)?,
                "status" => input.status = opt_text(expr, column)?,
                _ => return Err(SqlError::UnknownColumn(column.to_string())),
            }
        }
        Ok(Command::InsertResource(input))
    } else {
        let mut input = NewBooking::default();
        for (column, expr) in pairs {
            match column_key(column).as_str() {
                "id" => input.id = text_or_empty(expr, column)?,
                "resourceid" => input.resource_id = text_or_empty(expr, column)?,
                "userid" => input.user_id = text_or_empty(expr, column)?,
                "username" => input.user_name = opt_text(expr, column)?,
                "userrole" => input.user_role = opt_text(expr, column)?,
                "starttime" => input.start_time = opt_timestamp(expr, column)?,
                "endtime" => input.end_time = opt_timestamp(expr, column)?,
                "purpose" => input.purpose = opt_text(expr, column)?,
                _ => return Err(SqlError::UnknownColumn(column.to_string())),
            }
        }
        Ok(Command::InsertBooking(input))
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "resources" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut patch = ResourcePatch::default();
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => {
                object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))?
            }
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported("tuple assignment".into()));
            }
        };
        let expr = &assignment.value;
        match column_key(&column).as_str() {
            "name" => patch.name = patch_text(expr, &column)?,
            "type" => patch.kind = patch_text(expr, &column)?,
            "capacity" => patch.capacity = Some(parse_capacity(expr)?),
            "location" => patch.location = patch_text(expr, &column)?,
            "description" => patch.description = patch_text(expr, &column)?,
            "status" => patch.status = patch_text(expr, &column)?,
            "id" | "createdat" | "updatedat" => return Err(SqlError::ReadOnlyColumn(column)),
            _ => return Err(SqlError::UnknownColumn(column)),
        }
    }
    Ok(Command::UpdateResource { id, patch })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "resources" => Ok(Command::DeleteResource { id }),
        "bookings" => Ok(Command::CancelBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "resources" => {
            let mut id = None;
            for (column, value) in filters {
                match column_key(&column).as_str() {
                    "id" => id = Some(value),
                    _ => return Err(SqlError::UnsupportedFilter(column)),
                }
            }
            Ok(Command::SelectResources { id })
        }
        "bookings" => {
            let mut filter = BookingFilter::default();
            for (column, value) in filters {
                match column_key(&column).as_str() {
                    "id" => filter.id = Some(value),
                    "resourceid" => filter.resource_id = Some(value),
                    "status" => {
                        let status = BookingStatus::parse(&value)
                            .ok_or_else(|| SqlError::BadValue(column.clone(), value.clone()))?;
                        filter.status = Some(status);
                    }
                    _ => return Err(SqlError::UnsupportedFilter(column)),
                }
            }
            Ok(Command::SelectBookings(filter))
        }
        "utilization" => {
            if let Some((column, _)) = filters.into_iter().next() {
                return Err(SqlError::UnsupportedFilter(column));
            }
            Ok(Command::SelectUtilization)
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `col = 'v' AND col = 'v' ...` into (column, value) pairs.
fn collect_eq_filters(expr: &Expr, out: &mut Vec<(String, String)>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
            collect_eq_filters(left, out)?;
            collect_eq_filters(right, out)
        }
        Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            let value = literal_text(right)?
                .ok_or_else(|| SqlError::BadValue(column.clone(), "NULL".into()))?;
            out.push((column, value));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// `resource_id`, `resourceId` and `"resourceId"` all name the same column.
fn column_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<String, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    let mut filters = Vec::new();
    collect_eq_filters(sel, &mut filters)?;
    match filters.as_slice() {
        [(column, value)] if column_key(column) == "id" => Ok(value.clone()),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

/// Literal as text; `None` for NULL. Casts such as `'…'::timestamptz` are looked through.
fn literal_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Expr::Cast { expr, .. } = expr {
        return literal_text(expr);
    }
    if let Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } = expr {
        return Ok(literal_text(expr)?.map(|s| format!("-{s}")));
    }
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(Value::Boolean(b)) => Ok(Some(b.to_string())),
        Some(Value::Null) => Ok(None),
        Some(other) => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// Optional text column: NULL and blank strings both read as absent.
fn opt_text(expr: &Expr, column: &str) -> Result<Option<String>, SqlError> {
    literal_text(expr)
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .map_err(|e| SqlError::BadValue(column.to_string(), e.to_string()))
}

/// Assigned text in an UPDATE. Blank strings are kept so validation can reject
/// a blank name and a blank location can clear the field.
fn patch_text(expr: &Expr, column: &str) -> Result<Option<String>, SqlError> {
    literal_text(expr).map_err(|e| SqlError::BadValue(column.to_string(), e.to_string()))
}

/// Required text column; absence is reported later by validation.
fn text_or_empty(expr: &Expr, column: &str) -> Result<String, SqlError> {
    Ok(opt_text(expr, column)?.unwrap_or_default())
}

fn parse_capacity(expr: &Expr) -> Result<Option<u32>, SqlError> {
    match literal_text(expr)? {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| SqlError::BadValue("capacity".into(), s)),
    }
}

fn opt_timestamp(expr: &Expr, column: &str) -> Result<Option<Timestamp>, SqlError> {
    match opt_text(expr, column)? {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| SqlError::BadTimestamp(column.to_string(), s)),
    }
}

/// RFC 3339, normalized to UTC.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    ReadOnlyColumn(String),
    WrongArity(usize, usize),
    MissingFilter(&'static str),
    UnsupportedFilter(String),
    BadValue(String, String),
    BadTimestamp(String, String),
}

impl SqlError {
    /// SQLSTATE reported to the client.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            SqlError::UnknownTable(_) => "42P01",
            SqlError::UnknownColumn(_) | SqlError::UnsupportedFilter(_) => "42703",
            SqlError::BadValue(..) => "22P02",
            SqlError::BadTimestamp(..) => "22007",
            SqlError::Unsupported(_) | SqlError::ReadOnlyColumn(_) => "0A000",
            _ => "42601",
        }
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::ReadOnlyColumn(c) => write!(f, "column {c} cannot be updated"),
            SqlError::WrongArity(expected, got) => {
                write!(f, "expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::UnsupportedFilter(col) => write!(f, "cannot filter on {col}"),
            SqlError::BadValue(col, v) => write!(f, "bad value for {col}: {v}"),
            SqlError::BadTimestamp(col, v) => {
                write!(f, "bad timestamp for {col}: {v} (expected RFC 3339)")
            }
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn parse_insert_resource_full() {
        let sql = r#"INSERT INTO resources (id, name, "type", capacity, location, description, status)
                     VALUES ('room-101', 'Lecture Hall 101', 'room', 100, 'Main Building, Floor 1', 'Large hall', 'available')"#;
        match parse_sql(sql).unwrap() {
            Command::InsertResource(r) => {
                assert_eq!(r.id, "room-101");
                assert_eq!(r.name, "Lecture Hall 101");
                assert_eq!(r.kind, "room");
                assert_eq!(r.capacity, Some(100));
                assert_eq!(r.location.as_deref(), Some("Main Building, Floor 1"));
                assert_eq!(r.status.as_deref(), Some("available"));
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_resource_positional() {
        let sql = "INSERT INTO resources VALUES ('proj-001', 'HD Projector', 'equipment')";
        match parse_sql(sql).unwrap() {
            Command::InsertResource(r) => {
                assert_eq!(r.id, "proj-001");
                assert_eq!(r.kind, "equipment");
                assert_eq!(r.capacity, None);
                assert_eq!(r.location, None);
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_resource_null_capacity_and_blank_location() {
        let sql = r#"INSERT INTO resources (id, name, "type", capacity, location) VALUES ('b', 'Book', 'book', NULL, '')"#;
        match parse_sql(sql).unwrap() {
            Command::InsertResource(r) => {
                assert_eq!(r.capacity, None);
                assert_eq!(r.location, None);
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn negative_capacity_is_bad_value() {
        let sql = r#"INSERT INTO resources (id, name, "type", capacity) VALUES ('r', 'R', 'room', -1)"#;
        let err = parse_sql(sql).unwrap_err();
        assert!(matches!(err, SqlError::BadValue(..)), "{err}");
        assert_eq!(err.sqlstate(), "22P02");
    }

    #[test]
    fn parse_insert_booking_camel_and_snake_columns() {
        let sql = r#"INSERT INTO bookings (id, "resourceId", user_id, user_name, start_time, end_time, purpose)
                     VALUES ('b1', 'room-101', 'u1', 'Ada', '2025-01-01T09:00:00Z', '2025-01-01T10:00:00+01:00', 'Lecture')"#;
        match parse_sql(sql).unwrap() {
            Command::InsertBooking(b) => {
                assert_eq!(b.resource_id, "room-101");
                assert_eq!(b.user_name.as_deref(), Some("Ada"));
                assert_eq!(b.user_role, None);
                assert_eq!(b.start_time, Some(ts("2025-01-01T09:00:00Z")));
                // offsets are normalized to UTC
                assert_eq!(b.end_time, Some(ts("2025-01-01T09:00:00Z")));
                assert_eq!(b.purpose.as_deref(), Some("Lecture"));
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn booking_with_cast_timestamp() {
        let sql = "INSERT INTO bookings (id, resource_id, user_id, start_time, end_time) \
                   VALUES ('b1', 'r', 'u', '2025-01-01T09:00:00Z'::timestamptz, '2025-01-01T10:00:00Z'::timestamptz)";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking(b) => assert_eq!(b.start_time, Some(ts("2025-01-01T09:00:00Z"))),
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let sql = "INSERT INTO bookings (id, resource_id, user_id, start_time, end_time) \
                   VALUES ('b1', 'r', 'u', 'tomorrow', '2025-01-01T10:00:00Z')";
        let err = parse_sql(sql).unwrap_err();
        assert!(matches!(err, SqlError::BadTimestamp(..)));
        assert_eq!(err.sqlstate(), "22007");
    }

    #[test]
    fn missing_times_are_left_to_validation() {
        let sql = "INSERT INTO bookings (id, resource_id, user_id) VALUES ('b1', 'r', 'u')";
        match parse_sql(sql).unwrap() {
            Command::InsertBooking(b) => {
                assert_eq!(b.start_time, None);
                assert_eq!(b.end_time, None);
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn column_count_mismatch() {
        let sql = "INSERT INTO resources (id, name) VALUES ('r')";
        assert!(matches!(parse_sql(sql), Err(SqlError::WrongArity(2, 1))));
    }

    #[test]
    fn unknown_column_errors() {
        let sql = "INSERT INTO resources (id, colour) VALUES ('r', 'red')";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn(c)) if c == "colour"));
    }

    #[test]
    fn multi_row_insert_is_unsupported() {
        let sql = "INSERT INTO resources (id) VALUES ('a'), ('b')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_update_resource() {
        let sql = "UPDATE resources SET name = 'Hall A', capacity = NULL, status = 'maintenance' WHERE id = 'room-101'";
        match parse_sql(sql).unwrap() {
            Command::UpdateResource { id, patch } => {
                assert_eq!(id, "room-101");
                assert_eq!(patch.name.as_deref(), Some("Hall A"));
                assert_eq!(patch.capacity, Some(None));
                assert_eq!(patch.status.as_deref(), Some("maintenance"));
                assert_eq!(patch.kind, None);
                assert_eq!(patch.location, None);
            }
            cmd => panic!("expected UpdateResource, got {cmd:?}"),
        }
    }

    #[test]
    fn update_keeps_blank_strings() {
        let sql = "UPDATE resources SET name = '', location = '' WHERE id = 'room-101'";
        match parse_sql(sql).unwrap() {
            Command::UpdateResource { patch, .. } => {
                assert_eq!(patch.name.as_deref(), Some(""));
                assert_eq!(patch.location.as_deref(), Some(""));
                assert!(!patch.is_empty());
            }
            cmd => panic!("expected UpdateResource, got {cmd:?}"),
        }
    }

    #[test]
    fn select_table_reads_the_from_clause() {
        assert_eq!(
            select_table("SELECT * FROM resources WHERE id = 'bookings-hall'").as_deref(),
            Some("resources")
        );
        assert_eq!(
            select_table("select * from Bookings where resource_id = $1").as_deref(),
            Some("bookings")
        );
        assert_eq!(select_table("DELETE FROM bookings WHERE id = $1"), None);
        assert_eq!(select_table("SELECT 1"), None);
        assert_eq!(select_table("not sql"), None);
    }

    #[test]
    fn update_requires_id_filter() {
        let sql = "UPDATE resources SET name = 'x'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn update_of_id_is_rejected() {
        let sql = "UPDATE resources SET id = 'other' WHERE id = 'room-101'";
        assert!(matches!(parse_sql(sql), Err(SqlError::ReadOnlyColumn(_))));
    }

    #[test]
    fn parse_deletes() {
        assert_eq!(
            parse_sql("DELETE FROM resources WHERE id = 'room-101'").unwrap(),
            Command::DeleteResource { id: "room-101".into() }
        );
        assert_eq!(
            parse_sql("DELETE FROM bookings WHERE id = 'b1'").unwrap(),
            Command::CancelBooking { id: "b1".into() }
        );
    }

    #[test]
    fn delete_without_id_errors() {
        assert!(matches!(
            parse_sql("DELETE FROM bookings WHERE resource_id = 'r'"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_selects() {
        assert_eq!(
            parse_sql("SELECT * FROM resources").unwrap(),
            Command::SelectResources { id: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM resources WHERE id = 'room-101'").unwrap(),
            Command::SelectResources { id: Some("room-101".into()) }
        );
        assert_eq!(parse_sql("SELECT * FROM utilization").unwrap(), Command::SelectUtilization);
    }

    #[test]
    fn parse_select_bookings_with_filters() {
        let sql = "SELECT * FROM bookings WHERE resource_id = 'room-101' AND status = 'confirmed'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectBookings(BookingFilter {
                id: None,
                resource_id: Some("room-101".into()),
                status: Some(BookingStatus::Confirmed),
            })
        );
    }

    #[test]
    fn bad_status_filter() {
        let sql = "SELECT * FROM bookings WHERE status = 'pending'";
        assert!(matches!(parse_sql(sql), Err(SqlError::BadValue(..))));
    }

    #[test]
    fn range_filters_are_unsupported() {
        let sql = "SELECT * FROM bookings WHERE start_time > '2025-01-01T00:00:00Z'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let err = parse_sql("SELECT * FROM users").unwrap_err();
        assert!(matches!(err, SqlError::UnknownTable(_)));
        assert_eq!(err.sqlstate(), "42P01");
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }

    #[test]
    fn garbage_is_a_syntax_error() {
        let err = parse_sql("BOOK ME A ROOM").unwrap_err();
        assert_eq!(err.sqlstate(), "42601");
    }
}
