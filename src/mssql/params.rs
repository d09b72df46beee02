use tiberius::Query;

use crate::types::RowValues;

/// Bind parameters to the query as `@P1`, `@P2`, … in slice order.
///
/// Timestamps are bound as `datetime2` so the declared type on the server side decides the
/// final precision.
pub fn bind_query_params<'a>(query: &mut Query<'a>, params: &[RowValues]) {
    for param in params {
        match param {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.clone()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(dt) => query.bind(*dt),
            RowValues::Null => query.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes.clone()),
        }
    }
}
