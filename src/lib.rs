//! Blocking convenience helpers for SQL Server over [`tiberius`].
//!
//! [`SqlHelper`] opens one connection per call, forwards parameters into ad-hoc SQL, stored
//! procedures, scalar functions and table-valued functions, and hands a forward-only
//! [`RowCursor`] to caller-supplied callbacks. Pooling, retries and batching are left to the
//! driver.

pub mod config;
pub mod error;
pub mod helper;
pub mod mssql;
pub mod prelude;
pub mod results;
pub mod types;

pub use config::{
    ConnectionParams, ConnectionParamsBuilder, Credentials, INTEGRATED_AUTH_SUPPORTED,
};
pub use error::{ErrorCategory, SqlHelperError};
pub use helper::{DEFAULT_COMMAND_TIMEOUT, SqlHelper};
pub use mssql::{RowCursor, XmlDocument};
pub use results::DbRow;
pub use types::{ParameterDirection, RETURN_VALUE_NAME, RowValues, SqlParameter, SqlType};
