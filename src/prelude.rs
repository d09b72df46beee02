//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{
    ConnectionParams, ConnectionParamsBuilder, Credentials, INTEGRATED_AUTH_SUPPORTED,
};
pub use crate::error::{ErrorCategory, SqlHelperError};
pub use crate::helper::{DEFAULT_COMMAND_TIMEOUT, SqlHelper};
pub use crate::mssql::{
    RowCursor, XmlDocument, build_table_valued_function_sql, contains_xml_clause,
    qualify_routine_name,
};
pub use crate::results::DbRow;
pub use crate::types::{ParameterDirection, RowValues, SqlParameter, SqlType};
