//! The blocking call surface.
//!
//! Every operation opens its own connection, runs exactly one command and closes the
//! connection before returning. Driver futures run on a current-thread tokio runtime owned by
//! the helper, so these methods must not be called from inside another async runtime.

use tiberius::{Query, Row};
use tokio::runtime::{Builder, Runtime};

use crate::config::{
    ConnectionParams, Credentials, INTEGRATED_AUTH_SUPPORTED, redact_connection_string,
};
use crate::error::{ErrorCategory, OperationContext, SqlHelperError};
use crate::mssql::client::{self, command_limit, connect_limit, within};
use crate::mssql::params::bind_query_params;
use crate::mssql::query::{RowCursor, cell_value};
use crate::mssql::script::{self, Script};
use crate::mssql::tvf::build_table_valued_function_sql;
use crate::mssql::xml::{self, XmlDocument, contains_xml_clause};
use crate::types::{RowValues, SqlParameter, SqlType};

/// Default command timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT: u32 = 30;

/// One-connection-per-call helper bound to a single SQL Server catalog.
///
/// ```rust,no_run
/// use mssql_helper::prelude::*;
///
/// # fn main() -> Result<(), SqlHelperError> {
/// let helper = SqlHelper::new(ConnectionParams::sql_login("db01", "sales", "app", "pw"))?;
/// let names = helper.run_query(
///     "select name from customers where region = @Param1",
///     &["west"],
///     |cursor| {
///         let mut names = Vec::new();
///         while let Some(row) = cursor.next_record()? {
///             if let Some(name) = row.get("name").and_then(RowValues::as_text) {
///                 names.push(name.to_string());
///             }
///         }
///         Ok(names)
///     },
/// )?;
/// # let _ = names;
/// # Ok(())
/// # }
/// ```
pub struct SqlHelper {
    params: ConnectionParams,
    connection_string: String,
    is_valid: bool,
    command_timeout: u32,
    runtime: Runtime,
}

impl std::fmt::Debug for SqlHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlHelper")
            .field(
                "connection_string",
                &redact_connection_string(&self.connection_string),
            )
            .field("is_valid", &self.is_valid)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl SqlHelper {
    /// Build the connection string and validate it with a probe connection.
    ///
    /// # Errors
    /// Returns a `Connection`-category error carrying the connection string when the runtime
    /// cannot be created or the probe connection fails.
    pub fn new(params: ConnectionParams) -> Result<Self, SqlHelperError> {
        let connection_string = params.connection_string();
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                SqlHelperError::wrap(
                    ErrorCategory::Connection,
                    "CreateRuntime",
                    &connection_string,
                    e,
                )
            })?;
        let mut helper = Self {
            params,
            connection_string,
            is_valid: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            runtime,
        };
        helper.validate()?;
        Ok(helper)
    }

    #[must_use]
    pub fn connection_params(&self) -> &ConnectionParams {
        &self.params
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Result of the last probe. Not re-verified by later calls.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[must_use]
    pub fn command_timeout(&self) -> u32 {
        self.command_timeout
    }

    /// Default timeout, in seconds, for ad-hoc SQL. `0` waits indefinitely.
    pub fn set_command_timeout(&mut self, seconds: u32) {
        self.command_timeout = seconds;
    }

    /// Replace all connection parameters and re-validate.
    ///
    /// # Errors
    /// Returns a `Connection`-category error when the probe fails; the helper then stays
    /// invalid and every later call fails fast.
    pub fn set_connection_params(&mut self, params: ConnectionParams) -> Result<(), SqlHelperError> {
        self.params = params;
        self.connection_string = self.params.connection_string();
        self.validate()
    }

    /// # Errors
    /// See [`SqlHelper::set_connection_params`].
    pub fn set_data_source(&mut self, data_source: impl Into<String>) -> Result<(), SqlHelperError> {
        let mut params = self.params.clone();
        params.data_source = data_source.into();
        self.set_connection_params(params)
    }

    /// # Errors
    /// See [`SqlHelper::set_connection_params`].
    pub fn set_catalog(&mut self, catalog: impl Into<String>) -> Result<(), SqlHelperError> {
        let mut params = self.params.clone();
        params.catalog = catalog.into();
        self.set_connection_params(params)
    }

    /// Switch to SQL login authentication.
    ///
    /// # Errors
    /// See [`SqlHelper::set_connection_params`].
    pub fn set_credentials(
        &mut self,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), SqlHelperError> {
        let mut params = self.params.clone();
        params.credentials = Some(Credentials::new(user_id, password));
        params.integrated_security = false;
        self.set_connection_params(params)
    }

    /// # Errors
    /// See [`SqlHelper::set_connection_params`].
    pub fn set_integrated_security(&mut self, integrated: bool) -> Result<(), SqlHelperError> {
        let mut params = self.params.clone();
        params.integrated_security = integrated;
        self.set_connection_params(params)
    }

    fn validate(&mut self) -> Result<(), SqlHelperError> {
        self.is_valid = false;
        if self.params.integrated_security && !INTEGRATED_AUTH_SUPPORTED {
            tracing::warn!(
                connection = %redact_connection_string(&self.connection_string),
                "integrated security is not available in this build"
            );
            return Err(SqlHelperError::connection(
                "ValidateConnection failed: integrated security needs Windows or the \
                 `integrated-auth-gssapi` feature on this platform",
                &self.connection_string,
            ));
        }
        let probe = client::probe(&self.connection_string, self.params.connect_timeout);
        match self.runtime.block_on(probe) {
            Ok(()) => {
                tracing::debug!(
                    connection = %redact_connection_string(&self.connection_string),
                    "connection validated"
                );
                self.is_valid = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    connection = %redact_connection_string(&self.connection_string),
                    error = %e,
                    "connection validation failed"
                );
                Err(SqlHelperError::wrap(
                    ErrorCategory::Connection,
                    "ValidateConnection",
                    &self.connection_string,
                    e,
                ))
            }
        }
    }

    fn context(&self, operation: &'static str, category: ErrorCategory) -> OperationContext<'_> {
        OperationContext::new(operation, category, &self.connection_string)
    }

    fn ensure_valid(&self, context: &OperationContext<'_>) -> Result<(), SqlHelperError> {
        if self.is_valid {
            return Ok(());
        }
        Err(SqlHelperError::connection(
            format!(
                "{} failed: connection is not valid; set valid connection parameters first",
                context.operation
            ),
            &self.connection_string,
        ))
    }

    /// Run `script` as a query, hand its cursor to `callback`, then close the connection.
    ///
    /// Returns the callback's value and the hidden output-value row, if the script has one.
    fn stream_script<R, F>(
        &self,
        context: OperationContext<'_>,
        script: &Script,
        timeout_secs: u32,
        callback: F,
    ) -> Result<(R, Option<Row>), SqlHelperError>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        let limit = command_limit(timeout_secs);
        tracing::debug!(operation = context.operation, "opening connection");
        let mut client = self
            .runtime
            .block_on(within(
                connect_limit(self.params.connect_timeout),
                client::create_mssql_client(&self.connection_string),
            ))
            .map_err(|e| context.fail(e))?;

        let outcome = {
            let mut query = Query::new(script.sql.as_str());
            bind_query_params(&mut query, &script.bound);
            tracing::debug!(operation = context.operation, sql = %script.sql, "executing");
            let stream = self
                .runtime
                .block_on(within(limit, query.query(&mut client)))
                .map_err(|e| context.fail(e))?;
            let mut cursor = RowCursor::new(&self.runtime, stream, limit, context);
            let value = callback(&mut cursor)?;
            let outputs = cursor.finish()?;
            (value, outputs)
        };

        self.runtime
            .block_on(client.close())
            .map_err(|e| context.fail(e))?;
        tracing::debug!(operation = context.operation, "connection closed");
        Ok(outcome)
    }

    /// Run `script` as a non-query and return the affected row count.
    fn execute_script(
        &self,
        context: OperationContext<'_>,
        script: &Script,
        timeout_secs: u32,
    ) -> Result<u64, SqlHelperError> {
        let limit = command_limit(timeout_secs);
        tracing::debug!(operation = context.operation, "opening connection");
        let mut client = self
            .runtime
            .block_on(within(
                connect_limit(self.params.connect_timeout),
                client::create_mssql_client(&self.connection_string),
            ))
            .map_err(|e| context.fail(e))?;

        let mut query = Query::new(script.sql.as_str());
        bind_query_params(&mut query, &script.bound);
        tracing::debug!(operation = context.operation, sql = %script.sql, "executing");
        let result = self
            .runtime
            .block_on(within(limit, query.execute(&mut client)))
            .map_err(|e| context.fail(e))?;
        let rows_affected: u64 = result.rows_affected().iter().sum();

        self.runtime
            .block_on(client.close())
            .map_err(|e| context.fail(e))?;
        tracing::debug!(operation = context.operation, rows_affected, "connection closed");
        Ok(rows_affected)
    }

    /// Run ad-hoc SQL with the default command timeout.
    ///
    /// Positional values are available to the SQL text as `@Param1`, `@Param2`, … (declared
    /// `NVarChar(max)`).
    ///
    /// # Errors
    /// Fails fast with a `Connection` error when the helper is invalid; driver failures are
    /// `Sql` errors. Errors returned by `callback` pass through unchanged.
    pub fn run_query<S, R, F>(&self, sql: &str, params: &[S], callback: F) -> Result<R, SqlHelperError>
    where
        S: AsRef<str>,
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        self.run_query_with_timeout(sql, params, self.command_timeout, callback)
    }

    /// [`SqlHelper::run_query`] with an explicit timeout in seconds.
    ///
    /// # Errors
    /// See [`SqlHelper::run_query`].
    pub fn run_query_with_timeout<S, R, F>(
        &self,
        sql: &str,
        params: &[S],
        timeout_secs: u32,
        callback: F,
    ) -> Result<R, SqlHelperError>
    where
        S: AsRef<str>,
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        let context = self.context("RunQuery", ErrorCategory::Sql);
        self.ensure_valid(&context)?;
        let script = script::declared_statement(sql, &script::positional_params(params));
        let (value, _) = self.stream_script(context, &script, timeout_secs, callback)?;
        Ok(value)
    }

    /// Run a `FOR XML` query and parse its output.
    ///
    /// Returns `None` when the server produces no output.
    ///
    /// # Errors
    /// Rejects SQL without a `FOR XML` clause before anything else, including the validity
    /// check. Otherwise as [`SqlHelper::run_query`], plus parse failures as `Sql` errors.
    pub fn run_query_xml<S>(&self, sql: &str, params: &[S]) -> Result<Option<XmlDocument>, SqlHelperError>
    where
        S: AsRef<str>,
    {
        let context = self.context("RunQueryXml", ErrorCategory::Sql);
        if !contains_xml_clause(sql) {
            return Err(context.reject("SQL text must contain a FOR XML clause"));
        }
        self.ensure_valid(&context)?;
        let script = script::declared_statement(sql, &script::positional_params(params));
        let (doc, _) = self.stream_script(context, &script, self.command_timeout, xml::read_document)?;
        Ok(doc)
    }

    /// Execute an `INSERT` with typed parameters; returns the affected row count.
    ///
    /// Each parameter is declared under its own name, so the SQL text refers to them as
    /// `@Name`.
    ///
    /// # Errors
    /// Fails fast with a `Connection` error when invalid; driver failures are `Sql` errors.
    pub fn run_insert(&self, sql: &str, params: &[SqlParameter]) -> Result<u64, SqlHelperError> {
        self.run_statement("RunInsert", sql, params)
    }

    /// Execute an `UPDATE` with typed parameters; returns the affected row count.
    ///
    /// # Errors
    /// See [`SqlHelper::run_insert`].
    pub fn run_update(&self, sql: &str, params: &[SqlParameter]) -> Result<u64, SqlHelperError> {
        self.run_statement("RunUpdate", sql, params)
    }

    fn run_statement(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[SqlParameter],
    ) -> Result<u64, SqlHelperError> {
        let context = self.context(operation, ErrorCategory::Sql);
        self.ensure_valid(&context)?;
        let script = script::declared_statement(sql, params);
        self.execute_script(context, &script, self.command_timeout)
    }

    /// Call a stored procedure and stream its result sets through `callback`.
    ///
    /// Output, input/output and return-value parameters hold the server's values once this
    /// returns `Ok`.
    ///
    /// # Errors
    /// Fails fast with a `Connection` error when invalid; other failures are
    /// `StoredProcedure` errors. Errors returned by `callback` pass through unchanged.
    pub fn run_procedure<R, F>(
        &self,
        schema: &str,
        procedure: &str,
        timeout_secs: u32,
        params: &mut [SqlParameter],
        callback: F,
    ) -> Result<R, SqlHelperError>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        self.call_routine("RunProcedure", schema, procedure, timeout_secs, params, callback)
    }

    /// Call a stored procedure whose output is a `FOR XML` document.
    ///
    /// # Errors
    /// See [`SqlHelper::run_procedure`]; parse failures are `StoredProcedure` errors.
    pub fn run_procedure_xml(
        &self,
        schema: &str,
        procedure: &str,
        timeout_secs: u32,
        params: &mut [SqlParameter],
    ) -> Result<Option<XmlDocument>, SqlHelperError> {
        self.call_routine(
            "RunProcedureXml",
            schema,
            procedure,
            timeout_secs,
            params,
            xml::read_document,
        )
    }

    /// Call a stored procedure, discarding any rows it returns.
    ///
    /// # Errors
    /// See [`SqlHelper::run_procedure`].
    pub fn run_procedure_non_query(
        &self,
        schema: &str,
        procedure: &str,
        timeout_secs: u32,
        params: &mut [SqlParameter],
    ) -> Result<(), SqlHelperError> {
        self.call_routine(
            "RunProcedureNonQuery",
            schema,
            procedure,
            timeout_secs,
            params,
            |_| Ok(()),
        )
    }

    /// Call a scalar function (or a procedure's return code) and return its value.
    ///
    /// An extra `@RETURN_VALUE` parameter declared as `return_type` receives the value.
    ///
    /// # Errors
    /// See [`SqlHelper::run_procedure`].
    pub fn run_function(
        &self,
        schema: &str,
        function: &str,
        timeout_secs: u32,
        return_type: SqlType,
        params: &mut [SqlParameter],
    ) -> Result<RowValues, SqlHelperError> {
        let mut all = params.to_vec();
        all.push(SqlParameter::return_value(return_type));
        self.call_routine("RunFunction", schema, function, timeout_secs, &mut all, |_| Ok(()))?;

        let returned = all.pop().map_or(RowValues::Null, |p| p.value);
        for (target, source) in params.iter_mut().zip(all) {
            if target.direction.receives_value() {
                target.value = source.value;
            }
        }
        Ok(returned)
    }

    fn call_routine<R, F>(
        &self,
        operation: &'static str,
        schema: &str,
        name: &str,
        timeout_secs: u32,
        params: &mut [SqlParameter],
        callback: F,
    ) -> Result<R, SqlHelperError>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        let context = self.context(operation, ErrorCategory::StoredProcedure);
        self.ensure_valid(&context)?;
        let target = script::qualify_routine_name(schema, name);
        let script = script::routine_call(&target, params).map_err(|reason| context.reject(&reason))?;
        let (value, outputs) = self.stream_script(context, &script, timeout_secs, callback)?;

        if !script.outputs.is_empty() {
            let row = outputs
                .ok_or_else(|| context.reject("the server did not return output parameter values"))?;
            // Column 0 is the marker.
            for (column, &param) in script.outputs.iter().enumerate() {
                params[param].value = cell_value(&row, column + 1);
            }
        }
        Ok(value)
    }

    /// Call a table-valued function and stream its rows through `callback`.
    ///
    /// Parameter values are written into the script as literals; see
    /// [`build_table_valued_function_sql`] for the quoting rules.
    ///
    /// # Errors
    /// Fails fast with a `Connection` error when invalid; values that cannot be written as
    /// literals and driver failures are `StoredProcedure` errors.
    pub fn run_table_valued_function<R, F>(
        &self,
        schema: &str,
        function: &str,
        timeout_secs: u32,
        params: &[SqlParameter],
        callback: F,
    ) -> Result<R, SqlHelperError>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<R, SqlHelperError>,
    {
        let context = self.context("RunTableValuedFunction", ErrorCategory::StoredProcedure);
        self.ensure_valid(&context)?;
        let target = script::qualify_routine_name(schema, function);
        let sql = build_table_valued_function_sql(&target, params)
            .map_err(|reason| context.reject(&reason))?;
        let (value, _) = self.stream_script(context, &Script::plain(sql), timeout_secs, callback)?;
        Ok(value)
    }
}
