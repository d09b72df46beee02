use std::error::Error;
use std::time::Duration;

use mssql_helper::prelude::*;

#[test]
fn unreachable_server_fails_construction_with_connection_error() {
    let params = ConnectionParams::builder("127.0.0.1,1", "nowhere")
        .credentials("app", "pw")
        .connect_timeout(Duration::from_secs(5))
        .finish();
    let expected = params.connection_string();

    let err = SqlHelper::new(params).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(err.connection_string(), expected);
    assert!(
        err.message().starts_with("ValidateConnection failed: "),
        "{err}"
    );
    assert_carries_driver_message(&err);
}

/// The message is the operation prefix followed by the underlying failure's own text.
fn assert_carries_driver_message(err: &SqlHelperError) {
    let source = err.source().expect("driver failure is kept as the source");
    let detail = source.to_string();
    assert!(!detail.is_empty());
    assert_eq!(err.message(), format!("ValidateConnection failed: {detail}"));
}

#[test]
fn unresolvable_host_fails_construction() {
    let params = ConnectionParams::builder("mssql-helper-test.invalid", "nowhere")
        .credentials("app", "pw")
        .connect_timeout(Duration::from_secs(5))
        .finish();
    let err = SqlHelper::new(params).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.connection_string().contains("Data Source=mssql-helper-test.invalid;"));
    assert_carries_driver_message(&err);
}

#[test]
fn integrated_security_string_has_no_login() {
    let params = ConnectionParams::integrated("db01", "sales");
    let conn = params.connection_string();
    assert!(conn.contains("Integrated Security=True;"));
    assert!(!conn.contains("User ID"));
    assert!(!conn.contains("Password"));
}

#[test]
fn connection_strings_are_stable_across_builders() {
    let via_ctor = ConnectionParams::sql_login("db01,1433", "sales", "app", "pw");
    let via_builder = ConnectionParams::builder("db01,1433", "sales")
        .credentials("app", "pw")
        .finish();
    assert_eq!(via_ctor.connection_string(), via_builder.connection_string());
}
