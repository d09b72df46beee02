use std::future::Future;
use std::io;
use std::time::Duration;

use tiberius::{Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::BoxedSource;

/// Type alias for a SQL Server client over tokio TCP
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Convert a command timeout in seconds into a deadline; `0` means no limit.
pub(crate) fn command_limit(timeout_secs: u32) -> Option<Duration> {
    (timeout_secs > 0).then(|| Duration::from_secs(u64::from(timeout_secs)))
}

pub(crate) fn connect_limit(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

/// Await `fut`, failing with a timed-out I/O error when `limit` elapses first.
pub(crate) async fn within<T, E, F>(limit: Option<Duration>, fut: F) -> Result<T, BoxedSource>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxedSource>,
{
    let Some(limit) = limit else {
        return fut.await.map_err(Into::into);
    };
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(Box::new(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timeout expired after {} s", limit.as_secs_f64()),
        ))),
    }
}

/// Open a connection described by an ADO.NET-style connection string.
///
/// Named instances (`host\instance`) are resolved through the SQL Browser service. A routing
/// response from the server (Azure gateways) is followed once.
///
/// # Errors
/// Returns the driver error when the string cannot be parsed or the connection fails.
pub async fn create_mssql_client(connection_string: &str) -> Result<MssqlClient, tiberius::error::Error> {
    let config = Config::from_ado_string(connection_string)?;
    let tcp = TcpStream::connect_named(&config).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "following server routing response");
            let mut routed = config;
            routed.host(&host);
            routed.port(port);
            let tcp = TcpStream::connect(routed.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Client::connect(routed, tcp.compat_write()).await
        }
        Err(e) => Err(e),
    }
}

/// Open and immediately close a connection.
pub(crate) async fn probe(connection_string: &str, timeout: Duration) -> Result<(), BoxedSource> {
    let client = within(connect_limit(timeout), create_mssql_client(connection_string)).await?;
    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeouts_mean_unlimited() {
        assert_eq!(command_limit(0), None);
        assert_eq!(command_limit(30), Some(Duration::from_secs(30)));
        assert_eq!(connect_limit(Duration::ZERO), None);
    }

    #[tokio::test]
    async fn within_reports_elapsed_deadline() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(())
        };
        let err = within(Some(Duration::from_millis(10)), slow)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("timeout expired"));
    }

    #[tokio::test]
    async fn unparsable_connection_string_is_a_driver_error() {
        let result = create_mssql_client("Data Source=tcp:db01,notaport;").await;
        assert!(result.is_err());
    }
}
