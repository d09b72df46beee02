use std::env;
use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variables read by [`ConnectionParams::from_env`].
pub const ENV_DATA_SOURCE: &str = "MSSQL_HELPER_DATA_SOURCE";
pub const ENV_CATALOG: &str = "MSSQL_HELPER_CATALOG";
pub const ENV_USER: &str = "MSSQL_HELPER_USER";
pub const ENV_PASSWORD: &str = "MSSQL_HELPER_PASSWORD";
pub const ENV_INTEGRATED_SECURITY: &str = "MSSQL_HELPER_INTEGRATED_SECURITY";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Whether this build can authenticate with integrated security.
///
/// Windows always can. Elsewhere the `integrated-auth-gssapi` feature is required, which links
/// the system GSSAPI (Kerberos) library.
pub const INTEGRATED_AUTH_SUPPORTED: bool = cfg!(any(windows, feature = "integrated-auth-gssapi"));

/// SQL login credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

/// Everything needed to reach one SQL Server catalog.
///
/// `data_source` accepts the forms the driver understands: `host`, `host,port`,
/// `tcp:host,port` or `host\instance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub data_source: String,
    pub catalog: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub integrated_security: bool,
    #[serde(default = "default_trust")]
    pub trust_server_certificate: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

fn default_trust() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

impl ConnectionParams {
    /// Parameters authenticating with a SQL login.
    #[must_use]
    pub fn sql_login(
        data_source: impl Into<String>,
        catalog: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            catalog: catalog.into(),
            credentials: Some(Credentials::new(user_id, password)),
            integrated_security: false,
            trust_server_certificate: default_trust(),
            connect_timeout: default_connect_timeout(),
        }
    }

    /// Parameters authenticating with the process's OS credentials.
    ///
    /// See [`INTEGRATED_AUTH_SUPPORTED`] for the platforms where this works.
    #[must_use]
    pub fn integrated(data_source: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            catalog: catalog.into(),
            credentials: None,
            integrated_security: true,
            trust_server_certificate: default_trust(),
            connect_timeout: default_connect_timeout(),
        }
    }

    #[must_use]
    pub fn builder(
        data_source: impl Into<String>,
        catalog: impl Into<String>,
    ) -> ConnectionParamsBuilder {
        ConnectionParamsBuilder::new(data_source, catalog)
    }

    /// Read parameters from `MSSQL_HELPER_*` environment variables.
    ///
    /// Returns `None` when the data source or catalog is unset. Credentials are used when both
    /// user and password are present; otherwise integrated security is assumed unless
    /// `MSSQL_HELPER_INTEGRATED_SECURITY` says `false`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let data_source = env::var(ENV_DATA_SOURCE).ok().filter(|v| !v.is_empty())?;
        let catalog = env::var(ENV_CATALOG).ok().filter(|v| !v.is_empty())?;
        let integrated_flag = env::var(ENV_INTEGRATED_SECURITY)
            .ok()
            .map(|v| parse_bool(&v));

        let mut builder = ConnectionParamsBuilder::new(data_source, catalog);
        match (env::var(ENV_USER).ok(), env::var(ENV_PASSWORD).ok()) {
            (Some(user), Some(password)) => {
                builder = builder
                    .credentials(user, password)
                    .integrated_security(integrated_flag.unwrap_or(false));
            }
            _ => {
                builder = builder.integrated_security(integrated_flag.unwrap_or(true));
            }
        }
        Some(builder.finish())
    }

    /// Build the ADO.NET-style connection string handed to the driver.
    ///
    /// Credentials are only emitted when present and integrated security is off.
    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut out = String::with_capacity(128);
        push_pair(&mut out, "Data Source", &self.data_source);
        push_pair(&mut out, "Initial Catalog", &self.catalog);
        push_pair(
            &mut out,
            "Integrated Security",
            bool_word(self.integrated_security),
        );
        if !self.integrated_security {
            if let Some(creds) = &self.credentials {
                push_pair(&mut out, "User ID", &creds.user_id);
                push_pair(&mut out, "Password", &creds.password);
            }
        }
        push_pair(
            &mut out,
            "TrustServerCertificate",
            bool_word(self.trust_server_certificate),
        );
        out
    }
}

/// Fluent builder for [`ConnectionParams`].
#[derive(Debug, Clone)]
pub struct ConnectionParamsBuilder {
    params: ConnectionParams,
}

impl ConnectionParamsBuilder {
    #[must_use]
    pub fn new(data_source: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            params: ConnectionParams {
                data_source: data_source.into(),
                catalog: catalog.into(),
                credentials: None,
                integrated_security: false,
                trust_server_certificate: default_trust(),
                connect_timeout: default_connect_timeout(),
            },
        }
    }

    #[must_use]
    pub fn credentials(mut self, user_id: impl Into<String>, password: impl Into<String>) -> Self {
        self.params.credentials = Some(Credentials::new(user_id, password));
        self
    }

    #[must_use]
    pub fn integrated_security(mut self, integrated_security: bool) -> Self {
        self.params.integrated_security = integrated_security;
        self
    }

    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.params.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.params.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionParams {
        self.params
    }
}

fn bool_word(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "sspi"
    )
}

fn push_pair(out: &mut String, key: &str, value: &str) {
    if needs_quoting(value) {
        let _ = write!(out, "{key}=\"{}\";", value.replace('"', "\"\""));
    } else {
        let _ = write!(out, "{key}={value};");
    }
}

fn needs_quoting(value: &str) -> bool {
    value.contains([';', '=', '"', '\''])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
}

/// Replace the password value of a connection string with `***` for logs and debug output.
#[must_use]
pub fn redact_connection_string(connection_string: &str) -> String {
    let mut out = String::with_capacity(connection_string.len());
    let mut rest = connection_string;
    while !rest.is_empty() {
        let (segment, tail) = split_segment(rest);
        let key = segment.split('=').next().unwrap_or_default().trim();
        if key.eq_ignore_ascii_case("password") || key.eq_ignore_ascii_case("pwd") {
            out.push_str(key);
            out.push_str("=***");
        } else {
            out.push_str(segment);
        }
        if tail.is_some() {
            out.push(';');
        }
        rest = tail.unwrap_or_default();
    }
    out
}

/// Split off one `key=value` segment, honoring double-quoted values.
fn split_segment(input: &str) -> (&str, Option<&str>) {
    let mut in_quotes = false;
    for (idx, ch) in input.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return (&input[..idx], Some(&input[idx + 1..])),
            _ => {}
        }
    }
    (input, None)
}
