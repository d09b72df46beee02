use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values passed as parameters, read back from output parameters, or materialized from rows.
///
/// ```rust
/// use mssql_helper::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// The value as the server sees it once converted to character data.
    ///
    /// Booleans become `1`/`0` and timestamps use ISO 8601. Blobs have no text form.
    #[must_use]
    pub fn text_form(&self) -> Option<String> {
        match self {
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            RowValues::Timestamp(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            RowValues::JSON(json) => Some(json.to_string()),
            RowValues::Null => Some(String::new()),
            RowValues::Blob(_) => None,
        }
    }
}

/// Largest `Char`/`Binary` length, in bytes.
pub const MAX_BYTE_LEN: u32 = 8000;
/// Largest `NChar` length, in characters.
pub const MAX_NCHAR_LEN: u32 = 4000;

/// SQL Server data types a parameter can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SqlType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Text,
    Time,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

impl SqlType {
    /// The type keyword as written in T-SQL.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            SqlType::BigInt => "BigInt",
            SqlType::Binary => "Binary",
            SqlType::Bit => "Bit",
            SqlType::Char => "Char",
            SqlType::Date => "Date",
            SqlType::DateTime => "DateTime",
            SqlType::DateTime2 => "DateTime2",
            SqlType::DateTimeOffset => "DateTimeOffset",
            SqlType::Decimal => "Decimal",
            SqlType::Float => "Float",
            SqlType::Image => "Image",
            SqlType::Int => "Int",
            SqlType::Money => "Money",
            SqlType::NChar => "NChar",
            SqlType::NText => "NText",
            SqlType::NVarChar => "NVarChar",
            SqlType::Real => "Real",
            SqlType::SmallDateTime => "SmallDateTime",
            SqlType::SmallInt => "SmallInt",
            SqlType::SmallMoney => "SmallMoney",
            SqlType::Text => "Text",
            SqlType::Time => "Time",
            SqlType::TinyInt => "TinyInt",
            SqlType::UniqueIdentifier => "UniqueIdentifier",
            SqlType::VarBinary => "VarBinary",
            SqlType::VarChar => "VarChar",
            SqlType::Variant => "sql_variant",
            SqlType::Xml => "Xml",
        }
    }

    /// Whether a literal of this type is written inside single quotes.
    #[must_use]
    pub fn is_quoted(self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::Text
                | SqlType::NChar
                | SqlType::NVarChar
                | SqlType::NText
                | SqlType::Date
                | SqlType::DateTime
                | SqlType::DateTime2
                | SqlType::DateTimeOffset
                | SqlType::SmallDateTime
                | SqlType::Time
                | SqlType::UniqueIdentifier
                | SqlType::Xml
        )
    }

    /// Whether a quoted literal of this type carries the `N` prefix.
    #[must_use]
    pub fn is_unicode(self) -> bool {
        matches!(self, SqlType::NChar | SqlType::NVarChar | SqlType::NText)
    }
}

/// Direction of a routine parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the server writes a value back into the parameter.
    #[must_use]
    pub fn receives_value(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }

    /// Whether the caller's value is sent to the server.
    #[must_use]
    pub fn sends_value(self) -> bool {
        matches!(
            self,
            ParameterDirection::Input | ParameterDirection::InputOutput
        )
    }
}

/// Name of the parameter that receives a routine's return value.
pub const RETURN_VALUE_NAME: &str = "@RETURN_VALUE";

/// One fully-specified command parameter.
///
/// After a routine call, parameters whose direction is not [`ParameterDirection::Input`] hold
/// the value the server produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub sql_type: SqlType,
    pub value: RowValues,
    pub direction: ParameterDirection,
    /// Length for character and binary types; `None` means `max` (or the value length for
    /// fixed-length types).
    pub size: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl SqlParameter {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sql_type: SqlType,
        value: RowValues,
        direction: ParameterDirection,
    ) -> Self {
        Self {
            name: name.into(),
            sql_type,
            value,
            direction,
            size: None,
            precision: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn input(name: impl Into<String>, sql_type: SqlType, value: RowValues) -> Self {
        Self::new(name, sql_type, value, ParameterDirection::Input)
    }

    #[must_use]
    pub fn output(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self::new(name, sql_type, RowValues::Null, ParameterDirection::Output)
    }

    #[must_use]
    pub fn input_output(name: impl Into<String>, sql_type: SqlType, value: RowValues) -> Self {
        Self::new(name, sql_type, value, ParameterDirection::InputOutput)
    }

    #[must_use]
    pub fn return_value(sql_type: SqlType) -> Self {
        Self::new(
            RETURN_VALUE_NAME,
            sql_type,
            RowValues::Null,
            ParameterDirection::ReturnValue,
        )
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    /// The name as a T-SQL variable, with exactly one leading `@`.
    #[must_use]
    pub fn variable_name(&self) -> String {
        format!("@{}", self.bare_name())
    }

    /// The name without any leading `@`.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches('@')
    }

    /// The type as written in a `declare` statement.
    ///
    /// `Text`, `NText` and `Image` are not allowed for local variables, so they are declared
    /// as their `(max)` replacements.
    #[must_use]
    pub fn type_declaration(&self) -> String {
        let max_or = |size: Option<u32>| size.map_or_else(|| "max".to_string(), |n| n.to_string());
        match self.sql_type {
            SqlType::VarChar | SqlType::NVarChar | SqlType::VarBinary => {
                format!("{}({})", self.sql_type.keyword(), max_or(self.size))
            }
            SqlType::Text => "VarChar(max)".to_string(),
            SqlType::NText => "NVarChar(max)".to_string(),
            SqlType::Image => "VarBinary(max)".to_string(),
            SqlType::Char | SqlType::NChar | SqlType::Binary => {
                let len = self.size.unwrap_or_else(|| self.fixed_len());
                format!("{}({len})", self.sql_type.keyword())
            }
            SqlType::Decimal => format!(
                "Decimal({}, {})",
                self.precision.unwrap_or(18),
                self.scale.unwrap_or(0)
            ),
            SqlType::DateTime2 | SqlType::DateTimeOffset | SqlType::Time => match self.scale {
                Some(scale) => format!("{}({scale})", self.sql_type.keyword()),
                None => self.sql_type.keyword().to_string(),
            },
            other => other.keyword().to_string(),
        }
    }

    /// Length for an unsized fixed-length declaration.
    ///
    /// Parameters that receive a value get the type's maximum, since the server pads or cuts
    /// whatever comes back to the declared length. Sent values are measured in the form the
    /// server converts them to.
    fn fixed_len(&self) -> u32 {
        let max = if self.sql_type == SqlType::NChar {
            MAX_NCHAR_LEN
        } else {
            MAX_BYTE_LEN
        };
        if self.direction.receives_value() {
            return max;
        }
        let len = match (&self.value, self.sql_type) {
            (RowValues::Blob(b), _) => b.len(),
            // non-binary values keep their storage width when converted to binary
            (_, SqlType::Binary) => return max,
            (value, _) => value
                .text_form()
                .map_or(0, |text| text.chars().count()),
        };
        u32::try_from(len).unwrap_or(u32::MAX).max(1)
    }
}
