//! Table-valued function calls.
//!
//! The call is written as one `declare` per parameter with the value inlined as a literal,
//! followed by `select * from fn(@param1,@param2,…)`. Values are interpolated, not bound:
//! quoted literals have embedded `'` doubled and bare literals must look numeric, so a value
//! can never terminate its own literal. Prefer a stored procedure with bound parameters when
//! the values come from untrusted input.

use std::fmt::Write;

use crate::types::{RowValues, SqlParameter, SqlType};

/// Build the script that selects everything from table-valued function `target`.
///
/// ```rust
/// use mssql_helper::prelude::*;
///
/// let sql = build_table_valued_function_sql(
///     "[dbo].fnOrders",
///     &[
///         SqlParameter::input("customer", SqlType::VarChar, RowValues::Text("abc".into())),
///         SqlParameter::input("limit", SqlType::Int, RowValues::Int(5)),
///     ],
/// )
/// .unwrap();
/// assert_eq!(
///     sql,
///     "declare @param1 VarChar(max) = 'abc';\n\
///      declare @param2 Int = 5;\n\
///      select * from [dbo].fnOrders(@param1,@param2);"
/// );
/// ```
///
/// # Errors
/// Returns a message naming the parameter whose value cannot be written as a literal of its
/// declared type.
pub fn build_table_valued_function_sql(
    target: &str,
    params: &[SqlParameter],
) -> Result<String, String> {
    let mut sql = String::with_capacity(64 + params.len() * 48);
    let mut args = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let variable = format!("@param{}", i + 1);
        let literal = render_literal(param).map_err(|reason| {
            format!(
                "cannot inline parameter {} ({}): {reason}",
                param.variable_name(),
                param.sql_type.keyword()
            )
        })?;
        let _ = writeln!(
            sql,
            "declare {variable} {} = {literal};",
            param.type_declaration()
        );
        args.push(variable);
    }
    let _ = write!(sql, "select * from {target}({});", args.join(","));
    Ok(sql)
}

fn render_literal(param: &SqlParameter) -> Result<String, String> {
    let value = &param.value;
    if value.is_null() {
        return Ok("NULL".to_string());
    }
    let quoted = match param.sql_type {
        SqlType::Variant => matches!(
            value,
            RowValues::Text(_) | RowValues::Timestamp(_) | RowValues::JSON(_)
        ),
        other => other.is_quoted(),
    };
    if quoted {
        let unicode = param.sql_type.is_unicode() || param.sql_type == SqlType::Variant;
        let text = value
            .text_form()
            .ok_or_else(|| "binary values have no text form".to_string())?;
        let prefix = if unicode { "N" } else { "" };
        Ok(format!("{prefix}'{}'", text.replace('\'', "''")))
    } else {
        bare_form(value)
    }
}

fn bare_form(value: &RowValues) -> Result<String, String> {
    match value {
        RowValues::Int(i) => Ok(i.to_string()),
        RowValues::Float(f) if f.is_finite() => Ok(f.to_string()),
        RowValues::Float(_) => Err("non-finite float".to_string()),
        RowValues::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        RowValues::Blob(bytes) => {
            let mut hex = String::with_capacity(2 + bytes.len() * 2);
            hex.push_str("0x");
            for byte in bytes {
                let _ = write!(hex, "{byte:02X}");
            }
            Ok(hex)
        }
        RowValues::Text(s) if is_numeric_literal(s) => Ok(s.trim().to_string()),
        RowValues::Text(_) => Err("text is not a numeric literal".to_string()),
        RowValues::Timestamp(_) | RowValues::JSON(_) => {
            Err("value needs quoting but the type is written bare".to_string())
        }
        RowValues::Null => Ok("NULL".to_string()),
    }
}

fn is_numeric_literal(text: &str) -> bool {
    let text = text.trim();
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && text.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn one(param: SqlParameter) -> String {
        build_table_valued_function_sql("[dbo].fn", &[param]).unwrap()
    }

    #[test]
    fn varchar_is_quoted_without_prefix() {
        let sql = one(SqlParameter::input("a", SqlType::VarChar, RowValues::Text("abc".into())));
        assert_eq!(
            sql,
            "declare @param1 VarChar(max) = 'abc';\nselect * from [dbo].fn(@param1);"
        );
    }

    #[test]
    fn int_is_bare() {
        let sql = one(SqlParameter::input("a", SqlType::Int, RowValues::Int(5)));
        assert!(sql.starts_with("declare @param1 Int = 5;\n"));
    }

    #[test]
    fn unicode_types_get_n_prefix() {
        for ty in [SqlType::NVarChar, SqlType::NChar, SqlType::NText] {
            let sql = one(SqlParameter::input("a", ty, RowValues::Text("ü".into())));
            assert!(sql.contains("= N'ü';"), "{sql}");
        }
        for ty in [SqlType::VarChar, SqlType::Char, SqlType::Text, SqlType::Xml] {
            let sql = one(SqlParameter::input("a", ty, RowValues::Text("u".into())));
            assert!(sql.contains("= 'u';"), "{sql}");
        }
    }

    #[test]
    fn quoting_table_is_exact() {
        let quoted = [
            SqlType::Char,
            SqlType::VarChar,
            SqlType::Text,
            SqlType::NChar,
            SqlType::NVarChar,
            SqlType::NText,
            SqlType::Date,
            SqlType::DateTime,
            SqlType::DateTime2,
            SqlType::DateTimeOffset,
            SqlType::SmallDateTime,
            SqlType::Time,
            SqlType::UniqueIdentifier,
            SqlType::Xml,
        ];
        let bare = [
            SqlType::BigInt,
            SqlType::Bit,
            SqlType::Decimal,
            SqlType::Float,
            SqlType::Int,
            SqlType::Money,
            SqlType::Real,
            SqlType::SmallInt,
            SqlType::SmallMoney,
            SqlType::TinyInt,
        ];
        for ty in quoted {
            assert!(ty.is_quoted(), "{ty:?}");
        }
        for ty in bare {
            assert!(!ty.is_quoted(), "{ty:?}");
            let sql = one(SqlParameter::input("a", ty, RowValues::Int(1)));
            assert!(sql.contains(" = 1;"), "{sql}");
        }
    }

    #[test]
    fn declaration_order_matches_input_order() {
        let params = [
            SqlParameter::input("z", SqlType::Int, RowValues::Int(1)),
            SqlParameter::input("y", SqlType::NVarChar, RowValues::Text("two".into())),
            SqlParameter::input("x", SqlType::Bit, RowValues::Bool(true)),
        ];
        let sql = build_table_valued_function_sql("[sales].fnTop", &params).unwrap();
        assert_eq!(
            sql,
            "declare @param1 Int = 1;\n\
             declare @param2 NVarChar(max) = N'two';\n\
             declare @param3 Bit = 1;\n\
             select * from [sales].fnTop(@param1,@param2,@param3);"
        );
    }

    #[test]
    fn no_params_calls_with_empty_list() {
        let sql = build_table_valued_function_sql("[dbo].fnAll", &[]).unwrap();
        assert_eq!(sql, "select * from [dbo].fnAll();");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let sql = one(SqlParameter::input(
            "a",
            SqlType::VarChar,
            RowValues::Text("x'; drop table t; --".into()),
        ));
        assert!(sql.contains("= 'x''; drop table t; --';"), "{sql}");
    }

    #[test]
    fn non_numeric_text_for_numeric_type_is_rejected() {
        let err = build_table_valued_function_sql(
            "[dbo].fn",
            &[SqlParameter::input("id", SqlType::Int, RowValues::Text("1; drop table t".into()))],
        )
        .unwrap_err();
        assert!(err.contains("@id"), "{err}");
        let ok = one(SqlParameter::input("id", SqlType::Int, RowValues::Text(" 42 ".into())));
        assert!(ok.contains("= 42;"));
    }

    #[test]
    fn nulls_binary_and_timestamps() {
        assert!(one(SqlParameter::input("a", SqlType::VarChar, RowValues::Null)).contains("= NULL;"));
        assert!(
            one(SqlParameter::input("a", SqlType::VarBinary, RowValues::Blob(vec![0xde, 0x01])))
                .contains("declare @param1 VarBinary(max) = 0xDE01;")
        );
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert!(
            one(SqlParameter::input("a", SqlType::DateTime, RowValues::Timestamp(ts)))
                .contains("= '2024-01-02T03:04:05';")
        );
    }

    #[test]
    fn fixed_length_char_fits_converted_value() {
        let sql = one(SqlParameter::input("a", SqlType::Char, RowValues::Int(42)));
        assert!(sql.starts_with("declare @param1 Char(2) = '42';\n"), "{sql}");
        let sql = one(SqlParameter::input("a", SqlType::NChar, RowValues::Text("héllo".into())));
        assert!(sql.starts_with("declare @param1 NChar(5) = N'héllo';\n"), "{sql}");
    }

    #[test]
    fn variant_quotes_by_value_kind() {
        assert!(one(SqlParameter::input("a", SqlType::Variant, RowValues::Int(3))).contains("sql_variant = 3;"));
        assert!(
            one(SqlParameter::input("a", SqlType::Variant, RowValues::Text("t".into())))
                .contains("sql_variant = N't';")
        );
    }
}
