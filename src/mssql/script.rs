//! T-SQL synthesis for parameterized statements and routine calls.
//!
//! The driver only knows positional `@P1`, `@P2`, … parameters, so named parameters are
//! declared as local variables initialized from the positional ones, and routine output values
//! come back through one trailing marker result set.

use std::fmt::Write;

use crate::types::{ParameterDirection, RowValues, SqlParameter, SqlType};

/// First column of the result set that carries output parameter values.
pub(crate) const OUTPUT_MARKER: &str = "__sql_helper_outputs";

/// A statement ready to hand to the driver.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Script {
    pub sql: String,
    /// Values bound as `@P1`, `@P2`, … in order.
    pub bound: Vec<RowValues>,
    /// Indexes of the caller's parameters receiving values, in marker-column order.
    pub outputs: Vec<usize>,
}

impl Script {
    pub(crate) fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bound: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

/// Qualify a routine with its schema as `[schema].name`.
///
/// Brackets in `schema` are stripped before it is wrapped again, so `"[dbo]"` and `"dbo"` both
/// give `[dbo].name`. An empty schema leaves the name unqualified.
#[must_use]
pub fn qualify_routine_name(schema: &str, name: &str) -> String {
    let bare: String = schema.chars().filter(|c| !matches!(c, '[' | ']')).collect();
    let bare = bare.trim();
    if bare.is_empty() {
        name.to_string()
    } else {
        format!("[{bare}].{name}")
    }
}

/// Synthesize `Param1`, `Param2`, … parameters for positional string values.
pub(crate) fn positional_params<S: AsRef<str>>(values: &[S]) -> Vec<SqlParameter> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            SqlParameter::input(
                format!("Param{}", i + 1),
                SqlType::NVarChar,
                RowValues::Text(v.as_ref().to_string()),
            )
        })
        .collect()
}

/// Prefix `sql` with one `declare` per parameter so the caller's text can use the names.
pub(crate) fn declared_statement(sql: &str, params: &[SqlParameter]) -> Script {
    let mut out = String::with_capacity(sql.len() + params.len() * 48);
    let mut bound = Vec::new();
    for param in params {
        let _ = write!(
            out,
            "declare {} {}",
            param.variable_name(),
            param.type_declaration()
        );
        if param.direction.sends_value() {
            bound.push(param.value.clone());
            let _ = write!(out, " = @P{}", bound.len());
        }
        out.push_str(";\n");
    }
    out.push_str(sql);
    Script {
        sql: out,
        bound,
        outputs: Vec::new(),
    }
}

/// Build an `exec` of `target` with named arguments, capturing output and return values.
///
/// # Errors
/// Returns a message when more than one parameter has the return-value direction.
pub(crate) fn routine_call(target: &str, params: &[SqlParameter]) -> Result<Script, String> {
    let mut declarations = String::new();
    let mut args = Vec::with_capacity(params.len());
    let mut bound = Vec::new();
    let mut outputs = Vec::new();
    let mut return_slot: Option<String> = None;

    for (i, param) in params.iter().enumerate() {
        let slot = format!("@__out{}", i + 1);
        match param.direction {
            ParameterDirection::Input => {
                bound.push(param.value.clone());
                args.push(format!("{} = @P{}", param.variable_name(), bound.len()));
            }
            ParameterDirection::Output => {
                let _ = writeln!(declarations, "declare {slot} {};", param.type_declaration());
                args.push(format!("{} = {slot} output", param.variable_name()));
                outputs.push(i);
            }
            ParameterDirection::InputOutput => {
                bound.push(param.value.clone());
                let _ = writeln!(
                    declarations,
                    "declare {slot} {} = @P{};",
                    param.type_declaration(),
                    bound.len()
                );
                args.push(format!("{} = {slot} output", param.variable_name()));
                outputs.push(i);
            }
            ParameterDirection::ReturnValue => {
                if return_slot.is_some() {
                    return Err(format!(
                        "only one return value parameter is allowed, found another at {}",
                        param.variable_name()
                    ));
                }
                let _ = writeln!(declarations, "declare {slot} {};", param.type_declaration());
                outputs.push(i);
                return_slot = Some(slot);
            }
        }
    }

    let mut sql = declarations;
    sql.push_str("exec ");
    if let Some(slot) = &return_slot {
        let _ = write!(sql, "{slot} = ");
    }
    sql.push_str(target);
    if !args.is_empty() {
        sql.push(' ');
        sql.push_str(&args.join(", "));
    }
    sql.push(';');

    if !outputs.is_empty() {
        let _ = write!(sql, "\nselect 1 as [{OUTPUT_MARKER}]");
        for &i in &outputs {
            let _ = write!(
                sql,
                ", @__out{} as [{}]",
                i + 1,
                params[i].bare_name().replace(']', "]]")
            );
        }
        sql.push(';');
    }

    Ok(Script {
        sql,
        bound,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_brackets_are_normalized() {
        assert_eq!(qualify_routine_name("[dbo]", "procName"), "[dbo].procName");
        assert_eq!(qualify_routine_name("dbo", "procName"), "[dbo].procName");
        assert_eq!(qualify_routine_name("[[dbo]]", "procName"), "[dbo].procName");
        assert_eq!(qualify_routine_name("", "procName"), "procName");
    }

    #[test]
    fn positional_names_follow_call_order() {
        let params = positional_params(&["a", "b"]);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Param1", "Param2"]);
        assert_eq!(params[1].value, RowValues::Text("b".into()));
    }

    #[test]
    fn declared_statement_binds_in_order() {
        let params = positional_params(&["x", "y"]);
        let script = declared_statement("select @Param1, @Param2", &params);
        assert_eq!(
            script.sql,
            "declare @Param1 NVarChar(max) = @P1;\ndeclare @Param2 NVarChar(max) = @P2;\nselect @Param1, @Param2"
        );
        assert_eq!(
            script.bound,
            vec![RowValues::Text("x".into()), RowValues::Text("y".into())]
        );
    }

    #[test]
    fn declared_statement_without_params_is_untouched() {
        let script = declared_statement("select 1", &[]);
        assert_eq!(script.sql, "select 1");
        assert!(script.bound.is_empty());
    }

    #[test]
    fn routine_call_with_only_inputs_has_no_marker() {
        let params = [
            SqlParameter::input("@Id", SqlType::Int, RowValues::Int(4)),
            SqlParameter::input("Name", SqlType::VarChar, RowValues::Text("n".into())),
        ];
        let script = routine_call("[dbo].getThing", &params).unwrap();
        assert_eq!(script.sql, "exec [dbo].getThing @Id = @P1, @Name = @P2;");
        assert!(script.outputs.is_empty());
        assert_eq!(script.bound.len(), 2);
    }

    #[test]
    fn routine_call_captures_outputs_and_return_value() {
        let params = [
            SqlParameter::input("a", SqlType::Int, RowValues::Int(1)),
            SqlParameter::input_output("b", SqlType::Int, RowValues::Int(2)),
            SqlParameter::output("c", SqlType::NVarChar).with_size(20),
            SqlParameter::return_value(SqlType::Int),
        ];
        let script = routine_call("[dbo].proc", &params).unwrap();
        assert_eq!(
            script.sql,
            "declare @__out2 Int = @P2;\n\
             declare @__out3 NVarChar(20);\n\
             declare @__out4 Int;\n\
             exec @__out4 = [dbo].proc @a = @P1, @b = @__out2 output, @c = @__out3 output;\n\
             select 1 as [__sql_helper_outputs], @__out2 as [b], @__out3 as [c], @__out4 as [RETURN_VALUE];"
        );
        assert_eq!(script.outputs, vec![1, 2, 3]);
        assert_eq!(script.bound, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn routine_call_rejects_two_return_values() {
        let params = [
            SqlParameter::return_value(SqlType::Int),
            SqlParameter::return_value(SqlType::Int),
        ];
        assert!(routine_call("[dbo].proc", &params).is_err());
    }

    #[test]
    fn routine_call_without_params() {
        let script = routine_call("[dbo].cleanup", &[]).unwrap();
        assert_eq!(script, Script::plain("exec [dbo].cleanup;"));
    }
}
