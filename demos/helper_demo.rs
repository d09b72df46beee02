//! Command-line tour of the helper.
//!
//! Run with: cargo run --example helper_demo -- --data-source db01 --catalog sales \
//!     --user app --password secret --query "select top 5 name from sys.objects"

use clap::Parser;
use mssql_helper::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a query or table-valued function through mssql-helper")]
struct Args {
    #[arg(long)]
    data_source: String,
    #[arg(long)]
    catalog: String,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Ad-hoc SQL; positional values are available as @Param1, @Param2, …
    #[arg(long)]
    query: Option<String>,
    /// Table-valued function as schema.name
    #[arg(long)]
    tvf: Option<String>,
    /// Declared type of every --value passed to --tvf
    #[arg(long, value_enum, default_value_t = SqlType::NVarChar)]
    value_type: SqlType,
    #[arg(long = "value")]
    values: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT)]
    timeout: u32,
    #[arg(long)]
    verbose: bool,
}

fn print_rows(cursor: &mut RowCursor<'_>) -> Result<usize, SqlHelperError> {
    let mut count = 0;
    while let Some(row) = cursor.next_record()? {
        if count == 0 {
            println!("{}", row.column_names().join("\t"));
        }
        let cells: Vec<String> = row.values.iter().map(|v| format!("{v:?}")).collect();
        println!("{}", cells.join("\t"));
        count += 1;
    }
    Ok(count)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut builder = ConnectionParams::builder(&args.data_source, &args.catalog);
    builder = match (&args.user, &args.password) {
        (Some(user), Some(password)) => builder.credentials(user, password),
        _ => builder.integrated_security(true),
    };

    let mut helper = SqlHelper::new(builder.finish())?;
    helper.set_command_timeout(args.timeout);
    tracing::info!(valid = helper.is_valid(), "connected");

    if let Some(sql) = &args.query {
        let count = helper.run_query(sql, args.values.as_slice(), print_rows)?;
        tracing::info!(rows = count, "query finished");
    }

    if let Some(tvf) = &args.tvf {
        let (schema, name) = tvf.split_once('.').unwrap_or(("dbo", tvf.as_str()));
        let params: Vec<SqlParameter> = args
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                SqlParameter::input(format!("p{}", i + 1), args.value_type, RowValues::Text(v.clone()))
            })
            .collect();
        let count = helper.run_table_valued_function(schema, name, args.timeout, &params, print_rows)?;
        tracing::info!(rows = count, "table-valued function finished");
    }
    Ok(())
}
