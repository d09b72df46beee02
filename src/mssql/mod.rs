// MSSQL module - the driver-facing half of the helper
//
// - client: connecting from a connection string, probing, timeouts
// - params: binding values to the driver's positional parameters
// - script: T-SQL synthesis for declared parameters and routine calls
// - tvf: table-valued function call synthesis
// - query: the row cursor and cell conversion
// - xml: FOR XML documents

pub mod client;
pub mod params;
pub mod query;
pub mod script;
pub mod tvf;
pub mod xml;

pub use client::{MssqlClient, create_mssql_client};
pub use params::bind_query_params;
pub use query::{RowCursor, cell_value, row_values};
pub use script::qualify_routine_name;
pub use tvf::build_table_valued_function_sql;
pub use xml::{XmlDocument, contains_xml_clause};
