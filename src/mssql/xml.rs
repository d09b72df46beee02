use std::fmt;

use xmltree::Element;

use super::query::{RowCursor, first_column_text};
use crate::error::SqlHelperError;

/// Whether `sql` contains a `FOR XML` clause (case-insensitive substring match).
#[must_use]
pub fn contains_xml_clause(sql: &str) -> bool {
    sql.to_ascii_lowercase().contains("for xml")
}

/// An XML document returned by a `FOR XML` query or procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    text: String,
    root: Element,
}

impl XmlDocument {
    /// Parse server output; blank output means there is no document.
    ///
    /// # Errors
    /// Returns the parser error when the text is not a single well-formed document (for
    /// example `FOR XML AUTO` output without a `ROOT` directive and more than one row).
    pub fn parse(text: String) -> Result<Option<Self>, xmltree::ParseError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let root = Element::parse(text.as_bytes())?;
        Ok(Some(Self { text, root }))
    }

    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    #[must_use]
    pub fn into_root(self) -> Element {
        self.root
    }

    /// The document text exactly as the server produced it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Concatenate the first column of every row and parse the result.
///
/// SQL Server splits untyped `FOR XML` output over several rows, so the pieces are joined
/// before parsing.
pub(crate) fn read_document(cursor: &mut RowCursor<'_>) -> Result<Option<XmlDocument>, SqlHelperError> {
    let mut text = String::new();
    while let Some(row) = cursor.next_row()? {
        if let Some(chunk) = first_column_text(&row) {
            text.push_str(&chunk);
        }
    }
    XmlDocument::parse(text).map_err(|e| cursor.fail(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_check_ignores_case() {
        assert!(contains_xml_clause("select * from t FOR XML AUTO"));
        assert!(contains_xml_clause("select * from t for xml path('r'), root('rs')"));
        assert!(contains_xml_clause("select * from t For Xml Raw"));
        assert!(!contains_xml_clause("select * from t"));
        assert!(!contains_xml_clause("select xml from t"));
    }

    #[test]
    fn blank_output_is_no_document() {
        assert_eq!(XmlDocument::parse(String::new()).unwrap(), None);
        assert_eq!(XmlDocument::parse("  \n".into()).unwrap(), None);
    }

    #[test]
    fn parses_rooted_output() {
        let doc = XmlDocument::parse(r#"<rs><r id="1"/><r id="2"/></rs>"#.into())
            .unwrap()
            .unwrap();
        assert_eq!(doc.root().name, "rs");
        assert_eq!(doc.root().children.len(), 2);
        assert_eq!(doc.as_str(), r#"<rs><r id="1"/><r id="2"/></rs>"#);
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(XmlDocument::parse("<rs><r></rs>".into()).is_err());
    }
}
