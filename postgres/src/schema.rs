use std::fmt;

use pg_escape::quote_identifier;

/// Fully qualified Postgres table name with schema and table components.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// The schema name containing the table.
    pub schema: String,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableName {
    /// Creates a new [`TableName`] with the given schema and table name.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }

    /// Returns `schema_name` with brackets and quotes stripped, usable inside
    /// constraint and index names.
    pub fn simplified(&self) -> String {
        format!("{}_{}", self.schema, self.name)
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '"'))
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_identifier_escapes_when_needed() {
        let table = TableName::new("sales", "Order Lines");

        assert_eq!(table.as_quoted_identifier(), r#"sales."Order Lines""#);
    }

    #[test]
    fn test_simplified_strips_brackets_and_dots() {
        let table = TableName::new("[dbo]", "[sales.orders]");

        assert_eq!(table.simplified(), "dbo_sales_orders");
    }
}
