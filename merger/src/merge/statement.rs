//! Generation of `insert ... on conflict` upserts from staging into target tables.

use pg_escape::quote_identifier;

use crate::error::{MergerError, MergerResult};
use crate::types::{OrderValue, RowFilter, TableName, Watermark};

/// Alias of the target table inside the generated statement.
const TARGET_ALIAS: &str = "t";

/// Column layout of a staging/target pair.
#[derive(Debug, Clone, Copy)]
pub struct MergeColumns<'a> {
    /// Target columns in ordinal order.
    pub target: &'a [String],
    /// Staging columns in any order.
    pub staging: &'a [String],
    /// Target primary key columns in key order.
    pub key: &'a [String],
}

/// A generated upsert and the watermark bound as `$1`, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    sql: String,
    watermark: Option<OrderValue>,
}

impl UpsertStatement {
    /// Generates the upsert of the staging rows passing `filter` into `target`.
    ///
    /// Merged columns are the staging columns also present in the target, in target
    /// order. Rows conflict on the target primary key and existing rows are updated
    /// only when one of the merged columns differs.
    pub fn build(
        target: &TableName,
        staging: &TableName,
        columns: MergeColumns<'_>,
        filter: Option<&RowFilter>,
    ) -> MergerResult<Self> {
        let generation_error = |reason: String| MergerError::MergeGeneration {
            target: target.clone(),
            staging: staging.clone(),
            reason,
        };

        if columns.key.is_empty() {
            return Err(generation_error(
                "target table has no primary key".to_string(),
            ));
        }
        if let Some(missing) = columns
            .key
            .iter()
            .find(|key| !columns.staging.contains(key))
        {
            return Err(generation_error(format!(
                "primary key column `{missing}` is missing from staging"
            )));
        }

        let shared: Vec<&String> = columns
            .target
            .iter()
            .filter(|column| columns.staging.contains(column))
            .collect();
        if shared.is_empty() {
            return Err(generation_error(
                "staging and target share no columns".to_string(),
            ));
        }

        let column_list = join_quoted(shared.iter().map(|column| column.as_str()));
        let key_list = join_quoted(columns.key.iter().map(String::as_str));

        let (where_clause, watermark) = match filter {
            None => (String::new(), None),
            Some(RowFilter {
                watermark: Watermark::Floor,
                ..
            }) => ("\nwhere false".to_string(), None),
            Some(RowFilter {
                column,
                watermark: Watermark::Value(value),
            }) => (
                format!("\nwhere {} < $1", quote_identifier(column)),
                Some(value.clone()),
            ),
        };

        let updated: Vec<&str> = shared
            .iter()
            .map(|column| column.as_str())
            .filter(|column| !columns.key.iter().any(|key| key == column))
            .collect();
        let conflict_action = if updated.is_empty() {
            "do nothing".to_string()
        } else {
            let assignments = updated
                .iter()
                .map(|column| {
                    let column = quote_identifier(column);
                    format!("{column} = excluded.{column}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            let current = updated
                .iter()
                .map(|column| format!("{TARGET_ALIAS}.{}", quote_identifier(column)))
                .collect::<Vec<_>>()
                .join(", ");
            let incoming = updated
                .iter()
                .map(|column| format!("excluded.{}", quote_identifier(column)))
                .collect::<Vec<_>>()
                .join(", ");

            format!(
                "do update set {assignments}\nwhere ({current}) is distinct from ({incoming})"
            )
        };

        let sql = format!(
            "insert into {} as {TARGET_ALIAS} ({column_list})\n\
             select {column_list}\n\
             from {}{where_clause}\n\
             on conflict ({key_list}) {conflict_action}",
            target.as_quoted_identifier(),
            staging.as_quoted_identifier(),
        );

        Ok(Self { sql, watermark })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Value to bind as `$1`, present for statements filtered by a concrete watermark.
    pub fn watermark(&self) -> Option<&OrderValue> {
        self.watermark.as_ref()
    }
}

fn join_quoted<'a>(columns: impl Iterator<Item = &'a str>) -> String {
    columns
        .map(|column| quote_identifier(column).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|column| column.to_string()).collect()
    }

    fn tables() -> (TableName, TableName) {
        (
            TableName::new("sales", "orders"),
            TableName::new("sales", "orders_staging"),
        )
    }

    #[test]
    fn test_filtered_upsert() {
        let (target, staging) = tables();
        let target_columns = names(&["id", "amount", "updated_at"]);
        let staging_columns = names(&["updated_at", "id", "amount", "loaded_by"]);
        let key = names(&["id"]);
        let filter = RowFilter::below("updated_at", Watermark::Value(OrderValue::Int(42)));

        let statement = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &target_columns,
                staging: &staging_columns,
                key: &key,
            },
            Some(&filter),
        )
        .unwrap();

        assert_eq!(
            statement.sql(),
            "insert into sales.orders as t (id, amount, updated_at)\n\
             select id, amount, updated_at\n\
             from sales.orders_staging\n\
             where updated_at < $1\n\
             on conflict (id) do update set amount = excluded.amount, updated_at = excluded.updated_at\n\
             where (t.amount, t.updated_at) is distinct from (excluded.amount, excluded.updated_at)"
        );
        assert_eq!(statement.watermark(), Some(&OrderValue::Int(42)));
    }

    #[test]
    fn test_unfiltered_upsert_has_no_where_clause() {
        let (target, staging) = tables();
        let columns = names(&["id", "amount"]);
        let key = names(&["id"]);

        let statement = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &columns,
                staging: &columns,
                key: &key,
            },
            None,
        )
        .unwrap();

        assert!(statement.sql().contains("from sales.orders_staging\non conflict (id)"));
        assert_eq!(statement.watermark(), None);
    }

    #[test]
    fn test_key_only_tables_do_nothing_on_conflict() {
        let (target, staging) = tables();
        let columns = names(&["tenant", "id"]);

        let statement = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &columns,
                staging: &columns,
                key: &columns,
            },
            None,
        )
        .unwrap();

        assert!(statement.sql().ends_with("on conflict (tenant, id) do nothing"));
    }

    #[test]
    fn test_floor_watermark_selects_nothing() {
        let (target, staging) = tables();
        let columns = names(&["id", "amount"]);
        let key = names(&["id"]);
        let filter = RowFilter::below("id", Watermark::Floor);

        let statement = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &columns,
                staging: &columns,
                key: &key,
            },
            Some(&filter),
        )
        .unwrap();

        assert!(statement.sql().contains("where false"));
        assert_eq!(statement.watermark(), None);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let target = TableName::new("sales", "Order Lines");
        let staging = TableName::new("sales", "Order Lines Staging");
        let columns = names(&["Line Id", "qty"]);
        let key = names(&["Line Id"]);

        let statement = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &columns,
                staging: &columns,
                key: &key,
            },
            None,
        )
        .unwrap();

        assert!(
            statement
                .sql()
                .starts_with(r#"insert into sales."Order Lines" as t ("Line Id", qty)"#)
        );
        assert!(statement.sql().contains(r#"on conflict ("Line Id")"#));
    }

    #[test]
    fn test_missing_primary_key_is_a_generation_error() {
        let (target, staging) = tables();
        let columns = names(&["id", "amount"]);

        let err = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &columns,
                staging: &columns,
                key: &[],
            },
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MergeGeneration);
    }

    #[test]
    fn test_key_missing_from_staging_is_a_generation_error() {
        let (target, staging) = tables();
        let target_columns = names(&["id", "amount"]);
        let staging_columns = names(&["amount"]);
        let key = names(&["id"]);

        let err = UpsertStatement::build(
            &target,
            &staging,
            MergeColumns {
                target: &target_columns,
                staging: &staging_columns,
                key: &key,
            },
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MergerError::MergeGeneration { reason, .. } if reason.contains("`id`")
        ));
    }
}
