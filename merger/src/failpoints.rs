//! Named failpoints at the chunk boundaries of a batched run.
//!
//! Compiled to no-ops unless the `failpoints` feature is enabled.

use fail::fail_point;

use crate::error::{MergerError, MergerResult};

/// Evaluated after the watermark is resolved, before the chunk is merged.
pub const BEFORE_MERGE: &str = "batch_merge.before_merge";

/// Evaluated after the chunk is merged, before it is purged from staging.
pub const BEFORE_PURGE: &str = "batch_merge.before_purge";

/// Evaluated before a best-effort setup statement is executed.
pub const BEFORE_SETUP: &str = "setup.before_statement";

/// Returns an error when the failpoint `name` is configured to `return`.
///
/// The optional parameter becomes the error message, e.g. `return(connection reset)`.
pub fn merger_fail_point(name: &str) -> MergerResult<()> {
    fail_point!(name, |parameter: Option<String>| {
        let message = parameter.unwrap_or_else(|| "an error occurred in a fail point".to_string());

        Err(MergerError::Store(format!(
            "The failpoint '{name}' returned an error: {message}"
        )))
    });

    Ok(())
}
