//! Query functions, one module per table.

pub mod content;
pub mod users;

/// Return `true` if `err` wraps a PostgreSQL unique-constraint violation.
///
/// Query functions return `anyhow::Error`; callers that need to turn a
/// duplicate key into a user-facing conflict use this to look through the
/// context chain.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db| db.is_unique_violation())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_not_unique_violations() {
        let err = anyhow::anyhow!("boom");
        assert!(!is_unique_violation(&err));

        let err = anyhow::Error::new(sqlx::Error::RowNotFound).context("lookup failed");
        assert!(!is_unique_violation(&err));
    }
}
