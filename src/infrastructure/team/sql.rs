//! Helpers shared by the SQL team store

use sqlx::{Postgres, QueryBuilder};

use crate::domain::AccessFilter;

/// Splices an access filter into a query, rebinding its `?` placeholders
pub fn push_access_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AccessFilter) {
    let mut args = filter.args().iter();
    let mut segments = filter.where_clause().split('?').peekable();

    while let Some(segment) = segments.next() {
        builder.push(segment);

        if segments.peek().is_some() {
            match args.next() {
                Some(arg) => {
                    builder.push_bind(*arg);
                }
                None => {
                    builder.push("NULL");
                }
            }
        }
    }
}

/// `LIKE` pattern matching `query` anywhere, with wildcards in it escaped
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');

    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }

    pattern.push('%');
    pattern
}

/// Whether the error is a unique constraint violation
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_ids_filter() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM team WHERE org_id = ");
        builder.push_bind(1_i64);
        builder.push(" AND (");
        push_access_filter(&mut builder, &AccessFilter::ids("team.id", [4, 2]));
        builder.push(")");

        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM team WHERE org_id = $1 AND ( team.id IN ($2, $3))"
        );
    }

    #[test]
    fn test_push_constant_filters() {
        let mut builder = QueryBuilder::<Postgres>::new("WHERE");
        push_access_filter(&mut builder, &AccessFilter::deny_all());
        assert_eq!(builder.sql(), "WHERE 1 = 0");

        let mut builder = QueryBuilder::<Postgres>::new("WHERE");
        push_access_filter(&mut builder, &AccessFilter::allow_all());
        assert_eq!(builder.sql(), "WHERE 1 = 1");
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("ops"), "%ops%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(""), "%%");
    }
}
