//! SQL access filter produced for a signed-in identity

use std::collections::BTreeSet;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

use super::identity::SignedInUser;
use crate::domain::DomainError;

/// Which ids an access filter lets through
#[derive(Debug, Clone, PartialEq, Eq)]
enum Visible {
    All,
    Nothing,
    Ids(BTreeSet<i64>),
}

/// A predicate restricting visible rows, as a `(where_clause, args)` pair
///
/// The clause uses `?` placeholders, one per entry in `args`. Stores splice
/// it into their queries without interpreting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFilter {
    where_clause: String,
    args: Vec<i64>,
    visible: Visible,
}

impl AccessFilter {
    /// Filter that lets every row through
    pub fn allow_all() -> Self {
        Self {
            where_clause: " 1 = 1".to_string(),
            args: Vec::new(),
            visible: Visible::All,
        }
    }

    /// Filter that lets no row through
    pub fn deny_all() -> Self {
        Self {
            where_clause: " 1 = 0".to_string(),
            args: Vec::new(),
            visible: Visible::Nothing,
        }
    }

    /// Filter restricting `column` to the given ids
    pub fn ids(column: &str, ids: impl IntoIterator<Item = i64>) -> Self {
        let ids: BTreeSet<i64> = ids.into_iter().collect();

        if ids.is_empty() {
            return Self::deny_all();
        }

        let placeholders = vec!["?"; ids.len()].join(", ");

        Self {
            where_clause: format!(" {} IN ({})", column, placeholders),
            args: ids.iter().copied().collect(),
            visible: Visible::Ids(ids),
        }
    }

    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    pub fn args(&self) -> &[i64] {
        &self.args
    }

    /// Whether a row with this id passes the filter
    pub fn permits(&self, id: i64) -> bool {
        match &self.visible {
            Visible::All => true,
            Visible::Nothing => false,
            Visible::Ids(ids) => ids.contains(&id),
        }
    }
}

/// Produces access filters from a signed-in identity's permissions
#[cfg_attr(test, automock)]
pub trait AccessFilterProvider: Send + Sync + Debug {
    /// Build a filter over `column` for ids the user may perform `action` on,
    /// where scopes naming an id look like `<prefix><id>`
    fn filter(
        &self,
        user: &SignedInUser,
        column: &str,
        prefix: &str,
        action: &str,
    ) -> Result<AccessFilter, DomainError>;
}
