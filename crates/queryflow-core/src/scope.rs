//! Name resolution for the sources of one SELECT.
//!
//! Both the graph builder and the lineage extractor resolve table qualifiers the same
//! way: through a case-insensitive alias map, defaulting to the only source when exactly
//! one is in scope, otherwise keeping the qualifier as written.

use std::collections::HashMap;

use crate::ast::{FromItem, SelectStatement};

/// A FROM entry as seen by name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    /// Table name as written, or the alias of a derived table.
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceScope {
    entries: Vec<ScopeEntry>,
    /// Lower-cased alias, name, or unqualified name → index into `entries`.
    lookup: HashMap<String, usize>,
}

impl SourceScope {
    pub fn from_select(select: &SelectStatement) -> Self {
        Self::from_items(&select.from)
    }

    pub fn from_items(items: &[FromItem]) -> Self {
        let mut scope = Self::default();
        for item in items {
            scope.push(item.source_name(), item.alias.clone());
        }
        scope
    }

    pub fn push(&mut self, name: String, alias: Option<String>) {
        let index = self.entries.len();
        // Aliases shadow table names; earlier entries win among equals.
        if let Some(alias) = &alias {
            self.lookup.insert(alias.to_lowercase(), index);
        }
        self.lookup.entry(name.to_lowercase()).or_insert(index);
        if let Some((_, unqualified)) = name.rsplit_once('.') {
            self.lookup.entry(unqualified.to_lowercase()).or_insert(index);
        }
        self.entries.push(ScopeEntry { name, alias });
    }

    pub fn entries(&self) -> &[ScopeEntry] {
        &self.entries
    }

    /// The single source in scope, if there is exactly one.
    pub fn sole(&self) -> Option<&ScopeEntry> {
        match self.entries.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Looks up an alias or table name.
    pub fn lookup(&self, token: &str) -> Option<&ScopeEntry> {
        self.lookup
            .get(&token.to_lowercase())
            .map(|&index| &self.entries[index])
    }

    /// Resolves the table a column reference belongs to.
    ///
    /// Known qualifiers map to their source name. Unknown qualifiers resolve to the sole
    /// source when there is one and are otherwise kept as written. Unqualified references
    /// resolve only when a single source is in scope.
    pub fn resolve_table(&self, qualifier: Option<&str>) -> Option<String> {
        match qualifier {
            Some(token) => Some(
                self.lookup(token)
                    .or_else(|| self.sole())
                    .map(|entry| entry.name.clone())
                    .unwrap_or_else(|| token.to_string()),
            ),
            None => self.sole().map(|entry| entry.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FromItem;

    fn scope(items: Vec<FromItem>) -> SourceScope {
        SourceScope::from_items(&items)
    }

    #[test]
    fn test_alias_resolution_is_case_insensitive() {
        let scope = scope(vec![
            FromItem::table("customers").with_alias("c"),
            FromItem::table("orders").with_alias("o"),
        ]);
        assert_eq!(scope.resolve_table(Some("O")).as_deref(), Some("orders"));
        assert_eq!(scope.resolve_table(Some("customers")).as_deref(), Some("customers"));
    }

    #[test]
    fn test_unqualified_reference_uses_sole_table() {
        let single = scope(vec![FromItem::table("orders")]);
        assert_eq!(single.resolve_table(None).as_deref(), Some("orders"));

        let multi = scope(vec![FromItem::table("a"), FromItem::table("b")]);
        assert_eq!(multi.resolve_table(None), None);
    }

    #[test]
    fn test_unknown_qualifier_kept_with_multiple_tables() {
        let multi = scope(vec![FromItem::table("a"), FromItem::table("b")]);
        assert_eq!(multi.resolve_table(Some("x")).as_deref(), Some("x"));

        let single = scope(vec![FromItem::table("orders").with_alias("o")]);
        assert_eq!(single.resolve_table(Some("x")).as_deref(), Some("orders"));
    }

    #[test]
    fn test_unqualified_name_of_schema_table() {
        let mut scope = SourceScope::default();
        scope.push("sales.orders".to_string(), None);
        scope.push("customers".to_string(), None);
        assert_eq!(scope.resolve_table(Some("orders")).as_deref(), Some("sales.orders"));
    }
}
