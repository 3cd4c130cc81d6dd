//! Fixed store schema.
//!
//! Every logical store maps to one SQLite table: `id` primary key, one
//! plaintext column per indexed attribute, and a `doc` column holding the
//! on-disk JSON form of the record (full record for plain stores or legacy
//! rows, envelope `{id, <attrs>, payload}` once encrypted).  The attribute
//! columns are mirrors of the same values inside `doc`, kept in sync on
//! every write so the compound indexes stay usable without decryption.
//!
//! All identifiers below are compile-time constants; they are interpolated
//! into SQL directly and never sourced from caller input.

use crate::error::StoreError;

/// Secondary ordering over a tuple of indexed attributes, scoped range
/// scans to one partition (e.g. all of a company's boletos by due date).
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    /// (partition attribute, secondary attribute)
    pub keys: (&'static str, &'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct StoreDef {
    pub name: &'static str,
    pub encrypted: bool,
    /// Attributes kept in plaintext on the envelope, in column order.
    pub indexed: &'static [&'static str],
    pub compound: Option<IndexDef>,
    /// Single-field index from schema v1, dropped during migration.
    pub legacy_index: Option<&'static str>,
}

pub const STORES: &[StoreDef] = &[
    StoreDef {
        name: "boletos",
        encrypted: true,
        indexed: &["companyId", "dueDate"],
        compound: Some(IndexDef {
            name: "idx_boletos_company_due",
            keys: ("companyId", "dueDate"),
        }),
        legacy_index: Some("idx_boletos_company"),
    },
    StoreDef {
        name: "invoices",
        encrypted: true,
        indexed: &["companyId", "issueDate"],
        compound: Some(IndexDef {
            name: "idx_invoices_company_issue",
            keys: ("companyId", "issueDate"),
        }),
        legacy_index: Some("idx_invoices_company"),
    },
    StoreDef {
        name: "categories",
        encrypted: false,
        indexed: &["companyId"],
        compound: None,
        legacy_index: None,
    },
];

/// Look up a store by name.
pub fn store_def(name: &str) -> Result<&'static StoreDef, StoreError> {
    STORES
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| StoreError::Validation(format!("unknown store '{name}'")))
}

impl StoreDef {
    /// Resolve a named compound index on this store.
    pub fn index(&self, name: &str) -> Result<&IndexDef, StoreError> {
        match &self.compound {
            Some(idx) if idx.name == name => Ok(idx),
            _ => Err(StoreError::Validation(format!(
                "unknown index '{name}' on store '{}'",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_stores_resolve() {
        assert!(store_def("boletos").unwrap().encrypted);
        assert!(!store_def("categories").unwrap().encrypted);
        assert!(matches!(
            store_def("nope"),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn compound_index_lookup() {
        let def = store_def("boletos").unwrap();
        let idx = def.index("idx_boletos_company_due").unwrap();
        assert_eq!(idx.keys, ("companyId", "dueDate"));
        assert!(def.index("idx_other").is_err());
    }
}
