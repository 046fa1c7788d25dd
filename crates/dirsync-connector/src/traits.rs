//! Directory session trait
//!
//! The seam between the reconciliation engine and the wire protocol. A session
//! is owned by one use case at a time, so every method takes `&mut self`.

use async_trait::async_trait;

use crate::attribute::AttributeStore;
use crate::error::ConnectorResult;
use crate::operation::{DirectoryEntry, Modification, SearchScope};

/// A connected, authenticated directory session.
#[async_trait]
pub trait DirectorySession: Send {
    /// Search for entries.
    ///
    /// # Arguments
    /// * `base_dn` - Search base
    /// * `scope` - Search scope
    /// * `filter` - LDAP filter string, already escaped
    /// * `attributes` - Attributes to return
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> ConnectorResult<Vec<DirectoryEntry>>;

    /// Create an entry with the given attributes.
    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> ConnectorResult<()>;

    /// Apply one modification to an entry.
    async fn modify(&mut self, dn: &str, modification: &Modification) -> ConnectorResult<()>;

    /// Rename and/or move an entry.
    ///
    /// `new_rdn` is the full RDN (`CN=...`); `new_parent_dn` the full parent DN.
    async fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent_dn: &str,
        delete_old_rdn: bool,
    ) -> ConnectorResult<()>;

    /// Search and return the first entry, if any.
    async fn search_one(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> ConnectorResult<Option<DirectoryEntry>> {
        let entries = self
            .search(base_dn, SearchScope::Subtree, filter, attributes)
            .await?;
        Ok(entries.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;

    // Mock session returning a fixed set of entries
    struct MockSession {
        entries: Vec<DirectoryEntry>,
        searches: usize,
    }

    #[async_trait]
    impl DirectorySession for MockSession {
        async fn search(
            &mut self,
            _base_dn: &str,
            _scope: SearchScope,
            _filter: &str,
            _attributes: &[String],
        ) -> ConnectorResult<Vec<DirectoryEntry>> {
            self.searches += 1;
            Ok(self.entries.clone())
        }

        async fn add(&mut self, _dn: &str, _attributes: &AttributeStore) -> ConnectorResult<()> {
            Err(ConnectorError::internal("read-only"))
        }

        async fn modify(&mut self, _dn: &str, _modification: &Modification) -> ConnectorResult<()> {
            Err(ConnectorError::internal("read-only"))
        }

        async fn rename(
            &mut self,
            _dn: &str,
            _new_rdn: &str,
            _new_parent_dn: &str,
            _delete_old_rdn: bool,
        ) -> ConnectorResult<()> {
            Err(ConnectorError::internal("read-only"))
        }
    }

    #[tokio::test]
    async fn test_search_one_returns_first() {
        let mut session = MockSession {
            entries: vec![
                DirectoryEntry::new("CN=A,DC=corp", AttributeStore::new()),
                DirectoryEntry::new("CN=B,DC=corp", AttributeStore::new()),
            ],
            searches: 0,
        };
        let entry = session
            .search_one("DC=corp", "(cn=*)", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.dn, "CN=A,DC=corp");
        assert_eq!(session.searches, 1);
    }

    #[tokio::test]
    async fn test_search_one_empty() {
        let mut session = MockSession {
            entries: vec![],
            searches: 0,
        };
        assert!(session
            .search_one("DC=corp", "(cn=*)", &[])
            .await
            .unwrap()
            .is_none());
    }
}
