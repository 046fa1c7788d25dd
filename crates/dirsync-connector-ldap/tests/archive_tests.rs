//! Integration tests for the archive use cases.

mod common;

use common::*;
use dirsync_connector::prelude::*;
use dirsync_connector_ldap::AdConnector;

const JDOE_DN: &str = "CN=John Doe,OU=Users,DC=corp,DC=com";
const SALES_DN: &str = "CN=Sales,OU=Groups,DC=corp,DC=com";
const SUPPORT_DN: &str = "CN=Support,OU=Groups,DC=corp,DC=com";
const EMPTY_DN: &str = "CN=Empty,OU=Groups,DC=corp,DC=com";

fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(
            JDOE_DN,
            "jdoe",
            &[("userAccountControl", AttributeValue::from("512"))],
        )
        .with_group(SALES_DN, "sales", &[JDOE_DN])
        .with_group(SUPPORT_DN, "support", &[JDOE_DN])
        .with_group(EMPTY_DN, "empty", &[])
}

fn connector(directory: MemoryDirectory) -> AdConnector<MemoryDirectory> {
    AdConnector::new(test_config(), directory).unwrap()
}

/// Tests that archiving drops memberships first, then writes attributes,
/// then moves the entry.
#[tokio::test]
async fn test_archive_user_order() {
    let mut connector = connector(directory());
    let desired = AttributeStore::new()
        .with("userAccountControl", "514")
        .with("description", "Archived");

    let report = connector
        .archive_user(JDOE_DN, "jdoe", desired, "OU=Archive")
        .await
        .unwrap();

    let archived_dn = "CN=John Doe,OU=Archive,DC=corp,DC=com";
    assert_eq!(report.dn, archived_dn);
    assert!(report.is_success(), "unexpected errors: {:?}", report.errors);

    let directory = connector.into_session();
    let writes = directory.writes();
    assert_eq!(writes.len(), 5);
    assert_eq!(
        writes[0],
        &Call::Modify {
            dn: SALES_DN.to_string(),
            modification: Modification::delete("member", JDOE_DN),
        }
    );
    assert_eq!(
        writes[1],
        &Call::Modify {
            dn: SUPPORT_DN.to_string(),
            modification: Modification::delete("member", JDOE_DN),
        }
    );
    assert!(matches!(writes[2], Call::Modify { dn, .. } if dn == JDOE_DN));
    assert!(matches!(writes[3], Call::Modify { dn, .. } if dn == JDOE_DN));
    assert!(matches!(writes[4], Call::Rename { .. }));

    assert!(directory.value(SALES_DN, "member").is_none());
    assert!(directory.value(SUPPORT_DN, "member").is_none());
    assert!(directory.value(archived_dn, "memberOf").is_none());
    assert_eq!(
        directory.value(archived_dn, "userAccountControl"),
        Some(&AttributeValue::from("514"))
    );
}

/// Tests that a failed membership removal is reported and the archive
/// still completes.
#[tokio::test]
async fn test_archive_user_membership_failure_is_recorded() {
    let directory =
        directory().fail_attribute(SALES_DN, "member", 50, "Insufficient Access Rights");
    let mut connector = connector(directory);

    let report = connector
        .archive_user(JDOE_DN, "jdoe", AttributeStore::new(), "OU=Archive")
        .await
        .unwrap();

    assert_eq!(report.dn, "CN=John Doe,OU=Archive,DC=corp,DC=com");
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors["memberOf (Sales)"].contains("Insufficient Access Rights"));

    let directory = connector.into_session();
    assert!(directory.value(SUPPORT_DN, "member").is_none());
    assert_eq!(directory.renames().len(), 1);
}

/// Tests that archiving an unknown user fails without writing.
#[tokio::test]
async fn test_archive_user_not_found() {
    let mut connector = connector(directory());

    let err = connector
        .archive_user("", "ghost", AttributeStore::new(), "OU=Archive")
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::ObjectNotFound { .. }));
    assert!(connector.session().writes().is_empty());
}

/// Tests that archiving a group removes all members before moving it.
#[tokio::test]
async fn test_archive_group_clears_members_then_moves() {
    let mut connector = connector(directory());

    let report = connector
        .archive_group(SALES_DN, "sales", "OU=Archive")
        .await
        .unwrap();

    let archived_dn = "CN=Sales,OU=Archive,DC=corp,DC=com";
    assert_eq!(report.dn, archived_dn);
    assert!(report.is_success());

    let directory = connector.into_session();
    let writes = directory.writes();
    assert_eq!(
        writes[0],
        &Call::Modify {
            dn: SALES_DN.to_string(),
            modification: Modification::delete_all("member"),
        }
    );
    assert!(matches!(writes[1], Call::Rename { .. }));

    assert!(directory.value(archived_dn, "member").is_none());
    assert_eq!(
        directory.strings(JDOE_DN, "memberOf"),
        strings(&[SUPPORT_DN])
    );
}

/// Tests that a group without members is still moved.
#[tokio::test]
async fn test_archive_group_without_members() {
    let mut connector = connector(directory());

    let report = connector
        .archive_group(EMPTY_DN, "empty", "OU=Archive")
        .await
        .unwrap();

    assert_eq!(report.dn, "CN=Empty,OU=Archive,DC=corp,DC=com");
    assert_eq!(connector.session().renames().len(), 1);
}

/// Tests that a failed move aborts the group archive.
#[tokio::test]
async fn test_archive_group_rename_failure() {
    let directory = directory().fail(Op::Rename, SALES_DN, 53, "Unwilling To Perform");
    let mut connector = connector(directory);

    let err = connector
        .archive_group(SALES_DN, "sales", "OU=Archive")
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::RenameFailed { .. }));
    assert!(err.to_string().contains("Unwilling To Perform"));
}
