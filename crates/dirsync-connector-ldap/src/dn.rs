//! Distinguished name helpers
//!
//! CN escaping for writes, RFC 4515 filter escaping for lookups, and
//! component-wise DN comparison.

/// Escape a common name for use as an RDN value.
///
/// Already-escaped commas are unescaped first, then the value is split on
/// commas; each segment is trimmed, empty segments are dropped and the rest
/// are re-joined with an escaped comma. Other RFC 4514 specials are escaped
/// with a backslash, a leading `#` and NUL as hex pairs.
///
/// ```
/// use dirsync_connector_ldap::dn::escape_cn;
///
/// assert_eq!(escape_cn("New, Team"), "New\\,Team");
/// assert_eq!(escape_cn(" , "), "");
/// ```
pub fn escape_cn(value: &str) -> String {
    let unescaped = value.replace("\\,", ",");
    unescaped
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(escape_segment)
        .collect::<Vec<_>>()
        .join("\\,")
}

fn escape_segment(segment: &str) -> String {
    let mut result = String::with_capacity(segment.len() * 2);

    for (i, ch) in segment.chars().enumerate() {
        match ch {
            '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            '#' if i == 0 => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Equality filter `(attribute=value)` with the value escaped.
pub fn equality_filter(attribute: &str, value: &str) -> String {
    format!("({}={})", attribute, escape_filter_value(value))
}

/// Split a DN into its components on unescaped commas.
pub fn split_dn(dn: &str) -> Vec<&str> {
    let mut components = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in dn.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                components.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    components.push(&dn[start..]);
    components
}

/// Canonical form for comparison: components trimmed, lowercased, re-joined.
pub fn normalize_dn(dn: &str) -> String {
    split_dn(dn)
        .into_iter()
        .map(|component| component.trim().to_lowercase())
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Compare two DNs component-wise, ignoring case and surrounding whitespace.
pub fn dn_equals(a: &str, b: &str) -> bool {
    normalize_dn(a) == normalize_dn(b)
}

/// Join DN fragments with commas, skipping blank ones.
pub fn join_dn(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// DN of an entry: `CN=<escaped cn>,<parent>,<base>`.
pub fn entry_dn(escaped_cn: &str, parent_dn: &str, base_dn: &str) -> String {
    join_dn(&[&format!("CN={escaped_cn}"), parent_dn, base_dn])
}

/// Display name of a group: the text between `CN=` and the first `,OU=`,
/// `,CN=` or `,DC=`, falling back to the whole DN.
pub fn group_name(dn: &str) -> String {
    // ASCII uppercasing keeps byte offsets aligned with `dn`
    let upper = dn.to_ascii_uppercase();
    let Some(start) = upper.find("CN=").map(|i| i + 3) else {
        return dn.to_string();
    };

    let end = [",OU=", ",CN=", ",DC="]
        .iter()
        .filter_map(|marker| upper[start..].find(marker))
        .min()
        .map_or(dn.len(), |offset| start + offset);

    dn[start..end].to_string()
}
