//! Path resolver: logical WebDAV resource paths to SFTP absolute paths.
//!
//! All paths are rooted at the directory the bridge exports. Hidden-entry
//! exclusion happens here, at resolution time, so no other layer has to
//! remember the policy.

use crate::error::{BridgeError, Result};

/// Marker for hidden entries, covering dotfiles and the `.`/`..`
/// pseudo-entries SFTP servers report in listings.
pub const HIDDEN_MARKER: char = '.';

/// True if a directory-entry name is hidden from WebDAV clients.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_MARKER)
}

/// An immutable, normalized, slash-separated remote path.
///
/// Invariants: always absolute, no empty or redundant segments, no trailing
/// slash except for the root itself. Hidden segments cannot be introduced
/// through [`SftpPath::child`]; the only way to get one is through the
/// configured export root, which is operator input and not client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpPath(String);

impl SftpPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize an operator-supplied path (collapses redundant separators,
    /// drops trailing slashes). Used for the export root only.
    pub fn new(raw: &str) -> Self {
        let mut out = String::from("/");
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if out.len() > 1 {
                out.push('/');
            }
            out.push_str(segment);
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Final path segment; the empty sentinel for the root.
    pub fn base_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    pub fn parent(&self) -> Option<SftpPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(SftpPath::root()),
            Some(idx) => Some(SftpPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Resolve a child entry under this path.
    ///
    /// Hidden names are rejected with a policy error that the protocol
    /// boundary reports as not-found, never as forbidden, so a client cannot
    /// probe for the existence of hidden entries. Names containing a
    /// separator or NUL are rejected outright.
    pub fn child(&self, name: &str) -> Result<SftpPath> {
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(BridgeError::InvalidName(name.to_string()));
        }
        if is_hidden(name) {
            return Err(BridgeError::Hidden(name.to_string()));
        }
        if self.is_root() {
            Ok(SftpPath(format!("/{name}")))
        } else {
            Ok(SftpPath(format!("{}/{name}", self.0)))
        }
    }

    /// Sibling path with the final segment replaced, for rename.
    pub fn sibling(&self, name: &str) -> Result<SftpPath> {
        match self.parent() {
            Some(parent) => parent.child(name),
            None => Err(BridgeError::InvalidName(name.to_string())),
        }
    }
}

impl std::fmt::Display for SftpPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_redundant_separators() {
        assert_eq!(SftpPath::new("").as_str(), "/");
        assert_eq!(SftpPath::new("/").as_str(), "/");
        assert_eq!(SftpPath::new("//data//inner/").as_str(), "/data/inner");
        assert_eq!(SftpPath::new("data").as_str(), "/data");
    }

    #[test]
    fn base_name_of_root_is_empty_sentinel() {
        assert_eq!(SftpPath::root().base_name(), "");
        assert_eq!(SftpPath::new("/data/a.txt").base_name(), "a.txt");
    }

    #[test]
    fn child_concatenates_with_single_separator() {
        let root = SftpPath::root();
        let data = root.child("data").unwrap();
        assert_eq!(data.as_str(), "/data");
        assert_eq!(data.child("a.txt").unwrap().as_str(), "/data/a.txt");
    }

    #[test]
    fn child_rejects_hidden_names() {
        let root = SftpPath::root();
        assert!(matches!(
            root.child(".secret"),
            Err(BridgeError::Hidden(_))
        ));
        assert!(matches!(root.child("."), Err(BridgeError::Hidden(_))));
        assert!(matches!(root.child(".."), Err(BridgeError::Hidden(_))));
    }

    #[test]
    fn child_rejects_separators_and_empty() {
        let root = SftpPath::root();
        assert!(matches!(root.child(""), Err(BridgeError::InvalidName(_))));
        assert!(matches!(
            root.child("a/b"),
            Err(BridgeError::InvalidName(_))
        ));
        assert!(matches!(
            root.child("a\0b"),
            Err(BridgeError::InvalidName(_))
        ));
    }

    #[test]
    fn parent_and_sibling() {
        let file = SftpPath::new("/data/a.txt");
        assert_eq!(file.parent().unwrap().as_str(), "/data");
        assert_eq!(file.sibling("b.txt").unwrap().as_str(), "/data/b.txt");
        assert_eq!(SftpPath::new("/top").parent().unwrap().as_str(), "/");
        assert!(SftpPath::root().parent().is_none());
        assert!(SftpPath::root().sibling("x").is_err());
    }
}
