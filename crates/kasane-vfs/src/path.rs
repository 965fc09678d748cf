//! Virtual paths.
//!
//! A [`VirtualPath`] is an ordered list of name components below the virtual
//! root. It is the unit of comparison for mount prefixes, archive index keys
//! and node identity. Parsing is lexical only: separators are collapsed, but
//! `.` and `..` are kept as ordinary components; the resolver interprets them.

use std::fmt;

/// Separator used in virtual path strings.
pub const SEPARATOR: char = '/';

/// A normalized virtual path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// The virtual root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string. Leading, trailing and repeated separators are
    /// ignored, so `"lib"`, `"/lib/"` and `"//lib"` all parse the same.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Build from already-split components.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last component, or `""` for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The path with its last component removed. The root is its own parent.
    pub fn parent(&self) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Append one component.
    pub fn join(&self, name: &str) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Append every component of `rest`.
    pub fn concat(&self, rest: &VirtualPath) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.extend(rest.segments.iter().cloned());
        Self { segments }
    }

    /// Component-wise prefix test: `/lib` starts `/lib/x` but not `/library`.
    /// Every path starts with itself.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_strictly_under(&self, ancestor: &VirtualPath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    /// Components after `prefix`, if `prefix` is a prefix of `self`.
    pub fn strip_prefix(&self, prefix: &VirtualPath) -> Option<&[String]> {
        self.segments.strip_prefix(prefix.segments.as_slice())
    }

    /// The component of `self` immediately below `ancestor`, if `self` is
    /// strictly under it. Used to synthesize one navigable step towards a
    /// deeper mount point or index key.
    pub fn next_below(&self, ancestor: &VirtualPath) -> Option<&str> {
        if self.is_strictly_under(ancestor) {
            Some(self.segments[ancestor.segments.len()].as_str())
        } else {
            None
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "{SEPARATOR}{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for VirtualPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_separators() {
        assert_eq!(VirtualPath::parse("lib"), VirtualPath::parse("/lib/"));
        assert_eq!(VirtualPath::parse("//lib//x"), VirtualPath::parse("/lib/x"));
        assert!(VirtualPath::parse("").is_root());
        assert!(VirtualPath::parse("///").is_root());
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualPath::root().to_string(), "/");
        assert_eq!(VirtualPath::parse("a/b/c").to_string(), "/a/b/c");
    }

    #[test]
    fn test_component_prefix() {
        let lib = VirtualPath::parse("/lib");
        assert!(VirtualPath::parse("/lib/x").starts_with(&lib));
        assert!(lib.starts_with(&lib));
        assert!(!VirtualPath::parse("/library").starts_with(&lib));
        assert!(lib.starts_with(&VirtualPath::root()));
    }

    #[test]
    fn test_strictly_under() {
        let lib = VirtualPath::parse("/lib");
        assert!(VirtualPath::parse("/lib/x").is_strictly_under(&lib));
        assert!(!lib.is_strictly_under(&lib));
        assert!(!VirtualPath::root().is_strictly_under(&lib));
    }

    #[test]
    fn test_next_below() {
        let mount = VirtualPath::parse("/a/b/c");
        assert_eq!(mount.next_below(&VirtualPath::root()), Some("a"));
        assert_eq!(mount.next_below(&VirtualPath::parse("/a")), Some("b"));
        assert_eq!(mount.next_below(&mount), None);
        assert_eq!(mount.next_below(&VirtualPath::parse("/x")), None);
    }

    #[test]
    fn test_parent_and_join() {
        let p = VirtualPath::parse("/a/b");
        assert_eq!(p.parent(), VirtualPath::parse("/a"));
        assert_eq!(p.parent().join("b"), p);
        assert!(VirtualPath::root().parent().is_root());
        assert_eq!(p.name(), "b");
    }

    #[test]
    fn test_strip_prefix() {
        let p = VirtualPath::parse("/lib/x/y.txt");
        let rest = p.strip_prefix(&VirtualPath::parse("/lib")).unwrap();
        assert_eq!(rest, ["x".to_string(), "y.txt".to_string()]);
        assert!(p.strip_prefix(&VirtualPath::parse("/other")).is_none());
    }
}
