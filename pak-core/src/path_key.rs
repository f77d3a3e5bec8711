/*!
Helpers for dot-separated key paths such as `"player.inventory.gold"`.
*/

/// Separator between path segments
pub const SEPARATOR: char = '.';

/// Split a dotted path into all of its segments.
///
/// An empty string is a single empty segment, matching how a plain key is treated.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).collect()
}

/// Split a dotted path into its branch segments and its final leaf segment.
///
/// # Example
/// ```rust
/// use pak_core::path_key;
///
/// let (branches, leaf) = path_key::split("a.b.c");
/// assert_eq!(branches, vec!["a", "b"]);
/// assert_eq!(leaf, "c");
/// ```
pub fn split(path: &str) -> (Vec<&str>, &str) {
    match path.rsplit_once(SEPARATOR) {
        Some((branch, leaf)) => (segments(branch), leaf),
        None => (Vec::new(), path),
    }
}

/// Join segments back into a dotted path.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            joined.push(SEPARATOR);
        }
        joined.push_str(segment.as_ref());
    }
    joined
}

/// Append a key to a prefix path, treating an empty prefix as the root.
pub fn child(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{key}")
    }
}
