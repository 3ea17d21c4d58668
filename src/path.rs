//! Path utilities (spec §2, §4.5, §4.8).
//!
//! `..` is not resolved here: every SquashFS directory carries its own `.`
//! and `..` entries, so the walker resolves `..` by matching those entries
//! the same way it matches any other name. Tokenizing only needs to split
//! on `/` and drop no-op `.` segments.

/// Splits a path into non-empty, non-`.` components.
pub fn tokenize(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_owned)
        .collect()
}

/// Splits a path into `(parent_dir, file_name)`, per spec §4.8's `read`/
/// `size` contract of splitting into `(dir, file)` before opening the
/// directory.
pub fn split_parent(path: &str) -> (String, String) {
    let tokens = tokenize(path);
    match tokens.split_last() {
        Some((last, rest)) => (format!("/{}", rest.join("/")), last.clone()),
        None => ("/".to_owned(), String::new()),
    }
}

/// Joins a base directory's consumed tokens with a symlink target and the
/// remaining unconsumed tokens, per spec §4.5 step 6.
pub fn join_symlink(consumed: &[String], target: &str, remaining: &[String]) -> Vec<String> {
    let mut tokens = if target.starts_with('/') {
        Vec::new()
    } else {
        consumed.to_vec()
    };
    tokens.extend(tokenize(target));
    tokens.extend(remaining.iter().cloned());
    tokens
}
