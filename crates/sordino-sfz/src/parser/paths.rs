//! Path composition for sample references.
//!
//! SFZ files are routinely authored on Windows, so backslashes are treated
//! as separators everywhere and normalized to forward slashes. Joined paths
//! are simplified (separator runs collapsed, trailing separator trimmed) so
//! that the instrument's sample table can deduplicate on them.

use std::path::Path;

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Collapse separator runs to a single `/` and drop any trailing separator.
pub fn simplify_path(path: &str) -> String {
    let mut simple = String::with_capacity(path.len());
    let mut was_separator = false;
    for c in path.chars() {
        if is_separator(c) {
            if !was_separator {
                simple.push('/');
            }
            was_separator = true;
        } else {
            simple.push(c);
            was_separator = false;
        }
    }
    if simple.len() > 1 && simple.ends_with('/') {
        simple.pop();
    }
    simple
}

/// Final component of a path.
pub fn file_name(path: &str) -> String {
    let simple = simplify_path(path);
    match simple.rfind('/') {
        Some(index) => simple[index + 1..].to_string(),
        None => simple,
    }
}

/// Final component with its extension removed.
pub fn file_name_without_extension(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(index) => name[..index].to_string(),
        None => name,
    }
}

/// Join a directory and a file path.
///
/// An absolute or empty-directory file path is returned as-is (simplified);
/// everything else becomes `dir/file`.
pub fn child_path(dir: &str, file: &str) -> String {
    let file_simple = simplify_path(file);
    if dir.is_empty() || Path::new(&file_simple).is_absolute() {
        return file_simple;
    }
    simplify_path(&format!("{}/{}", simplify_path(dir), file_simple))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_path() {
        assert_eq!(simplify_path("a//b///c"), "a/b/c");
        assert_eq!(simplify_path("a\\b\\c"), "a/b/c");
        assert_eq!(simplify_path("a/b/"), "a/b");
        assert_eq!(simplify_path("/a"), "/a");
        assert_eq!(simplify_path(""), "");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("samples/piano/C4.wav"), "C4.wav");
        assert_eq!(file_name("samples\\piano\\C4.wav"), "C4.wav");
        assert_eq!(file_name("C4.wav"), "C4.wav");
    }

    #[test]
    fn test_file_name_without_extension() {
        assert_eq!(file_name_without_extension("samples/piano.sfz"), "piano");
        assert_eq!(file_name_without_extension("piano"), "piano");
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("samples", "C4.wav"), "samples/C4.wav");
        assert_eq!(child_path("samples/", "C4.wav"), "samples/C4.wav");
        assert_eq!(child_path("", "C4.wav"), "C4.wav");
        assert_eq!(child_path("samples", "/abs/C4.wav"), "/abs/C4.wav");
        assert_eq!(
            child_path("base\\dir", "sub\\C4.wav"),
            "base/dir/sub/C4.wav"
        );
    }
}
