//! Path helpers over the string paths the host hands us.
//!
//! Host records carry paths as text, so these work on `&str` and return
//! owned `String`s rather than round-tripping through `PathBuf` at every
//! call site.

use std::path::Path;

/// Directory containing `file`.
///
/// A path with no parent (the filesystem root) is its own directory.
#[must_use]
pub fn directory_of(file: &str) -> String {
    let path = Path::new(file);
    path.parent()
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Join a file name onto a directory.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    Path::new(dir).join(name).to_string_lossy().into_owned()
}

/// Component-wise path equality, so `/pkg/` and `/pkg` compare equal.
#[must_use]
pub fn same_dir(a: &str, b: &str) -> bool {
    Path::new(a) == Path::new(b)
}

/// Split a bare specifier into package name and optional subpath.
///
/// `@scope/pkg/sub/path` gives `("@scope/pkg", Some("sub/path"))`.
#[must_use]
pub fn split_bare_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map_or(specifier.len(), |(i, _)| i)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let (name, rest) = specifier.split_at(name_end);
    let subpath = rest.strip_prefix('/').filter(|s| !s.is_empty());
    (name, subpath)
}

/// Whether `specifier` names a package rather than a path.
#[must_use]
pub fn is_bare(specifier: &str) -> bool {
    !specifier.is_empty()
        && !specifier.starts_with('.')
        && !Path::new(specifier).is_absolute()
        && !specifier.contains(':')
        && !specifier.contains('!')
}
