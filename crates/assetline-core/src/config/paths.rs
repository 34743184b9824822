//! Glob path resolution
//!
//! Configuration globs are written relative to a base directory (the project
//! root, the source root, the assets root). Resolution joins them onto that
//! base lexically, keeping the leading `!` of exclusion globs in front of the
//! joined result.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Prefix marking a glob as an exclusion
pub const EXCLUSION_MARKER: char = '!';

/// A single glob or an ordered list of globs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Globs {
    /// One glob
    One(String),
    /// Ordered list of globs
    Many(Vec<String>),
}

impl Globs {
    /// Build a list from anything yielding strings
    pub fn many<I, S>(globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many(globs.into_iter().map(Into::into).collect())
    }

    /// Iterate the globs in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::One(glob) => std::slice::from_ref(glob),
            Self::Many(globs) => globs,
        };
        slice.iter().map(String::as_str)
    }

    /// Globs as an owned list
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    /// Whether there is no glob at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(globs) => globs.is_empty(),
        }
    }

    /// Globs that select files
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|g| !is_exclusion(g))
    }

    /// Exclusion globs, with the marker stripped
    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|g| g.strip_prefix(EXCLUSION_MARKER))
    }

    /// Join every glob onto `base`, keeping the single/list shape
    pub fn resolve(&self, base: &str) -> Self {
        match self {
            Self::One(glob) => Self::One(join_glob(base, glob)),
            Self::Many(globs) => Self::Many(globs.iter().map(|g| join_glob(base, g)).collect()),
        }
    }
}

impl Default for Globs {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<&str> for Globs {
    fn from(glob: &str) -> Self {
        Self::One(glob.to_string())
    }
}

/// Whether `glob` is an exclusion glob
pub fn is_exclusion(glob: &str) -> bool {
    glob.starts_with(EXCLUSION_MARKER)
}

/// Join `glob` onto `base`, preserving a leading exclusion marker.
///
/// An absolute glob is returned normalized but otherwise unchanged.
pub fn join_glob(base: &str, glob: &str) -> String {
    match glob.strip_prefix(EXCLUSION_MARKER) {
        Some(rest) => format!("{}{}", EXCLUSION_MARKER, join_path(base, rest)),
        None => join_path(base, glob),
    }
}

fn join_path(base: &str, path: &str) -> String {
    normalize(&Path::new(base).join(path))
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
///
/// Never touches the filesystem, so glob metacharacters pass through.
pub fn normalize(path: &Path) -> String {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return ".".to_string();
    }

    parts
        .iter()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}
