//! Compilation units.
//!
//! A unit is the declared shape of one component before it is built: its
//! sources (hand-written plus spliced generated sources), include dirs, the
//! interface definitions it owns and the components it uses.

use std::collections::HashSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::core::artifact::GeneratedArtifactSet;
use crate::core::interface::InterfaceDefinition;

/// Insertion-ordered set.
///
/// `insert` is the only mutation and is idempotent, so an item can never be
/// present twice.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T: Clone + Eq + Hash> OrderedSet<T> {
    pub fn new() -> Self {
        OrderedSet {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Insert `item` unless it is already present. Returns whether it was
    /// newly added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone + Eq + Hash> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl<T: Clone + Eq + Hash> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

/// A named component target as seen by the build graph.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationUnit {
    name: String,
    dir: PathBuf,
    sources: OrderedSet<PathBuf>,
    include_dirs: OrderedSet<PathBuf>,
    uses: Vec<String>,
    interfaces: Vec<InterfaceDefinition>,
    defines: Vec<String>,
    cflags: Vec<String>,
    cxxflags: Vec<String>,
}

impl CompilationUnit {
    /// Create an empty unit rooted at `dir`.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        CompilationUnit {
            name: name.into(),
            dir: dir.into(),
            sources: OrderedSet::new(),
            include_dirs: OrderedSet::new(),
            uses: Vec::new(),
            interfaces: Vec::new(),
            defines: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
        }
    }

    /// Unit-specific compiler settings, applied after the profile's.
    pub fn with_flags(
        mut self,
        defines: Vec<String>,
        cflags: Vec<String>,
        cxxflags: Vec<String>,
    ) -> Self {
        self.defines = defines;
        self.cflags = cflags;
        self.cxxflags = cxxflags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory the unit's relative paths resolve against.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sources(&self) -> &[PathBuf] {
        self.sources.as_slice()
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        self.include_dirs.as_slice()
    }

    /// Names of the components this unit uses.
    pub fn uses(&self) -> &[String] {
        &self.uses
    }

    pub fn interfaces(&self) -> &[InterfaceDefinition] {
        &self.interfaces
    }

    /// `NAME` or `NAME=VALUE`
    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    pub fn cflags(&self) -> &[String] {
        &self.cflags
    }

    pub fn cxxflags(&self) -> &[String] {
        &self.cxxflags
    }

    pub fn add_source(&mut self, source: impl Into<PathBuf>) -> bool {
        self.sources.insert(source.into())
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) -> bool {
        self.include_dirs.insert(dir.into())
    }

    pub fn add_use(&mut self, component: impl Into<String>) {
        let component = component.into();
        if !self.uses.contains(&component) {
            self.uses.push(component);
        }
    }

    pub fn add_interface(&mut self, def: InterfaceDefinition) {
        if !self.interfaces.iter().any(|d| d.path() == def.path()) {
            self.interfaces.push(def);
        }
    }

    /// Splice a generator's compilable outputs into the source list and make
    /// its headers visible. Repeating this for the same set changes nothing.
    pub fn register_generated(&mut self, artifacts: &GeneratedArtifactSet) {
        for source in artifacts.compilable() {
            self.sources.insert(source.to_path_buf());
        }
        self.include_dirs
            .insert(artifacts.output_dir().to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_set_keeps_first_occurrence() {
        let set: OrderedSet<&str> = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.as_slice(), ["b", "a", "c"]);
    }

    #[test]
    fn test_register_generated_exactly_once() {
        let mut unit = CompilationUnit::new("net", "/src/modules/net");
        unit.add_source("/src/modules/net/net.cpp");

        let artifacts =
            GeneratedArtifactSet::for_base_name("net_v1", Path::new("/out/modules/net"));
        for _ in 0..5 {
            unit.register_generated(&artifacts);
        }

        assert_eq!(
            unit.sources(),
            [
                PathBuf::from("/src/modules/net/net.cpp"),
                PathBuf::from("/out/modules/net/net_v1_interface.cpp"),
                PathBuf::from("/out/modules/net/net_v1_typedefs.cpp"),
            ]
        );
        assert_eq!(unit.include_dirs(), [PathBuf::from("/out/modules/net")]);
    }

    #[test]
    fn test_uses_deduplicated() {
        let mut unit = CompilationUnit::new("net", "/src/modules/net");
        unit.add_use("hal");
        unit.add_use("hal");
        assert_eq!(unit.uses(), ["hal".to_string()]);
    }

    #[test]
    fn test_serializes_sources_as_list() {
        let mut unit = CompilationUnit::new("disk", "/src/disk");
        unit.add_source("/src/disk/disk.cpp");

        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["sources"], serde_json::json!(["/src/disk/disk.cpp"]));
    }
}
