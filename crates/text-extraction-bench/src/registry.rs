//! Framework registration and discovery
//!
//! The registry is built once at startup. Every known framework id maps either
//! to a ready [`Framework`] or to an [`FrameworkEntry::Unavailable`] entry
//! explaining why it cannot run here, so selection errors name the real cause
//! instead of surfacing mid-run.

use crate::extractor::Capability;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// A framework that can be benchmarked
#[derive(Debug, Clone)]
pub struct Framework {
    pub capability: Capability,

    /// Cache directory removed before every invocation
    pub cache_dir: Option<PathBuf>,

    /// Lowercase extensions (without the dot) this framework is not given
    pub excluded_extensions: Vec<String>,
}

impl Framework {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            cache_dir: None,
            excluded_extensions: Vec::new(),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Whether `path` should be handed to this framework at all
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return true;
        };
        let ext = ext.to_lowercase();
        !self.excluded_extensions.iter().any(|excluded| *excluded == ext)
    }
}

/// Registry entry for one framework id
#[derive(Debug, Clone)]
pub enum FrameworkEntry {
    Available(Framework),
    Unavailable { reason: String },
}

impl FrameworkEntry {
    pub fn is_available(&self) -> bool {
        matches!(self, FrameworkEntry::Available(_))
    }
}

fn validate_framework_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("Framework name cannot be empty".to_string()));
    }

    if name.contains(char::is_whitespace) {
        return Err(Error::Config(format!(
            "Framework name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// Framework id → capability or unavailability reason, in registration order
#[derive(Debug, Clone, Default)]
pub struct FrameworkRegistry {
    entries: IndexMap<String, FrameworkEntry>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the machine for every built-in framework
    pub fn discover() -> Self {
        let mut registry = Self::new();
        crate::adapters::register_builtin(&mut registry);
        registry
    }

    /// Register an available framework, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, framework: Framework) -> Result<()> {
        let name = name.into();
        validate_framework_name(&name)?;
        self.entries.insert(name, FrameworkEntry::Available(framework));
        Ok(())
    }

    /// Record that a known framework cannot run here
    pub fn register_unavailable(&mut self, name: impl Into<String>, reason: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_framework_name(&name)?;
        self.entries.insert(
            name,
            FrameworkEntry::Unavailable {
                reason: reason.into(),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FrameworkEntry> {
        self.entries.get(name)
    }

    /// Look up a framework that must be runnable
    ///
    /// # Errors
    ///
    /// [`Error::UnknownFramework`] if `name` was never registered, and
    /// [`Error::FrameworkUnavailable`] if it was registered as unavailable.
    pub fn resolve(&self, name: &str) -> Result<&Framework> {
        match self.entries.get(name) {
            Some(FrameworkEntry::Available(framework)) => Ok(framework),
            Some(FrameworkEntry::Unavailable { reason }) => Err(Error::FrameworkUnavailable {
                framework: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(Error::UnknownFramework(name.to_string())),
        }
    }

    /// Resolve a selection; an empty selection means every available framework
    pub fn select(&self, names: &[String]) -> Result<Vec<(String, Framework)>> {
        let selected: Vec<(String, Framework)> = if names.is_empty() {
            self.entries
                .iter()
                .filter_map(|(name, entry)| match entry {
                    FrameworkEntry::Available(framework) => Some((name.clone(), framework.clone())),
                    FrameworkEntry::Unavailable { .. } => None,
                })
                .collect()
        } else {
            names
                .iter()
                .map(|name| self.resolve(name).map(|f| (name.clone(), f.clone())))
                .collect::<Result<_>>()?
        };

        if selected.is_empty() {
            return Err(Error::Benchmark("No frameworks available for benchmarking".to_string()));
        }

        Ok(selected)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FrameworkEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn available_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_available())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractionError, SyncExtractor};

    struct Noop;

    impl SyncExtractor for Noop {
        fn extract_text(&self, _path: &Path) -> std::result::Result<String, ExtractionError> {
            Ok(String::new())
        }
    }

    fn registry() -> FrameworkRegistry {
        let mut registry = FrameworkRegistry::new();
        registry.register("alpha", Framework::new(Capability::sync(Noop))).unwrap();
        registry
            .register_unavailable("beta", "No Python interpreter found with beta installed")
            .unwrap();
        registry.register("gamma", Framework::new(Capability::sync(Noop))).unwrap();
        registry
    }

    #[test]
    fn test_select_all_skips_unavailable() {
        let selected = registry().select(&[]).unwrap();
        let names: Vec<_> = selected.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_select_unavailable_is_error() {
        let err = registry().select(&["beta".to_string()]).unwrap_err();
        assert!(matches!(err, Error::FrameworkUnavailable { .. }));
        assert!(err.to_string().contains("beta installed"));

        let err = registry().select(&["delta".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnknownFramework(_)));
    }

    #[test]
    fn test_empty_registry_has_no_frameworks() {
        let err = FrameworkRegistry::new().select(&[]).unwrap_err();
        assert!(err.to_string().contains("No frameworks available"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut registry = FrameworkRegistry::new();
        assert!(registry.register("", Framework::new(Capability::sync(Noop))).is_err());
        assert!(registry.register_unavailable("two words", "x").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_exclusions() {
        let framework = Framework::new(Capability::sync(Noop)).with_excluded_extensions([".DOCX", "md"]);
        assert!(!framework.accepts(Path::new("a/report.docx")));
        assert!(!framework.accepts(Path::new("README.MD")));
        assert!(framework.accepts(Path::new("a/report.pdf")));
        assert!(framework.accepts(Path::new("Makefile")));
    }
}
