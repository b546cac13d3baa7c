use crate::error::Result;
use crate::template::{compile, CompilerConfig, Template};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// In-memory compile cache.
///
/// Entries are keyed by a hash of the template text together with everything
/// in the configuration that changes the generated source.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: HashMap<String, Template>,
    hits: usize,
    misses: usize,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, config: &CompilerConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0]);
        hasher.update(config.h_name.as_bytes());
        hasher.update([0]);
        hasher.update(config.interpolation.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(config.data_binding.as_str().as_bytes());
        for name in config.directives.names() {
            hasher.update([0]);
            hasher.update(name.as_bytes());
            // Redefining a directive under the same name must not hit.
            if let Some(id) = config.directives.definition_id(name) {
                hasher.update(id.to_le_bytes());
            }
        }
        hasher.update([0]);
        hasher.update((config.h as usize).to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, source: &str, config: &CompilerConfig) -> Option<Template> {
        self.entries.get(&Self::compute_hash(source, config)).cloned()
    }

    /// Return the cached template, compiling and storing it on a miss.
    /// Failed compiles are not cached.
    pub fn get_or_compile(&mut self, source: &str, config: &CompilerConfig) -> Result<Template> {
        let hash = Self::compute_hash(source, config);
        if let Some(template) = self.entries.get(&hash) {
            self.hits += 1;
            tracing::trace!(%hash, "template cache hit");
            return Ok(template.clone());
        }
        self.misses += 1;
        let template = compile(source, config)?;
        self.entries.insert(hash, template.clone());
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveRegistry;

    #[test]
    fn test_hit_after_miss() {
        let mut cache = TemplateCache::new();
        let config = CompilerConfig::default();
        let a = cache.get_or_compile("<p>{{ x }}</p>", &config).unwrap();
        let b = cache.get_or_compile("<p>{{ x }}</p>", &config).unwrap();
        assert_eq!(a.source(), b.source());
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_config_changes_key() {
        let config = CompilerConfig::default();
        let mut renamed = config.clone();
        renamed.h_name = "node".to_string();
        assert_ne!(
            TemplateCache::compute_hash("<p></p>", &config),
            TemplateCache::compute_hash("<p></p>", &renamed)
        );

        let mut redefined = config.clone();
        redefined.directives = DirectiveRegistry::with_builtins();
        assert_ne!(
            TemplateCache::compute_hash("<p></p>", &config),
            TemplateCache::compute_hash("<p></p>", &redefined)
        );
    }

    #[test]
    fn test_key_survives_registry_drop_and_redefine() {
        let config = CompilerConfig::default();
        let first = TemplateCache::compute_hash("<p></p>", &config);
        let dropped = {
            let mut config = CompilerConfig::default();
            config.directives.define("y-x", |v, _| Ok(v.to_string()));
            TemplateCache::compute_hash("<p></p>", &config)
        };
        let mut again = CompilerConfig::default();
        again.directives.define("y-x", |v, _| Ok(v.to_string()));
        assert_ne!(dropped, TemplateCache::compute_hash("<p></p>", &again));
        assert_eq!(first, TemplateCache::compute_hash("<p></p>", &config.clone()));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = TemplateCache::new();
        let config = CompilerConfig::default();
        assert!(cache.get_or_compile("<p></p><p></p>", &config).is_err());
        assert!(cache.is_empty());
        assert!(cache.get("<p></p><p></p>", &config).is_none());
    }
}
