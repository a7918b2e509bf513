//! Template registry: sets, cached templates, and the variable map

use std::collections::HashMap;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, Weak};

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::List;
use crate::error::{Error, Result};
use crate::escape::{noop_escape, safe_html, EscapeFn};
use crate::parser;
use crate::runtime::Runtime;
use crate::scope::BlockMap;
use crate::value::{Arguments, Function, Value};

/// Suffixes tried, in order, when resolving a template path.
const SUFFIXES: [&str; 3] = ["", ".jet", ".jet.html"];

/// An insertion-ordered variable map handed to
/// [`Template::execute`] or stored as a set's globals.
#[derive(Clone, Debug, Default)]
pub struct VarMap {
    entries: IndexMap<String, Value>,
}

impl VarMap {
    /// Create an empty map.
    pub fn new() -> Self {
        VarMap::default()
    }

    /// Insert a value, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Insert a fast function, builder style.
    pub fn with_func<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Arguments<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let func = Function::fast(name.as_str(), f);
        self.with(name, Value::Func(func))
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a fast function.
    pub fn set_func<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Arguments<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let func = Function::fast(name.as_str(), f);
        self.set(name, Value::Func(func))
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for VarMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = VarMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

pub(crate) struct SetCore {
    root: Option<PathBuf>,
    pub(crate) escape: EscapeFn,
    templates: Mutex<HashMap<String, Arc<Template>>>,
    globals: RwLock<IndexMap<String, Value>>,
}

/// The owning registry of templates: a parse cache, a globals table, and
/// the default escape function applied when a pipeline does not pick one.
///
/// A `Set` is cheap to clone and safe to share; multiple runtimes may
/// execute templates of one set in parallel.
#[derive(Clone)]
pub struct Set {
    core: Arc<SetCore>,
}

/// Builder for [`Set`] construction.
pub struct SetBuilder {
    root: Option<PathBuf>,
    escape: EscapeFn,
}

impl SetBuilder {
    /// Directory template sources are loaded from on cache misses.
    pub fn root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root = Some(dir.into());
        self
    }

    /// Default escape function for action output.
    pub fn escape(mut self, f: EscapeFn) -> Self {
        self.escape = f;
        self
    }

    /// Finalize the set.
    pub fn build(self) -> Set {
        Set {
            core: Arc::new(SetCore {
                root: self.root,
                escape: self.escape,
                templates: Mutex::new(HashMap::new()),
                globals: RwLock::new(IndexMap::new()),
            }),
        }
    }
}

impl Default for Set {
    fn default() -> Self {
        Set::new()
    }
}

impl Set {
    /// A plain set: no load root, pass-through default escape.
    pub fn new() -> Set {
        Set::builder().build()
    }

    /// An auto-escaping HTML set rooted at `dir`.
    pub fn html(dir: impl Into<PathBuf>) -> Set {
        Set::builder().root(dir).escape(safe_html).build()
    }

    /// Start building a set.
    pub fn builder() -> SetBuilder {
        SetBuilder {
            root: None,
            escape: noop_escape,
        }
    }

    /// Add a named global visible to every template of the set.
    pub fn add_global(&self, name: impl Into<String>, value: impl Into<Value>) {
        let mut globals = self
            .core
            .globals
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        globals.insert(name.into(), value.into());
    }

    /// Add a global fast function.
    pub fn add_global_func<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Arguments<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let func = Function::fast(name.as_str(), f);
        self.add_global(name, Value::Func(func));
    }

    /// Parse `source` and cache it under `path`.
    pub fn cache(&self, path: &str, source: &str) -> Result<Arc<Template>> {
        let mut templates = self.core.lock_templates();
        self.core.parse_into(&mut templates, path, source)
    }

    /// Resolve `path` (with suffix trials) to a cached or freshly loaded
    /// template.
    pub fn get_template(&self, path: &str) -> Result<Arc<Template>> {
        self.core.get_template(path)
    }
}

impl SetCore {
    fn lock_templates(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Template>>> {
        self.templates
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub(crate) fn get_template(self: &Arc<Self>, path: &str) -> Result<Arc<Template>> {
        let mut templates = self.lock_templates();
        self.load(&mut templates, path)
    }

    pub(crate) fn resolve_global(&self, name: &str) -> Option<Value> {
        let globals = self
            .globals
            .read()
            .unwrap_or_else(|poison| poison.into_inner());
        globals.get(name).cloned()
    }

    /// Cache-or-load under the lock, so each path parses at most once.
    fn load(
        self: &Arc<Self>,
        cache: &mut HashMap<String, Arc<Template>>,
        path: &str,
    ) -> Result<Arc<Template>> {
        let key = normalize_path(path);
        for suffix in SUFFIXES {
            let tried = format!("{}{}", key, suffix);
            if let Some(t) = cache.get(&tried) {
                trace!(path = %tried, "template cache hit");
                return Ok(t.clone());
            }
        }
        if let Some(root) = &self.root {
            for suffix in SUFFIXES {
                let tried = format!("{}{}", key, suffix);
                let file = root.join(tried.trim_start_matches('/'));
                if let Ok(source) = std::fs::read_to_string(&file) {
                    trace!(path = %tried, file = %file.display(), "template loaded from disk");
                    return self.parse_into(cache, &tried, &source);
                }
            }
        }
        Err(Error::TemplateNotFound {
            path: path.to_string(),
        })
    }

    fn parse_into(
        self: &Arc<Self>,
        cache: &mut HashMap<String, Arc<Template>>,
        path: &str,
        source: &str,
    ) -> Result<Arc<Template>> {
        let key = normalize_path(path);
        let parsed = parser::parse(&key, source)?;

        let extends = match &parsed.extends {
            Some(parent) => Some(self.load(cache, &resolve_path(parent, &key))?),
            None => None,
        };

        // collect blocks along the chain: ancestors, then imports, then
        // own definitions, later entries overriding
        let mut collected: BlockMap = extends
            .as_ref()
            .map(|parent| (*parent.collected).clone())
            .unwrap_or_default();
        for import in &parsed.imports {
            let imported = self.load(cache, &resolve_path(import, &key))?;
            for (name, block) in imported.collected.iter() {
                collected.insert(name.clone(), block.clone());
            }
        }
        for (name, block) in parsed.blocks {
            collected.insert(name, block);
        }

        let template = Arc::new(Template {
            path: Arc::from(key.as_str()),
            root: parsed.root,
            collected: Arc::new(collected),
            extends,
            set: Arc::downgrade(self),
        });
        cache.insert(key, template.clone());
        Ok(template)
    }
}

/// A parsed template, cached by its normalized path.
pub struct Template {
    pub(crate) path: Arc<str>,
    root: List,
    pub(crate) collected: Arc<BlockMap>,
    extends: Option<Arc<Template>>,
    set: Weak<SetCore>,
}

impl Template {
    /// The normalized path this template is cached under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Render the template into `writer` with the given variables and
    /// context value.
    ///
    /// Returns the first error; bytes already written stay in the writer.
    /// Panics raised by user callables are caught and surfaced as
    /// [`Error::UserPanic`].
    pub fn execute(
        &self,
        writer: &mut dyn Write,
        variables: &VarMap,
        context: Value,
    ) -> Result<()> {
        let core = self.set.upgrade().ok_or(Error::SetReleased)?;
        trace!(path = %self.path, "executing template");
        let mut rt = Runtime::new(&core, Box::new(writer), variables.clone(), context);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| rt.run_template(self, None)));
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(payload) => Err(Error::UserPanic(panic_message(payload))),
        }
    }

    /// Root of the furthest ancestor along the extends chain.
    pub(crate) fn effective_root(&self) -> &List {
        let mut t = self;
        while let Some(parent) = &t.extends {
            t = parent;
        }
        &t.root
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return s.to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}

/// Normalize a template key: leading slash, `.`/`..` resolved, single
/// separators.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Resolve a referenced path against the template that references it:
/// absolute paths against the set root, relative ones against the
/// referencing template's directory.
pub(crate) fn resolve_path(target: &str, owner: &str) -> String {
    if target.starts_with('/') {
        return normalize_path(target);
    }
    let dir = match owner.rfind('/') {
        Some(i) => &owner[..i],
        None => "",
    };
    normalize_path(&format!("{}/{}", dir, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varmap_preserves_insertion_order() {
        let vars = VarMap::new().with("b", 1i64).with("a", 2i64).with("c", 3i64);
        let names: Vec<_> = vars.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn varmap_set_replaces() {
        let mut vars = VarMap::new();
        vars.set("x", 1i64);
        vars.set("x", 2i64);
        assert_eq!(vars.get("x"), Some(&Value::Int(2)));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("/a/./b"), "/a/b");
        assert_eq!(normalize_path("/a/../b"), "/b");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn resolve_relative_paths() {
        assert_eq!(resolve_path("/abs", "/sub/page"), "/abs");
        assert_eq!(resolve_path("other", "/sub/page"), "/sub/other");
        assert_eq!(resolve_path("../lib", "/sub/page"), "/lib");
        assert_eq!(resolve_path("lib", "/page"), "/lib");
    }

    #[test]
    fn cache_and_get_template() {
        let set = Set::new();
        set.cache("/greet", "hello").unwrap();
        let t = set.get_template("/greet").unwrap();
        assert_eq!(t.path(), "/greet");
        // missing templates surface the dedicated error
        assert!(matches!(
            set.get_template("/missing"),
            Err(Error::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn suffix_trials_hit_the_cache() {
        let set = Set::new();
        set.cache("/page.jet", "x").unwrap();
        let t = set.get_template("/page").unwrap();
        assert_eq!(t.path(), "/page.jet");
    }

    #[test]
    fn extends_chain_effective_root() {
        let set = Set::new();
        set.cache("/a", "root text").unwrap();
        set.cache("/b", "{{extends \"/a\"}}").unwrap();
        set.cache("/c", "{{extends \"/b\"}}").unwrap();
        let c = set.get_template("/c").unwrap();
        let a = set.get_template("/a").unwrap();
        assert!(Arc::ptr_eq(
            &c.effective_root().clone(),
            &a.effective_root().clone()
        ));
    }

    #[test]
    fn block_collection_overrides_by_name() {
        let set = Set::new();
        set.cache("/parent", "{{block greet()}}parent{{end}}").unwrap();
        set.cache(
            "/child",
            "{{extends \"/parent\"}}{{block greet()}}child{{end}}",
        )
        .unwrap();
        let child = set.get_template("/child").unwrap();
        let block = child.collected.get("greet").unwrap();
        // the child's definition won
        assert_eq!(block.name, "greet");
        assert!(!Arc::ptr_eq(
            block,
            set.get_template("/parent").unwrap().collected.get("greet").unwrap()
        ));
    }
}
