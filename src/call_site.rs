//! Call-site registry.
//!
//! Every logging statement owns exactly one [`CallSiteInfo`], created the
//! first time the statement runs and kept for the rest of the process. Sites
//! are indexed by source location (file, line, column). A location can hold
//! several sites, since one macro invocation may expand into several logging
//! statements. Records in the arena refer to their site by its numeric
//! [`CallSiteId`].

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::error::TemplateError;
use crate::severity::Severity;
use crate::template::ParsedTemplate;

/// Numeric identity of a call site. Ids start at 1.
pub type CallSiteId = u32;

/// What a macro knows about its own statement.
#[derive(Debug, Clone, Copy)]
pub struct CallSiteMeta {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub module_path: &'static str,
    pub template: &'static str,
    pub severity: Severity,
    pub category: Option<&'static str>,
}

/// Immutable metadata of one logging statement.
#[derive(Debug)]
pub struct CallSiteInfo {
    id: CallSiteId,
    meta: CallSiteMeta,
    parsed: ParsedTemplate,
}

impl CallSiteInfo {
    pub fn id(&self) -> CallSiteId {
        self.id
    }

    pub fn file(&self) -> &'static str {
        self.meta.file
    }

    pub fn line(&self) -> u32 {
        self.meta.line
    }

    pub fn column(&self) -> u32 {
        self.meta.column
    }

    pub fn module_path(&self) -> &'static str {
        self.meta.module_path
    }

    pub fn template(&self) -> &'static str {
        self.meta.template
    }

    pub fn severity(&self) -> Severity {
        self.meta.severity
    }

    pub fn category(&self) -> Option<&'static str> {
        self.meta.category
    }

    pub fn parsed(&self) -> &ParsedTemplate {
        &self.parsed
    }

    /// Placeholder names in template order.
    pub fn field_names(&self) -> &[String] {
        self.parsed.names()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.parsed.index_of(name)
    }
}

impl fmt::Display for CallSiteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} \"{}\"", self.meta.file, self.meta.line, self.meta.template)
    }
}

type Location = (&'static str, u32, u32);

#[derive(Default)]
struct SiteTable {
    // Several statements can share a location when one macro expands
    // into more than one logging call.
    by_location: HashMap<Location, Vec<&'static CallSiteInfo>>,
    // Index `i` holds site id `i + 1`.
    by_id: Vec<&'static CallSiteInfo>,
}

impl SiteTable {
    fn find(&self, meta: &CallSiteMeta) -> Option<&'static CallSiteInfo> {
        self.by_location
            .get(&(meta.file, meta.line, meta.column))?
            .iter()
            .copied()
            .find(|site| site.describes(meta))
    }

    fn insert(&mut self, meta: CallSiteMeta, parsed: ParsedTemplate) -> &'static CallSiteInfo {
        let id = self.by_id.len() as CallSiteId + 1;
        let site: &'static CallSiteInfo = Box::leak(Box::new(CallSiteInfo { id, meta, parsed }));
        self.by_id.push(site);
        self.by_location
            .entry((meta.file, meta.line, meta.column))
            .or_default()
            .push(site);
        site
    }
}

impl CallSiteInfo {
    fn describes(&self, meta: &CallSiteMeta) -> bool {
        self.meta.template == meta.template
            && self.meta.severity == meta.severity
            && self.meta.category == meta.category
            && self.meta.module_path == meta.module_path
    }
}

lazy_static! {
    static ref CALL_SITES: RwLock<SiteTable> = RwLock::new(SiteTable::default());
}

/// Registers a call site, or returns the one already registered with the
/// same location, template, severity and category.
///
/// Sites live for the rest of the process.
///
/// # Examples
///
/// ```
/// # use replay_logger::call_site::{register, CallSiteMeta};
/// # use replay_logger::Severity;
/// let meta = CallSiteMeta {
///     file: "src/cache.rs",
///     line: 12,
///     column: 5,
///     module_path: "app::cache",
///     template: "CacheHit: input = {input}",
///     severity: Severity::Info,
///     category: None,
/// };
/// let site = register(meta).unwrap();
/// assert_eq!(site.field_names(), &["input"]);
/// assert!(std::ptr::eq(site, register(meta).unwrap()));
/// ```
pub fn register(meta: CallSiteMeta) -> Result<&'static CallSiteInfo, TemplateError> {
    // Fast path: the statement already ran once
    if let Some(site) = CALL_SITES.read().find(&meta) {
        return Ok(site);
    }

    let parsed = ParsedTemplate::parse(meta.template)?;
    let mut table = CALL_SITES.write();
    if let Some(site) = table.find(&meta) {
        return Ok(site);
    }
    Ok(table.insert(meta, parsed))
}

/// Registration path of the logging macros.
///
/// Each macro expansion calls this once and caches the result, so every
/// call creates a new site, even when another statement expanded at the
/// same location. The macros check their template with a `const`
/// assertion, so parsing cannot fail here.
#[doc(hidden)]
pub fn register_validated(meta: CallSiteMeta) -> &'static CallSiteInfo {
    match ParsedTemplate::parse(meta.template) {
        Ok(parsed) => CALL_SITES.write().insert(meta, parsed),
        Err(err) => panic!(
            "template `{}` at {}:{} passed compile-time validation but failed to parse: {err}",
            meta.template, meta.file, meta.line
        ),
    }
}

pub fn lookup(id: CallSiteId) -> Option<&'static CallSiteInfo> {
    let index = id.checked_sub(1)? as usize;
    CALL_SITES.read().by_id.get(index).copied()
}

/// All sites registered on a source line, in registration order.
pub fn sites_at(file: &str, line: u32) -> Vec<&'static CallSiteInfo> {
    CALL_SITES
        .read()
        .by_id
        .iter()
        .copied()
        .filter(|site| site.file() == file && site.line() == line)
        .collect()
}

pub fn site_count() -> usize {
    CALL_SITES.read().by_id.len()
}
