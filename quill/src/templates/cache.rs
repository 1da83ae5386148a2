//! Template cache builder.
//!
//! Scans one directory for page templates and layout fragments and compiles
//! every page together with all layouts into its own [`CompiledTemplate`].
//! The build is all-or-nothing: the first unreadable or unparsable file
//! aborts it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Where templates live and how pages and layouts are told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    dir: PathBuf,
    page_suffix: String,
    layout_suffix: String,
}

impl TemplateSource {
    /// A source reading `*.page.html` pages and `*.layout.html` layouts from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            page_suffix: ".page.html".to_string(),
            layout_suffix: ".layout.html".to_string(),
        }
    }

    #[must_use]
    pub fn with_page_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.page_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_layout_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.layout_suffix = suffix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_suffix(&self) -> &str {
        &self.page_suffix
    }

    pub fn layout_suffix(&self) -> &str {
        &self.layout_suffix
    }
}

/// A page template compiled together with every layout fragment.
///
/// Immutable after construction; rendering only borrows it, so one instance
/// can be executed from any number of requests at once.
#[derive(Debug)]
pub struct CompiledTemplate {
    name: String,
    layouts: Vec<String>,
    env: Environment<'static>,
}

impl CompiledTemplate {
    /// The page's template name (its file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the layout fragments compiled into this unit.
    pub fn layouts(&self) -> &[String] {
        &self.layouts
    }

    /// Execute the page against `ctx`, returning the complete output.
    pub fn render<S: Serialize>(&self, ctx: &S) -> std::result::Result<String, minijinja::Error> {
        self.env.get_template(&self.name)?.render(ctx)
    }
}

/// Immutable mapping from template name to compiled template.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<String, CompiledTemplate>,
}

impl TemplateCache {
    /// Build a cache from every page template found in `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheBuild`] naming the offending file if the
    /// directory cannot be listed or any page or layout fails to read or parse.
    pub fn build(source: &TemplateSource) -> Result<Self> {
        let (pages, layout_paths) = discover(source)?;

        let mut layouts = Vec::with_capacity(layout_paths.len());
        for (name, path) in layout_paths {
            let body = read_source(&name, &path)?;
            layouts.push((name, body));
        }

        // Layouts are parsed on their own first so a broken fragment is
        // reported even when there are no pages to combine it with.
        let mut scratch = new_environment();
        for (name, body) in &layouts {
            scratch
                .add_template_owned(name.clone(), body.clone())
                .map_err(|e| build_error(name, e))?;
        }

        let mut templates = HashMap::with_capacity(pages.len());
        for (name, path) in pages {
            let body = read_source(&name, &path)?;
            let compiled = compile(&name, body, &layouts)?;
            templates.insert(name, compiled);
        }

        tracing::debug!(
            dir = %source.dir().display(),
            pages = templates.len(),
            layouts = layouts.len(),
            "Template cache built"
        );

        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Option<&CompiledTemplate> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

type Discovered = (Vec<(String, PathBuf)>, Vec<(String, PathBuf)>);

/// Split the files directly inside the source directory into pages and layouts.
fn discover(source: &TemplateSource) -> Result<Discovered> {
    let mut pages = Vec::new();
    let mut layouts = Vec::new();

    let walker = WalkDir::new(source.dir())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| build_error(&source.dir().display().to_string(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(source.page_suffix()) {
            pages.push((name, entry.into_path()));
        } else if name.ends_with(source.layout_suffix()) {
            layouts.push((name, entry.into_path()));
        }
    }

    Ok((pages, layouts))
}

fn compile(name: &str, body: String, layouts: &[(String, String)]) -> Result<CompiledTemplate> {
    let mut env = new_environment();

    for (layout, layout_body) in layouts {
        env.add_template_owned(layout.clone(), layout_body.clone())
            .map_err(|e| build_error(layout, e))?;
    }
    env.add_template_owned(name.to_string(), body)
        .map_err(|e| build_error(name, e))?;

    Ok(CompiledTemplate {
        name: name.to_string(),
        layouts: layouts.iter().map(|(layout, _)| layout.clone()).collect(),
        env,
    })
}

fn new_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

fn read_source(name: &str, path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| build_error(name, e))
}

fn build_error(name: &str, source: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::CacheBuild {
        name: name.to_string(),
        source: Box::new(source),
    }
}
