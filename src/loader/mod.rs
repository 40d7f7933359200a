//! Source roots, parsed units and the compiled-class registry.
//!
//! A [`Loader`] is the arena every compiled [`ClassDef`] lives in. Classes refer to each other
//! by [`QualifiedName`] only, so cyclic references between parcelables are ordinary lookups
//! instead of recursive values.
//!
//! # Architecture
//!
//! Three caches sit behind the loader:
//!
//! - **files**: declaring file to the names it declares, so each file is read and parsed once
//! - **units**: qualified name to parsed [`DeclUnit`]. The [`crate::typesystem::TypeResolver`]
//!   only ever asks for the kind of a unit, which never triggers compilation
//! - **classes**: qualified name to compiled [`ClassDef`], with at most one compilation in
//!   flight per name
//!
//! Names are located by probing every root in configuration order for the declaring file,
//! trying the extensions of the registered parsers in registration order (`.aidl` first), then
//! a persisted `.json` schema laid out one directory per name segment.
//!
//! # Examples
//!
//! ```rust,no_run
//! use parcelscope::Loader;
//!
//! let loader = Loader::new()
//!     .with_root("frameworks/base/core/java")?
//!     .with_root("schemas")?;
//!
//! let manager = loader.get_or_compile("android.content.pm.IPackageManager")?;
//! for method in &manager.as_binder().unwrap().methods {
//!     println!("{} = {}", method.name, method.tc);
//! }
//! # Ok::<(), parcelscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Loader`] is `Send + Sync`. Concurrent requests for the same name wait for a single
//! compilation and share its `Arc`.

mod cache;
mod report;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    compiler::{self, DirectionPolicy, ModifierPolicy, FIRST_CALL_TRANSACTION},
    schema::{json, ClassDef, ClassKind, ImportDef, QualifiedName, SourceLocation},
    source::{AidlParser, DeclUnit, SourceParser, UnitKind},
    Error, Result,
};

use cache::ClassCache;
pub use report::{CompileReport, Discovery, UnitInfo};

const SCHEMA_EXTENSION: &str = "json";

/// Resolves qualified names to declarations and owns every compiled class.
///
/// Built with the same builder style throughout: every `with_*` call consumes and returns the
/// loader. Configure it fully before the first lookup; the caches are not invalidated when the
/// configuration changes.
pub struct Loader {
    roots: Vec<PathBuf>,
    parsers: Vec<Arc<dyn SourceParser>>,
    policy: Arc<dyn DirectionPolicy>,
    transaction_base: u32,
    files: DashMap<PathBuf, Arc<[QualifiedName]>>,
    units: DashMap<QualifiedName, Arc<DeclUnit>>,
    locations: DashMap<QualifiedName, SourceLocation>,
    classes: ClassCache,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader without roots, reading `.aidl` sources with the built-in parser.
    #[must_use]
    pub fn new() -> Self {
        Loader {
            roots: Vec::new(),
            parsers: vec![Arc::new(AidlParser)],
            policy: Arc::new(ModifierPolicy),
            transaction_base: FIRST_CALL_TRANSACTION,
            files: DashMap::new(),
            units: DashMap::new(),
            locations: DashMap::new(),
            classes: ClassCache::default(),
        }
    }

    /// Add a source root. Roots are searched in the order they were added.
    ///
    /// # Arguments
    /// * `path` - Directory containing package directories (`android/os/...`)
    ///
    /// # Errors
    /// Returns an error if the path does not exist or is not a directory.
    pub fn with_root<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Error(format!(
                "Source root does not exist or is not a directory: {}",
                path.display()
            )));
        }
        self.roots.push(path.to_path_buf());
        Ok(self)
    }

    /// Register a reader for another source language.
    ///
    /// A parser for an extension that is already registered replaces the existing one.
    #[must_use]
    pub fn with_parser<P: SourceParser + 'static>(mut self, parser: P) -> Self {
        let extension = parser.extension();
        self.parsers.retain(|p| p.extension() != extension);
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Replace the rule deciding parameter directions.
    #[must_use]
    pub fn with_direction_policy<P: DirectionPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Replace the first automatically assigned transaction code.
    #[must_use]
    pub fn with_transaction_base(mut self, base: u32) -> Self {
        self.transaction_base = base;
        self
    }

    /// Configured source roots, in search order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The direction rule used by the compiler.
    #[must_use]
    pub fn direction_policy(&self) -> &dyn DirectionPolicy {
        &*self.policy
    }

    /// The first automatically assigned transaction code.
    #[must_use]
    pub fn transaction_base(&self) -> u32 {
        self.transaction_base
    }

    fn parser_for(&self, extension: &str) -> Option<&Arc<dyn SourceParser>> {
        self.parsers.iter().find(|p| p.extension() == extension)
    }

    fn is_loadable(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(SCHEMA_EXTENSION) => true,
            Some(ext) => self.parser_for(ext).is_some(),
            None => false,
        }
    }

    /// Find the file declaring `name`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when no root contains a source or schema for the name.
    pub fn resolve_location(&self, name: &QualifiedName) -> Result<SourceLocation> {
        if let Some(location) = self.locations.get(name) {
            return Ok(location.clone());
        }

        let declaring = name.declaring_path();
        let schema = name.schema_path();
        for root in &self.roots {
            for parser in &self.parsers {
                let relative = declaring.with_extension(parser.extension());
                if root.join(&relative).is_file() {
                    return Ok(SourceLocation::new(root, relative));
                }
            }
            if root.join(&schema).is_file() {
                return Ok(SourceLocation::new(root, schema));
            }
        }
        Err(Error::NotFound(name.to_string()))
    }

    /// Parse the file at `location` and register every unit it declares.
    ///
    /// A file is parsed once; later calls return the cached names. A name declared by two files
    /// keeps the unit parsed first.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] when no parser handles the extension,
    /// [`Error::FileError`] when the file cannot be read and [`Error::Syntax`] when it cannot be
    /// parsed.
    pub fn parse_file(&self, location: &SourceLocation) -> Result<Arc<[QualifiedName]>> {
        if let Some(names) = self.files.get(&location.absolute) {
            return Ok(names.clone());
        }

        let extension = location.extension().unwrap_or_default();
        let parser = self.parser_for(extension).ok_or_else(|| {
            Error::NotSupported(format!(
                "no reader for '{}' files: {}",
                extension,
                location.absolute.display()
            ))
        })?;

        let text = fs::read_to_string(&location.absolute)?;
        let units = parser.parse(&location.absolute, &text)?;
        debug!(
            "parsed {} unit(s) from {}",
            units.len(),
            location.relative.display()
        );

        let mut names = Vec::with_capacity(units.len());
        for unit in units {
            let name = unit.qualified_name();
            self.locations
                .entry(name.clone())
                .or_insert_with(|| location.clone());
            self.units
                .entry(name.clone())
                .or_insert_with(|| Arc::new(unit));
            names.push(name);
        }

        let names: Arc<[QualifiedName]> = names.into();
        self.files
            .insert(location.absolute.clone(), names.clone());
        Ok(names)
    }

    /// Register a unit produced outside the loader, such as by an external Java front-end.
    pub fn insert_unit(&self, unit: DeclUnit) -> Arc<DeclUnit> {
        let unit = Arc::new(unit);
        self.units.insert(unit.qualified_name(), unit.clone());
        unit
    }

    /// The parsed unit for `name`, parsing its declaring file if needed.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when no source declares the name, or the errors of
    /// [`Loader::parse_file`].
    pub fn unit(&self, name: &QualifiedName) -> Result<Arc<DeclUnit>> {
        if let Some(unit) = self.units.get(name) {
            return Ok(unit.clone());
        }

        let location = self.resolve_location(name)?;
        if location.extension() == Some(SCHEMA_EXTENSION) {
            return Err(Error::NotSupported(format!(
                "{name} is only available as a persisted schema"
            )));
        }
        self.parse_file(&location)?;

        self.units
            .get(name)
            .map(|unit| unit.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// The declaration kind of `name`, without compiling sources.
    ///
    /// Persisted schemas are loaded into the class cache to answer.
    #[must_use]
    pub fn kind_of(&self, name: &QualifiedName) -> Option<UnitKind> {
        if let Some(unit) = self.units.get(name) {
            return Some(unit.kind.clone());
        }
        if let Ok(Some(class)) = self.classes.get(name) {
            return Some(class_kind(&class));
        }

        let location = self.resolve_location(name).ok()?;
        if location.extension() == Some(SCHEMA_EXTENSION) {
            return self.get_or_compile(name).ok().map(|class| class_kind(&class));
        }
        self.unit(name).ok().map(|unit| unit.kind.clone())
    }

    /// The compiled class for `name`, compiling it on first use.
    ///
    /// A request made while the same thread is already compiling `name` returns the in-flight
    /// placeholder, an empty parcelable. A request from another thread waits for the result.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when no root declares the name, or any error raised while
    /// reading or parsing its file. Failures are not cached.
    pub fn get_or_compile(&self, name: impl Into<QualifiedName>) -> Result<Arc<ClassDef>> {
        let name = name.into();
        self.classes
            .get_or_insert_with(&name, || self.compile_name(&name))
    }

    /// Compile `name` again and replace the cached class.
    ///
    /// # Errors
    /// Same as [`Loader::get_or_compile`].
    pub fn recompile(&self, name: impl Into<QualifiedName>) -> Result<Arc<ClassDef>> {
        let name = name.into();
        let class = self.compile_name(&name)?;
        self.classes.insert(class)
    }

    fn compile_name(&self, name: &QualifiedName) -> Result<ClassDef> {
        if !self.units.contains_key(name) {
            let location = self.resolve_location(name)?;
            if location.extension() == Some(SCHEMA_EXTENSION) {
                return self.load_schema(name, &location);
            }
        }

        let mut unit = self.unit(name)?;
        let mut location = self.locations.get(name).map(|location| location.clone());
        if unit.lacks_layout() {
            if let Some((sibling, found)) = self.sibling_unit(name, location.as_ref()) {
                unit = Arc::new(sibling);
                location = Some(found);
            }
        }

        let mut class = compiler::compile(&unit, self);
        class.location = location;
        Ok(class)
    }

    /// A declaration of `name` with a wire layout, read from its declaring path in another
    /// registered language.
    ///
    /// AIDL forward declarations (`parcelable Foo;`) defer to the Java class next to them. The
    /// sibling is parsed outside the unit registry, so the located declaration stays the one
    /// other lookups see.
    fn sibling_unit(
        &self,
        name: &QualifiedName,
        declared: Option<&SourceLocation>,
    ) -> Option<(DeclUnit, SourceLocation)> {
        let declaring = name.declaring_path();
        for root in &self.roots {
            for parser in &self.parsers {
                let location =
                    SourceLocation::new(root, declaring.with_extension(parser.extension()));
                if declared.is_some_and(|d| d.absolute == location.absolute)
                    || !location.absolute.is_file()
                {
                    continue;
                }

                let units = fs::read_to_string(&location.absolute)
                    .map_err(Error::from)
                    .and_then(|text| parser.parse(&location.absolute, &text));
                match units {
                    Ok(units) => {
                        let found = units
                            .into_iter()
                            .find(|unit| unit.qualified_name() == *name && !unit.lacks_layout());
                        if let Some(unit) = found {
                            debug!("{name}: layout from {}", location.relative.display());
                            return Some((unit, location));
                        }
                    }
                    Err(error) => warn!("{name}: skipping {}: {error}", location.absolute.display()),
                }
            }
        }
        None
    }

    fn load_schema(&self, name: &QualifiedName, location: &SourceLocation) -> Result<ClassDef> {
        let mut class = json::load(&location.absolute)?;
        if &class.name != name {
            return Err(malformed_error!(
                "{} declares '{}', expected '{}'",
                location.absolute.display(),
                class.name,
                name
            ));
        }
        if class.location.is_none() {
            class.location = Some(location.clone());
        }
        debug!("{name}: loaded persisted schema");
        Ok(class)
    }

    /// Compile every unit of the file declaring `name`, nested declarations included.
    ///
    /// # Errors
    /// Returns the location and parse errors of `name`'s file. A unit of the file that fails
    /// to compile fails the whole call.
    pub fn compile_file(&self, name: impl Into<QualifiedName>) -> Result<Vec<Arc<ClassDef>>> {
        let name = name.into();
        let location = self.resolve_location(&name)?;
        if location.extension() == Some(SCHEMA_EXTENSION) {
            return Ok(vec![self.get_or_compile(name)?]);
        }

        self.parse_file(&location)?
            .iter()
            .map(|declared| self.get_or_compile(declared))
            .collect()
    }

    /// Compile a single class, or every class of a package for a wildcard (`android.os.*`).
    ///
    /// Package members are returned in root order, then lexical path order, each name once.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCall`] for a malformed import, [`Error::NotFound`] for a single
    /// name without a source or a package no root contains, or the first compilation error.
    pub fn import_(&self, target: &str) -> Result<Vec<Arc<ClassDef>>> {
        let import: ImportDef = target.parse()?;
        if !import.wildcard {
            return Ok(vec![self.get_or_compile(import.path)?]);
        }

        let package_dir: PathBuf = import.path.segments().collect();
        let mut found = false;
        let mut seen = HashSet::new();
        let mut classes = Vec::new();

        for root in &self.roots {
            let dir = root.join(&package_dir);
            if !dir.is_dir() {
                continue;
            }
            found = true;

            let mut files = Vec::new();
            collect_files(&dir, false, &mut |path: &Path| self.is_loadable(path), &mut files)?;
            for path in files {
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                let location = SourceLocation::new(root, relative.to_path_buf());
                let names: Vec<QualifiedName> =
                    if location.extension() == Some(SCHEMA_EXTENSION) {
                        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                        vec![import.path.nested(stem)]
                    } else {
                        self.parse_file(&location)?.to_vec()
                    };

                for name in names {
                    if seen.insert(name.clone()) {
                        classes.push(self.get_or_compile(name)?);
                    }
                }
            }
        }

        if !found {
            return Err(Error::NotFound(target.to_string()));
        }
        Ok(classes)
    }

    /// Store an already compiled class, replacing any cached class of the same name.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] when the class breaks a schema invariant.
    pub fn insert(&self, class: ClassDef) -> Result<Arc<ClassDef>> {
        json::validate(&class)?;
        self.classes.insert(class)
    }

    /// Pre-seed the class cache with every `.json` schema below `dir`.
    ///
    /// Returns the number of schemas loaded.
    ///
    /// # Errors
    /// Returns the first read or validation error.
    pub fn load_schemas<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let mut files = Vec::new();
        collect_files(
            dir.as_ref(),
            true,
            &mut |path: &Path| path.extension().and_then(|e| e.to_str()) == Some(SCHEMA_EXTENSION),
            &mut files,
        )?;

        for path in &files {
            self.insert(json::load(path)?)?;
        }
        debug!("loaded {} schema(s) from {}", files.len(), dir.as_ref().display());
        Ok(files.len())
    }

    /// Enumerate every declaration under the roots that a registered parser reads.
    ///
    /// Unreadable files are collected in [`Discovery::failures`] instead of aborting the scan.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if a root directory cannot be listed.
    pub fn discover(&self, recursive: bool) -> Result<Discovery> {
        let mut discovery = Discovery::default();
        let mut seen = HashSet::new();

        for root in &self.roots {
            let mut files = Vec::new();
            collect_files(
                root,
                recursive,
                &mut |path: &Path| {
                    path.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| self.parser_for(e).is_some())
                },
                &mut files,
            )?;

            for path in files {
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                match self.parse_file(&SourceLocation::new(root, relative.to_path_buf())) {
                    Ok(names) => discovery
                        .names
                        .extend(names.iter().filter(|n| seen.insert((*n).clone())).cloned()),
                    Err(error) => {
                        warn!("skipping {}: {error}", path.display());
                        discovery.failures.push((path, error));
                    }
                }
            }
        }
        Ok(discovery)
    }

    /// Compile `names` in parallel.
    ///
    /// Failures are reported per name and never stop the other compilations.
    pub fn compile_all(&self, names: &[QualifiedName]) -> CompileReport {
        let results: Vec<_> = names
            .par_iter()
            .map(|name| (name, self.get_or_compile(name)))
            .collect();

        let mut report = CompileReport::default();
        for (name, result) in results {
            match result {
                Ok(class) => report.compiled.push(class),
                Err(error) => {
                    warn!("{name}: {error}");
                    report.failed.push((name.clone(), error));
                }
            }
        }
        report
    }

    /// Summaries of every declaration in the file declaring `name`.
    ///
    /// # Errors
    /// Returns the location and parse errors of `name`'s file.
    pub fn describe(&self, name: impl Into<QualifiedName>) -> Result<Vec<UnitInfo>> {
        let name = name.into();
        let location = self.resolve_location(&name)?;
        if location.extension() == Some(SCHEMA_EXTENSION) {
            let class = self.get_or_compile(&name)?;
            return Ok(vec![UnitInfo::from_class(
                &class,
                location.relative,
                location.absolute,
            )]);
        }

        self.parse_file(&location)?
            .iter()
            .map(|declared| {
                let unit = self.unit(declared)?;
                Ok(UnitInfo::from_unit(
                    &unit,
                    location.relative.clone(),
                    self.is_compiled(declared)?,
                ))
            })
            .collect()
    }

    /// Whether `name` is in the compiled-class cache.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the cache lock is poisoned.
    pub fn is_compiled(&self, name: &QualifiedName) -> Result<bool> {
        Ok(self.classes.get(name)?.is_some())
    }

    /// Number of compiled classes in the cache.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the cache lock is poisoned.
    pub fn compiled_count(&self) -> Result<usize> {
        self.classes.len()
    }
}

fn class_kind(class: &ClassDef) -> UnitKind {
    match &class.kind {
        ClassKind::Binder(_) => UnitKind::Interface,
        ClassKind::Parcelable(def) => UnitKind::Parcelable {
            structured: def.structured,
        },
    }
}

/// Files below `dir` accepted by `filter`, sorted by path.
fn collect_files(
    dir: &Path,
    recursive: bool,
    filter: &mut dyn FnMut(&Path) -> bool,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    let start = files.len();
    collect_files_recursive(dir, recursive, filter, files)?;
    files[start..].sort();
    Ok(())
}

fn collect_files_recursive(
    dir: &Path,
    recursive: bool,
    filter: &mut dyn FnMut(&Path) -> bool,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_files_recursive(&path, recursive, filter, files)?;
            }
        } else if filter(&path) {
            files.push(path);
        }
    }
    Ok(())
}
