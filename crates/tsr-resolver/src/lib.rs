//! Module graph resolution.
//!
//! From an entry specifier and a source provider, builds the dependency
//! graph by depth-first search: each module is parsed once, its import
//! specifiers are resolved (relative paths against the importer, bare
//! names against the built-in host-module table and then a user
//! resolver), and dependencies are visited before the importer. The
//! initialization order is the DFS post-order, which yields leaves first
//! with a deterministic first-seen tie-break.
//!
//! Cycles are permitted: a cycle-broken module publishes its bindings
//! lazily through cells written when its body executes. A module using
//! `export =` inside a cycle cannot converge and is a diagnostic.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::Span;
use tsr_parser::ast::{ImportKind, StmtKind};
use tsr_parser::{SourceModule, parse_module};

/// Handle to a module in the graph, indexing `ModuleGraph::modules`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl ModuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Host modules resolvable by bare name. Their surfaces are ambient
/// signature tables, not source modules.
pub const BUILTIN_MODULES: &[&str] = &[
    "fs",
    "path",
    "crypto",
    "url",
    "querystring",
    "zlib",
    "http",
    "child_process",
    "dns",
    "perf_hooks",
    "readline",
    "stream",
    "timers",
];

pub fn is_builtin_module(specifier: &str) -> bool {
    BUILTIN_MODULES.contains(&specifier)
}

/// Supplies module source text by resolved specifier.
pub trait SourceProvider {
    fn source(&self, specifier: &str) -> Option<String>;
}

/// Map-backed provider, the common case for tests and embedders.
#[derive(Debug, Default)]
pub struct MapProvider {
    sources: FxHashMap<String, String>,
}

impl MapProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, specifier: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.sources.insert(specifier.into(), source.into());
        self
    }
}

impl SourceProvider for MapProvider {
    fn source(&self, specifier: &str) -> Option<String> {
        self.sources.get(specifier).cloned()
    }
}

/// One resolved import edge.
#[derive(Clone, Debug)]
pub struct ImportRecord {
    /// Specifier as written in the source.
    pub raw: String,
    /// Resolved target, when the module was found.
    pub target: ImportTarget,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportTarget {
    Module(ModuleId),
    Builtin,
    Missing,
}

/// Shape of a module's exports, computed syntactically.
#[derive(Clone, Debug, Default)]
pub struct ExportShape {
    /// Exported names in declaration order.
    pub named: IndexMap<String, ()>,
    pub has_default: bool,
    pub has_export_assignment: bool,
    /// `export * from "m"` targets (resolved specifiers).
    pub star_reexports: Vec<String>,
}

/// A module with its parsed body and resolution results.
#[derive(Debug)]
pub struct ResolvedModule {
    pub id: ModuleId,
    pub specifier: String,
    pub ast: SourceModule,
    pub imports: Vec<ImportRecord>,
    pub exports: ExportShape,
    /// True when this module participates in an import cycle.
    pub in_cycle: bool,
}

/// The resolved graph: modules in initialization order.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    pub modules: Vec<ResolvedModule>,
    by_specifier: FxHashMap<String, ModuleId>,
}

impl ModuleGraph {
    pub fn by_specifier(&self, specifier: &str) -> Option<&ResolvedModule> {
        self.by_specifier
            .get(specifier)
            .map(|&id| &self.modules[id.index()])
    }

    pub fn entry(&self) -> Option<&ResolvedModule> {
        self.modules.last()
    }
}

/// Resolve a specifier against its importer.
///
/// Relative specifiers are joined onto the importer's directory and
/// normalized; bare names pass through (for the builtin table or the
/// user resolver).
pub fn resolve_specifier(importer: &str, specifier: &str) -> String {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return specifier.to_string();
    }
    let mut segments: Vec<&str> = importer.split('/').collect();
    segments.pop(); // drop the importer's file name
    for segment in specifier.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Build the module graph from an entry specifier.
pub fn resolve_graph(
    entry: &str,
    provider: &dyn SourceProvider,
    sink: &DiagnosticSink,
) -> ModuleGraph {
    let mut resolver = Resolver {
        provider,
        sink: sink.clone(),
        graph: ModuleGraph::default(),
        state: FxHashMap::default(),
        stack: Vec::new(),
        cyclic: FxHashSet::default(),
    };
    resolver.visit(entry, entry, Span::dummy());
    let mut graph = resolver.graph;

    // Back edges inside cycles could not know their target id during the
    // DFS; patch them now that every module is placed.
    let by_specifier = graph.by_specifier.clone();
    for module in &mut graph.modules {
        for import in &mut module.imports {
            if import.target == ImportTarget::Missing
                && let Some(&id) = by_specifier.get(&import.raw)
            {
                import.target = ImportTarget::Module(id);
            }
        }
    }
    debug!(modules = graph.modules.len(), "module graph resolved");
    graph
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done(ModuleId),
}

struct Resolver<'a> {
    provider: &'a dyn SourceProvider,
    sink: DiagnosticSink,
    graph: ModuleGraph,
    state: FxHashMap<String, VisitState>,
    /// Current DFS path, for cycle marking.
    stack: Vec<String>,
    /// Modules observed on at least one import cycle.
    cyclic: FxHashSet<String>,
}

impl<'a> Resolver<'a> {
    /// Visit `specifier` (already resolved); returns its target.
    fn visit(&mut self, specifier: &str, importer: &str, span: Span) -> ImportTarget {
        if is_builtin_module(specifier) {
            return ImportTarget::Builtin;
        }
        match self.state.get(specifier) {
            Some(VisitState::Done(id)) => return ImportTarget::Module(*id),
            Some(VisitState::Visiting) => {
                // Back edge: everything from the target to the top of the
                // DFS stack lies on a cycle.
                if let Some(position) = self.stack.iter().position(|s| s == specifier) {
                    for member in &self.stack[position..] {
                        self.cyclic.insert(member.clone());
                    }
                }
                // The target id is not known yet; patched after the DFS.
                return ImportTarget::Missing;
            }
            None => {}
        }

        let Some(source) = self.provider.source(specifier) else {
            self.sink
                .error(importer, span, codes::MODULE_NOT_FOUND, &[specifier]);
            return ImportTarget::Missing;
        };

        self.state
            .insert(specifier.to_string(), VisitState::Visiting);
        self.stack.push(specifier.to_string());

        let ast = parse_module(specifier, &source, &self.sink);
        let mut imports = Vec::new();
        for &stmt_id in &ast.statements {
            let stmt = ast.arena.stmt(stmt_id);
            let raw = match &stmt.kind {
                StmtKind::Import { specifier, .. } => Some(specifier.clone()),
                StmtKind::ExportNamed {
                    from: Some(from), ..
                } => Some(from.clone()),
                StmtKind::ExportStar { from } => Some(from.clone()),
                _ => None,
            };
            let Some(raw) = raw else { continue };
            let resolved = resolve_specifier(specifier, &raw);
            let target = self.visit(&resolved, specifier, stmt.span);
            imports.push(ImportRecord {
                raw: resolved,
                target,
                span: stmt.span,
            });
        }

        self.stack.pop();
        let in_cycle = self.cyclic.contains(specifier);

        let exports = collect_exports(specifier, &ast, &self.sink);
        if exports.has_export_assignment && in_cycle {
            self.sink.error(
                specifier,
                Span::dummy(),
                codes::EXPORT_ASSIGNMENT_CYCLE,
                &[specifier],
            );
        }

        let id = ModuleId(self.graph.modules.len() as u32);
        self.graph.modules.push(ResolvedModule {
            id,
            specifier: specifier.to_string(),
            ast,
            imports,
            exports,
            in_cycle,
        });
        self.graph.by_specifier.insert(specifier.to_string(), id);
        self.state
            .insert(specifier.to_string(), VisitState::Done(id));
        ImportTarget::Module(id)
    }
}

/// Collect a module's export shape from its top-level statements.
fn collect_exports(specifier: &str, ast: &SourceModule, sink: &DiagnosticSink) -> ExportShape {
    let mut shape = ExportShape::default();
    for &stmt_id in &ast.statements {
        let stmt = ast.arena.stmt(stmt_id);
        match &stmt.kind {
            StmtKind::ExportDefault(_) => {
                if shape.has_default {
                    sink.error(specifier, stmt.span, codes::DUPLICATE_DEFAULT_EXPORT, &[]);
                }
                shape.has_default = true;
            }
            StmtKind::ExportAssignment(_) => {
                shape.has_export_assignment = true;
            }
            StmtKind::ExportNamed { specifiers, from } => {
                for spec in specifiers {
                    if shape
                        .named
                        .insert(spec.exported.to_string(), ())
                        .is_some()
                    {
                        sink.error(
                            specifier,
                            spec.span,
                            codes::DUPLICATE_EXPORT,
                            &[&spec.exported],
                        );
                    }
                }
                let _ = from;
            }
            StmtKind::ExportStar { from } => {
                shape
                    .star_reexports
                    .push(resolve_specifier(specifier, from));
            }
            StmtKind::ExportDecl(inner) => {
                let inner_stmt = ast.arena.stmt(*inner);
                match &inner_stmt.kind {
                    StmtKind::VarDecl { declarations, .. } => {
                        for decl in declarations {
                            shape.named.insert(decl.name.to_string(), ());
                        }
                    }
                    StmtKind::FunctionDecl { name, .. } => {
                        shape.named.insert(name.to_string(), ());
                    }
                    StmtKind::ClassDecl(class_id) => {
                        shape
                            .named
                            .insert(ast.arena.class(*class_id).name.to_string(), ());
                    }
                    StmtKind::InterfaceDecl(interface_id) => {
                        shape
                            .named
                            .insert(ast.arena.interface(*interface_id).name.to_string(), ());
                    }
                    StmtKind::TypeAlias { name, .. } | StmtKind::EnumDecl { name, .. } => {
                        shape.named.insert(name.to_string(), ());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    shape
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
