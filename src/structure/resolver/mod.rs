//! Structure resolution - walking the usage graph under a configuration spec
//!
//! `StructureWalk` is a lazy depth-first pre-order iterator over the nodes a
//! spec makes visible. Each yielded node carries its cumulative `Path` and
//! the link chain that leads to it. Calling `prune()` after receiving a node
//! skips that node's subtree; dropping the iterator aborts the walk.
//!
//! The walk refuses to expand a link whose component is already on the
//! active recursion stack, so it is bounded even on corrupt data. Reuse of
//! a component through two different paths (a diamond) is legal.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::{IterationRef, LinkCode, LinkId, PartKey};
use crate::entities::link::PartLink;
use crate::entities::part::PartIteration;
use crate::structure::filter::ConfigSpec;
use crate::structure::loader::{PartLoader, ReadView};
use crate::structure::path::{self, Path};


/// Where a traversal starts
#[derive(Debug, Clone)]
pub enum Start {
    /// At the root assembly, path `-1`
    Part(PartKey),
    /// At a node below `root`, addressed by its path
    Path { root: PartKey, path: Path },
}

/// One node produced by a walk
#[derive(Debug, Clone)]
pub struct VisitedNode<'l> {
    pub path: Path,
    /// Links from the root to this node; empty for the root
    pub chain: Vec<PartLink<'l>>,
    pub part: PartKey,
    pub name: String,
    pub at: IterationRef,
    /// Levels below the start node
    pub depth: usize,
    pub is_assembly: bool,
}

impl<'l> VisitedNode<'l> {
    /// Link this node was reached through, `None` for the root
    pub fn link(&self) -> Option<&PartLink<'l>> {
        self.chain.last()
    }
}

/// Callback verdict for `StructureResolver::visit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Keep this node, skip its children
    Prune,
    /// Abandon the whole traversal
    Stop,
}

/// Result of a callback-driven visit
#[derive(Debug, Clone)]
pub enum VisitOutcome {
    Tree(Component),
    /// The start node has no visible iteration under the `ConfigSpec`
    Invisible,
    Aborted,
}

impl VisitOutcome {
    pub fn into_tree(self) -> Option<Component> {
        match self {
            VisitOutcome::Tree(component) => Some(component),
            _ => None,
        }
    }
}

/// What a tree node stands for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentKind {
    Part {
        part: PartKey,
        name: String,
        version: String,
        iteration: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        link: Option<LinkCode>,
        amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    /// Synthetic, non-persisted node grouping link-query results
    Virtual { label: String },
}

/// Node of a resolved assembly tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    #[serde(flatten)]
    pub kind: ComponentKind,
    pub path: Path,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Component>,
}

impl Component {
    fn from_node(node: &VisitedNode<'_>) -> Self {
        let link = node.link();
        Component {
            kind: ComponentKind::Part {
                part: node.part.clone(),
                name: node.name.clone(),
                version: node.at.version.clone(),
                iteration: node.at.iteration,
                link: link.map(|l| l.code()),
                amount: link.map_or(1.0, |l| l.amount()),
                unit: link.and_then(|l| l.unit()).map(str::to_string),
            },
            path: node.path.clone(),
            children: Vec::new(),
        }
    }

    /// Synthetic root labelled `label` wrapping `children`
    pub fn virtual_root(label: impl Into<String>, children: Vec<Component>) -> Self {
        Component {
            kind: ComponentKind::Virtual {
                label: label.into(),
            },
            path: Path::ROOT,
            children,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, ComponentKind::Virtual { .. })
    }

    pub fn part(&self) -> Option<&PartKey> {
        match &self.kind {
            ComponentKind::Part { part, .. } => Some(part),
            ComponentKind::Virtual { .. } => None,
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Component::size).sum::<usize>()
    }

    /// Plain-text indented rendering, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        match &self.kind {
            ComponentKind::Part {
                part,
                version,
                iteration,
                link,
                amount,
                unit,
                ..
            } => {
                let marker = match link {
                    Some(LinkCode::Substitute) => " (substitute)",
                    _ => "",
                };
                let qty = match unit {
                    Some(unit) => format!(" x{} {}", amount, unit),
                    None if indent > 0 => format!(" x{}", amount),
                    None => String::new(),
                };
                out.push_str(&format!(
                    "{}{} {}.{}{}{} [{}]\n",
                    pad, part, version, iteration, qty, marker, self.path
                ));
            }
            ComponentKind::Virtual { label } => {
                out.push_str(&format!("{}<{}>\n", pad, label));
            }
        }
        for child in &self.children {
            child.render_into(out, indent + 1);
        }
    }
}

/// One line of a flattened bill of material
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupLine {
    pub part: PartKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub quantity: f64,
    pub occurrences: usize,
}

struct Pending<'l> {
    part: PartKey,
    chain: Vec<PartLink<'l>>,
    path: Path,
    /// Masters on the active recursion stack above this node
    ancestors: Vec<PartKey>,
    depth: usize,
}

struct Expansion<'l> {
    chain: Vec<PartLink<'l>>,
    path: Path,
    ancestors: Vec<PartKey>,
    depth: usize,
    components: Vec<LinkId>,
}

/// Lazy pre-order traversal of a product structure
pub struct StructureWalk<'l, L: PartLoader + ?Sized> {
    loader: &'l L,
    spec: &'l ConfigSpec,
    reader: Option<String>,
    max_depth: Option<usize>,
    stack: Vec<Pending<'l>>,
    expand: Option<Expansion<'l>>,
    started: bool,
    finished: bool,
}

impl<'l, L: PartLoader + ?Sized> StructureWalk<'l, L> {
    fn new(
        loader: &'l L,
        spec: &'l ConfigSpec,
        reader: Option<String>,
        start: Start,
        max_depth: Option<usize>,
    ) -> PlmResult<Self> {
        let first = match start {
            Start::Part(root) => Pending {
                part: root,
                chain: Vec::new(),
                path: Path::ROOT,
                ancestors: Vec::new(),
                depth: 0,
            },
            Start::Path { root, path } => {
                let chain = path::resolve(loader.links(), &path)?;
                let (part, ancestors) = match chain.split_last() {
                    None => (root, Vec::new()),
                    Some((last, above)) => {
                        let mut ancestors = vec![root];
                        ancestors.extend(above.iter().map(|l| l.component().clone()));
                        (last.component().clone(), ancestors)
                    }
                };
                Pending {
                    part,
                    chain,
                    path,
                    ancestors,
                    depth: 0,
                }
            }
        };
        Ok(Self {
            loader,
            spec,
            reader,
            max_depth,
            stack: vec![first],
            expand: None,
            started: false,
            finished: false,
        })
    }

    /// Skip the subtree of the node returned by the last `next()`
    pub fn prune(&mut self) {
        self.expand = None;
    }

    fn expand_children(&mut self, expansion: Expansion<'l>) -> PlmResult<()> {
        let links = self.spec.filter_links(
            self.loader.links(),
            &expansion.path,
            &expansion.components,
            self.spec.diverge(),
        )?;
        for link in links.into_iter().rev() {
            let child = link.component();
            if expansion.ancestors.contains(child) {
                return Err(PlmError::not_allowed(format!(
                    "cyclic assembly: {} is used within itself at {}",
                    child,
                    expansion.path.child(&link)
                )));
            }
            let mut chain = expansion.chain.clone();
            chain.push(link);
            self.stack.push(Pending {
                part: child.clone(),
                path: expansion.path.child(&link),
                chain,
                ancestors: expansion.ancestors.clone(),
                depth: expansion.depth + 1,
            });
        }
        Ok(())
    }

    fn fail(&mut self, err: PlmError) -> Option<PlmResult<VisitedNode<'l>>> {
        self.finished = true;
        self.stack.clear();
        Some(Err(err))
    }
}

impl<'l, L: PartLoader + ?Sized> Iterator for StructureWalk<'l, L> {
    type Item = PlmResult<VisitedNode<'l>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(expansion) = self.expand.take() {
            if let Err(err) = self.expand_children(expansion) {
                return self.fail(err);
            }
        }

        while let Some(pending) = self.stack.pop() {
            let is_start = !self.started;
            self.started = true;

            let view = ReadView {
                reader: self.reader.as_deref(),
                working_copies_of: self.spec.viewer(),
            };
            let master = match self.loader.load_master(&pending.part, view) {
                Ok(master) => master,
                Err(PlmError::AccessDenied { user, key }) if !is_start => {
                    debug!(%user, %key, path = %pending.path, "branch not readable, pruned");
                    continue;
                }
                Err(err) => return self.fail(err),
            };

            let Some(selected) = self.spec.select(&master) else {
                debug!(part = %pending.part, path = %pending.path, spec = %self.spec.label(), "no visible iteration, pruned");
                continue;
            };

            let node = VisitedNode {
                path: pending.path.clone(),
                chain: pending.chain.clone(),
                part: pending.part.clone(),
                name: master.name.clone(),
                at: selected.at(),
                depth: pending.depth,
                is_assembly: selected.iteration.is_assembly(),
            };

            let within_depth = self.max_depth.map_or(true, |max| pending.depth < max);
            if within_depth && node.is_assembly {
                let mut ancestors = pending.ancestors;
                ancestors.push(pending.part);
                self.expand = Some(Expansion {
                    chain: pending.chain,
                    path: pending.path,
                    ancestors,
                    depth: pending.depth,
                    components: selected.iteration.components.clone(),
                });
            }
            return Some(Ok(node));
        }

        self.finished = true;
        None
    }
}

/// Entry point for structure queries over a loader
///
/// A resolver built with `new` reads with the system view and ignores
/// reader lists; `reading_as` makes branches the user cannot read vanish.
pub struct StructureResolver<'l, L: PartLoader + ?Sized> {
    loader: &'l L,
    reader: Option<String>,
}

impl<'l, L: PartLoader + ?Sized> StructureResolver<'l, L> {
    pub fn new(loader: &'l L) -> Self {
        Self {
            loader,
            reader: None,
        }
    }

    /// Check every master against `user`'s read access, whatever the spec
    pub fn reading_as(mut self, user: impl Into<String>) -> Self {
        self.reader = Some(user.into());
        self
    }

    /// Lazy walk; `max_depth` of `None` means unlimited
    pub fn walk(
        &self,
        spec: &'l ConfigSpec,
        start: Start,
        max_depth: Option<usize>,
    ) -> PlmResult<StructureWalk<'l, L>> {
        StructureWalk::new(self.loader, spec, self.reader.clone(), start, max_depth)
    }

    /// Walk and build the component tree, letting `callback` prune or stop
    pub fn visit<F>(
        &self,
        spec: &'l ConfigSpec,
        start: Start,
        max_depth: Option<usize>,
        mut callback: F,
    ) -> PlmResult<VisitOutcome>
    where
        F: FnMut(&VisitedNode<'l>) -> Visit,
    {
        let mut walk = self.walk(spec, start, max_depth)?;
        // open components, one per depth level
        let mut open: Vec<Component> = Vec::new();

        while let Some(node) = walk.next() {
            let node = node?;
            match callback(&node) {
                Visit::Stop => return Ok(VisitOutcome::Aborted),
                Visit::Prune => walk.prune(),
                Visit::Continue => {}
            }
            close_to_depth(&mut open, node.depth);
            open.push(Component::from_node(&node));
        }

        close_to_depth(&mut open, 1);
        Ok(match open.pop() {
            Some(root) => VisitOutcome::Tree(root),
            None => VisitOutcome::Invisible,
        })
    }

    /// Full tree under `spec`
    pub fn resolve_tree(
        &self,
        spec: &'l ConfigSpec,
        start: Start,
        max_depth: Option<usize>,
    ) -> PlmResult<Option<Component>> {
        self.visit(spec, start, max_depth, |_| Visit::Continue)
            .map(VisitOutcome::into_tree)
    }

    /// Paths of every visible node accepted by `predicate`
    pub fn find_paths<F>(
        &self,
        spec: &'l ConfigSpec,
        root: PartKey,
        mut predicate: F,
    ) -> PlmResult<Vec<Path>>
    where
        F: FnMut(&VisitedNode<'l>) -> bool,
    {
        let mut found = Vec::new();
        for node in self.walk(spec, Start::Part(root), None)? {
            let node = node?;
            if predicate(&node) {
                found.push(node.path);
            }
        }
        Ok(found)
    }

    /// Total quantity of every part below `root`, amounts multiplied down the tree
    pub fn rollup(&self, spec: &'l ConfigSpec, root: PartKey) -> PlmResult<Vec<RollupLine>> {
        let mut totals: BTreeMap<(PartKey, Option<String>), (f64, usize)> = BTreeMap::new();
        for node in self.walk(spec, Start::Part(root), None)? {
            let node = node?;
            let Some(link) = node.link() else {
                continue;
            };
            let quantity: f64 = node.chain.iter().map(|l| l.amount()).product();
            let entry = totals
                .entry((node.part.clone(), link.unit().map(str::to_string)))
                .or_insert((0.0, 0));
            entry.0 += quantity;
            entry.1 += 1;
        }
        Ok(totals
            .into_iter()
            .map(|((part, unit), (quantity, occurrences))| RollupLine {
                part,
                unit,
                quantity,
                occurrences,
            })
            .collect())
    }
}

/// Fail `NotAllowed` if `iteration`, standing in for `part`, would make the
/// assembly use itself
///
/// The unsaved iteration replaces its master through a `PendingEdit` spec;
/// every other master resolves as the editor's WIP, substitutes included.
/// Reader lists are not applied, so a cycle through a master the editor
/// cannot read is still found.
pub fn check_cyclic_assembly<L: PartLoader + ?Sized>(
    loader: &L,
    part: &PartKey,
    version: &str,
    iteration: &PartIteration,
    editor: &str,
) -> PlmResult<()> {
    let spec = ConfigSpec::PendingEdit {
        part: part.clone(),
        version: version.to_string(),
        iteration: Box::new(iteration.clone()),
        viewer: editor.to_string(),
        diverge: true,
    };
    let resolver = StructureResolver::new(loader);
    let mut visited = 0usize;
    for node in resolver.walk(&spec, Start::Part(part.clone()), None)? {
        node?;
        visited += 1;
    }
    debug!(%part, visited, "cyclic assembly check passed");
    Ok(())
}

fn close_to_depth(open: &mut Vec<Component>, depth: usize) {
    while open.len() > depth.max(1) {
        if let Some(done) = open.pop() {
            if let Some(parent) = open.last_mut() {
                parent.children.push(done);
            }
        }
    }
}
