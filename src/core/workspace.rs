//! In-memory workspace - the aggregate every operation runs against
//!
//! A `Workspace` owns the part masters, the link arena, products, baselines
//! and product instances of one project. Mutations take `&mut self`, so a
//! call either completes or leaves the workspace as it found it.

use chrono::Utc;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use ulid::Ulid;

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::{next_version, IterationRef, LinkId, PartKey};
use crate::entities::baseline::{
    BaselineChoices, BaselineKind, FrozenConfiguration, InstanceIteration, ProductBaseline,
    ProductInstance,
};
use crate::entities::link::{LinkArena, NewSubstitute, NewUsage, PartLink, UsageLink};
use crate::entities::part::{
    Attachment, PartIteration, PartMaster, PartRevision, RevisionState,
};
use crate::entities::product::{ConfigurationItem, PathToPathLink};
use crate::structure::filter::ConfigSpec;
use crate::structure::link_graph::{self, LinkGraphValidator};
use crate::structure::loader::{PartLoader, ReadView};
use crate::structure::path::{self, Path};
use crate::structure::resolver::{
    check_cyclic_assembly, Component, Start, StructureResolver,
};
use crate::structure::selector::FilterSelector;

/// One entry of a component edit
#[derive(Debug, Clone)]
pub enum ComponentEdit {
    /// Keep an existing usage link of the working iteration as it is
    Keep(LinkId),
    /// Create a new usage link
    New(NewUsage),
}

/// Replacement content for a working iteration; `None` fields stay as they are
#[derive(Debug, Clone, Default)]
pub struct IterationEdit {
    pub components: Option<Vec<ComponentEdit>>,
    pub attributes: Option<BTreeMap<String, String>>,
    /// Attachment names; existing attachments with the same name are kept
    pub attachments: Option<Vec<String>>,
    pub note: Option<String>,
}

/// Masters, links and product data of one project
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    masters: BTreeMap<PartKey, PartMaster>,
    links: LinkArena,
    products: BTreeMap<String, ConfigurationItem>,
    baselines: BTreeMap<u32, ProductBaseline>,
    instances: BTreeMap<(String, String), ProductInstance>,
}

impl PartLoader for Workspace {
    fn load_master(
        &self,
        key: &PartKey,
        view: ReadView<'_>,
    ) -> PlmResult<Cow<'_, PartMaster>> {
        let master = self
            .masters
            .get(key)
            .ok_or_else(|| PlmError::not_found("part master", key))?;
        if let Some(reader) = view.reader {
            if !master.can_read(reader) {
                return Err(PlmError::AccessDenied {
                    user: reader.to_string(),
                    key: key.to_string(),
                });
            }
        }
        if master.hides_work_from(view.working_copies_of) {
            Ok(Cow::Owned(master.visible_to(view.working_copies_of)))
        } else {
            Ok(Cow::Borrowed(master))
        }
    }

    fn links(&self) -> &LinkArena {
        &self.links
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a workspace from persisted pieces
    pub fn from_parts(
        masters: Vec<PartMaster>,
        links: LinkArena,
        products: Vec<ConfigurationItem>,
        baselines: Vec<ProductBaseline>,
        instances: Vec<ProductInstance>,
    ) -> Self {
        Self {
            masters: masters
                .into_iter()
                .map(|m| (m.number.clone(), m))
                .collect(),
            links,
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            baselines: baselines.into_iter().map(|b| (b.id, b)).collect(),
            instances: instances
                .into_iter()
                .map(|i| ((i.product.clone(), i.serial.clone()), i))
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Part masters
    // ------------------------------------------------------------------

    pub fn masters(&self) -> impl Iterator<Item = &PartMaster> {
        self.masters.values()
    }

    pub fn master(&self, number: &PartKey) -> PlmResult<&PartMaster> {
        self.masters
            .get(number)
            .ok_or_else(|| PlmError::not_found("part master", number))
    }

    pub(crate) fn master_mut(&mut self, number: &PartKey) -> PlmResult<&mut PartMaster> {
        self.masters
            .get_mut(number)
            .ok_or_else(|| PlmError::not_found("part master", number))
    }

    /// New master with revision A, iteration 1, checked out by `author`
    pub fn create_master(
        &mut self,
        number: &str,
        name: &str,
        author: &str,
    ) -> PlmResult<&PartMaster> {
        let key = PartKey::new(number.trim())?;
        if self.masters.contains_key(&key) {
            return Err(PlmError::not_allowed(format!(
                "part master {} already exists",
                key
            )));
        }
        let mut master = PartMaster::new(key.clone(), name, author);
        if let Some(revision) = master.last_revision_mut() {
            revision.state = RevisionState::CheckedOut {
                by: author.to_string(),
                since: Utc::now(),
            };
        }
        info!(part = %key, author, "part master created");
        Ok(self.masters.entry(key).or_insert(master))
    }

    /// Restrict read access to `readers`; an empty list opens it to everybody
    pub fn set_readers(&mut self, number: &PartKey, readers: Vec<String>) -> PlmResult<()> {
        self.master_mut(number)?.readers = readers;
        Ok(())
    }

    /// Append the next revision, seeded from the newest checked-in iteration
    /// of the current last revision and checked out by `user`
    pub fn new_version(&mut self, number: &PartKey, user: &str) -> PlmResult<String> {
        let master = self.master(number)?;
        let last = master
            .last_revision()
            .ok_or_else(|| PlmError::not_allowed(format!("{} has no revision", number)))?;
        if last.is_checked_out() {
            return Err(PlmError::not_allowed(format!(
                "{} {} is checked out",
                number, last.version
            )));
        }
        let version = next_version(&last.version);
        let seed = last.last_checked_in_iteration().cloned();

        let at = IterationRef::new(version.clone(), 1);
        let mut iteration = PartIteration::new(1, user);
        if let Some(seed) = seed {
            iteration.components = self.clone_components(&seed.components);
            iteration.attributes = seed.attributes;
            iteration.attachments = seed
                .attachments
                .iter()
                .map(|a| Attachment::for_iteration(number, &at, &a.name))
                .collect();
        }

        let mut revision = PartRevision::new(version.clone(), user);
        revision.iterations.push(iteration);
        revision.state = RevisionState::CheckedOut {
            by: user.to_string(),
            since: Utc::now(),
        };
        self.master_mut(number)?.revisions.push(revision);
        info!(part = %number, %version, user, "new revision created");
        Ok(version)
    }

    /// Copy usage links (and their substitutes) under fresh ids
    pub(crate) fn clone_components(&mut self, components: &[LinkId]) -> Vec<LinkId> {
        components
            .iter()
            .filter_map(|id| self.links.clone_usage(*id))
            .collect()
    }

    /// Delete usage links, with their substitutes, owned by a discarded iteration
    pub(crate) fn discard_links(&mut self, ids: &[LinkId]) {
        for id in ids {
            self.links.remove_usage(*id);
        }
    }

    /// Replace the content of the working iteration checked out by `user`
    ///
    /// New links get fresh ids. The cyclic-assembly check runs against the
    /// edited iteration before anything is committed; on failure the link
    /// arena is restored. Links of the old iteration that are not kept are
    /// deleted and path-to-path links that no longer resolve are pruned.
    pub fn update_iteration(
        &mut self,
        number: &PartKey,
        user: &str,
        edit: IterationEdit,
    ) -> PlmResult<IterationRef> {
        let (version, working) = {
            let master = self.master(number)?;
            let revision = master
                .last_revision()
                .filter(|r| r.is_checked_out_by(user))
                .ok_or_else(|| {
                    PlmError::not_allowed(format!("{} is not checked out by {}", number, user))
                })?;
            let working = revision
                .last_iteration()
                .cloned()
                .ok_or_else(|| PlmError::not_allowed(format!("{} has no iteration", number)))?;
            (revision.version.clone(), working)
        };
        let at = IterationRef::new(version.clone(), working.number);

        let mut edited = working.clone();
        let mut dropped: Vec<LinkId> = Vec::new();
        let backup = match edit.components {
            Some(components) => {
                self.validate_component_edit(&working, &components)?;
                let backup = self.links.clone();
                let mut ids = Vec::with_capacity(components.len());
                for component in components {
                    ids.push(match component {
                        ComponentEdit::Keep(id) => id,
                        ComponentEdit::New(request) => self.links.insert(request),
                    });
                }
                dropped = working
                    .components
                    .iter()
                    .filter(|id| !ids.contains(id))
                    .copied()
                    .collect();
                edited.components = ids;
                Some(backup)
            }
            None => None,
        };

        if let Some(backup) = backup {
            if let Err(err) = check_cyclic_assembly(&*self, number, &version, &edited, user) {
                self.links = backup;
                return Err(err);
            }
        }

        if let Some(attributes) = edit.attributes {
            edited.attributes = attributes;
        }
        if let Some(names) = edit.attachments {
            edited.attachments = names
                .iter()
                .map(|name| Attachment::for_iteration(number, &at, name))
                .collect();
        }
        if edit.note.is_some() {
            edited.note = edit.note;
        }

        let master = self.master_mut(number)?;
        if let Some(slot) = master
            .last_revision_mut()
            .and_then(|r| r.iterations.last_mut())
        {
            *slot = edited;
        }
        self.discard_links(&dropped);
        if !dropped.is_empty() {
            self.prune_stale_path_links();
        }
        debug!(part = %number, %at, dropped = dropped.len(), "working iteration updated");
        Ok(at)
    }

    fn validate_component_edit(
        &self,
        working: &PartIteration,
        components: &[ComponentEdit],
    ) -> PlmResult<()> {
        for component in components {
            match component {
                ComponentEdit::Keep(id) => {
                    if !working.components.contains(id) {
                        return Err(PlmError::invalid_argument(format!(
                            "usage link {} does not belong to the working iteration",
                            id
                        )));
                    }
                }
                ComponentEdit::New(request) => {
                    if request.amount.is_nan() || request.amount <= 0.0 {
                        return Err(PlmError::invalid_argument(format!(
                            "amount for {} must be positive",
                            request.component
                        )));
                    }
                    self.master(&request.component)?;
                    for substitute in &request.substitutes {
                        self.master(&substitute.substitute)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Working iteration of `number` checked out by `user`
    fn working_components(&self, number: &PartKey, user: &str) -> PlmResult<Vec<LinkId>> {
        self.master(number)?
            .last_revision()
            .filter(|r| r.is_checked_out_by(user))
            .and_then(|r| r.last_iteration())
            .map(|i| i.components.clone())
            .ok_or_else(|| {
                PlmError::not_allowed(format!("{} is not checked out by {}", number, user))
            })
    }

    /// Add a usage link to the working iteration
    pub fn add_component(
        &mut self,
        number: &PartKey,
        user: &str,
        request: NewUsage,
    ) -> PlmResult<LinkId> {
        let mut components: Vec<ComponentEdit> = self
            .working_components(number, user)?
            .into_iter()
            .map(ComponentEdit::Keep)
            .collect();
        components.push(ComponentEdit::New(request));
        self.update_iteration(
            number,
            user,
            IterationEdit {
                components: Some(components),
                ..Default::default()
            },
        )?;
        self.last_component(number)
    }

    /// Remove a usage link (with its substitutes) from the working iteration
    pub fn remove_component(&mut self, number: &PartKey, user: &str, link: LinkId) -> PlmResult<()> {
        let current = self.working_components(number, user)?;
        if !current.contains(&link) {
            return Err(PlmError::not_found("usage link", link));
        }
        let components = current
            .into_iter()
            .filter(|id| *id != link)
            .map(ComponentEdit::Keep)
            .collect();
        self.update_iteration(
            number,
            user,
            IterationEdit {
                components: Some(components),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Offer `substitute` in place of usage link `link`
    ///
    /// Links are immutable, so the usage link is replaced by a copy carrying
    /// the extra substitute; the copy takes the same position.
    pub fn add_substitute(
        &mut self,
        number: &PartKey,
        user: &str,
        link: LinkId,
        substitute: NewSubstitute,
    ) -> PlmResult<LinkId> {
        let current = self.working_components(number, user)?;
        let position = current
            .iter()
            .position(|id| *id == link)
            .ok_or_else(|| PlmError::not_found("usage link", link))?;
        let usage = self
            .links
            .usage(link)
            .ok_or_else(|| PlmError::not_found("usage link", link))?;
        if usage.component == substitute.substitute {
            return Err(PlmError::not_allowed(format!(
                "{} cannot substitute itself",
                usage.component
            )));
        }
        let mut request = self.usage_request(usage);
        request.substitutes.push(substitute);

        let components = current
            .iter()
            .enumerate()
            .map(|(i, id)| {
                if i == position {
                    ComponentEdit::New(request.clone())
                } else {
                    ComponentEdit::Keep(*id)
                }
            })
            .collect();
        self.update_iteration(
            number,
            user,
            IterationEdit {
                components: Some(components),
                ..Default::default()
            },
        )?;
        self.working_components(number, user)?
            .get(position)
            .copied()
            .ok_or_else(|| PlmError::not_found("usage link", link))
    }

    fn last_component(&self, number: &PartKey) -> PlmResult<LinkId> {
        self.master(number)?
            .last_revision()
            .and_then(|r| r.last_iteration())
            .and_then(|i| i.components.last())
            .copied()
            .ok_or_else(|| PlmError::not_found("usage link", number))
    }

    /// Creation request reproducing an existing usage link
    fn usage_request(&self, usage: &UsageLink) -> NewUsage {
        NewUsage {
            component: usage.component.clone(),
            amount: usage.amount,
            unit: usage.unit.clone(),
            optional: usage.optional,
            reference_description: usage.reference_description.clone(),
            substitutes: usage
                .substitutes
                .iter()
                .filter_map(|id| self.links.substitute(*id))
                .map(|s| NewSubstitute {
                    substitute: s.substitute.clone(),
                    amount: s.amount,
                    unit: s.unit.clone(),
                    reference_description: s.reference_description.clone(),
                    cad_instances: s.cad_instances.clone(),
                })
                .collect(),
            cad_instances: usage.cad_instances.clone(),
        }
    }

    /// Delete a master that nothing else uses
    pub fn delete_master(&mut self, number: &PartKey) -> PlmResult<PartMaster> {
        self.master(number)?;

        let referencing: BTreeSet<LinkId> = self.links.references_to(number).collect();
        let mut referenced_by: Vec<String> = self
            .masters
            .values()
            .filter(|m| &m.number != number)
            .filter(|m| {
                m.revisions
                    .iter()
                    .flat_map(|r| &r.iterations)
                    .flat_map(|i| &i.components)
                    .any(|id| referencing.contains(id))
            })
            .map(|m| m.number.to_string())
            .collect();
        referenced_by.extend(
            self.products
                .values()
                .filter(|p| &p.design_item == number)
                .map(|p| format!("product {}", p.id)),
        );
        referenced_by.extend(
            self.baselines
                .values()
                .filter(|b| b.configuration.parts.contains_key(number))
                .map(|b| format!("baseline {}", b.id)),
        );
        if !referenced_by.is_empty() {
            return Err(PlmError::EntityConstraint {
                entity: number.to_string(),
                referenced_by: referenced_by.join(", "),
            });
        }

        let master = self
            .masters
            .remove(number)
            .ok_or_else(|| PlmError::not_found("part master", number))?;
        let owned: Vec<LinkId> = master
            .revisions
            .iter()
            .flat_map(|r| &r.iterations)
            .flat_map(|i| i.components.iter().copied())
            .collect();
        self.discard_links(&owned);
        self.prune_stale_path_links();
        info!(part = %number, "part master deleted");
        Ok(master)
    }

    // ------------------------------------------------------------------
    // Products, baselines and instances
    // ------------------------------------------------------------------

    pub fn products(&self) -> impl Iterator<Item = &ConfigurationItem> {
        self.products.values()
    }

    pub fn product(&self, id: &str) -> PlmResult<&ConfigurationItem> {
        self.products
            .get(id)
            .ok_or_else(|| PlmError::not_found("product", id))
    }

    fn product_mut(&mut self, id: &str) -> PlmResult<&mut ConfigurationItem> {
        self.products
            .get_mut(id)
            .ok_or_else(|| PlmError::not_found("product", id))
    }

    pub fn create_product(
        &mut self,
        id: &str,
        design_item: &PartKey,
        description: Option<String>,
    ) -> PlmResult<&ConfigurationItem> {
        let id = id.trim();
        if id.is_empty() || id.contains(char::is_whitespace) || id.contains('/') {
            return Err(PlmError::invalid_argument(format!(
                "product id '{}' must be non-empty without whitespace or '/'",
                id
            )));
        }
        if self.products.contains_key(id) {
            return Err(PlmError::not_allowed(format!("product {} already exists", id)));
        }
        self.master(design_item)?;
        let product = ConfigurationItem::new(id, design_item.clone(), description);
        info!(product = id, design_item = %design_item, "product created");
        Ok(self.products.entry(id.to_string()).or_insert(product))
    }

    pub fn baselines(&self) -> impl Iterator<Item = &ProductBaseline> {
        self.baselines.values()
    }

    pub fn baselines_of<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a ProductBaseline> {
        self.baselines.values().filter(move |b| b.product == product)
    }

    /// Baseline `id`, which must belong to `product`
    pub fn baseline(&self, product: &str, id: u32) -> PlmResult<&ProductBaseline> {
        self.baselines
            .get(&id)
            .filter(|b| b.product == product)
            .ok_or_else(|| PlmError::BaselineNotFound(id.to_string()))
    }

    /// Freeze one iteration per reachable master of `product`
    ///
    /// Kind `latest` takes the newest checked-in iteration, kind `released`
    /// the newest iteration of the latest released revision. Every master
    /// reached through a usage link must have one; substitutes without one
    /// are left out and cannot be chosen.
    pub fn create_baseline(
        &mut self,
        product: &str,
        name: &str,
        kind: BaselineKind,
        description: Option<String>,
        author: &str,
        choices: BaselineChoices,
    ) -> PlmResult<&ProductBaseline> {
        let root = self.product(product)?.design_item.clone();
        let spec = match kind {
            BaselineKind::Latest => ConfigSpec::LatestCheckedIn { diverge: true },
            BaselineKind::Released => ConfigSpec::LatestReleased { diverge: true },
        };

        let parts = self.freeze(&spec, &root, kind)?;
        let mut configuration = FrozenConfiguration {
            parts,
            ..Default::default()
        };

        for (encoded, choice) in choices.substitutes {
            let at: Path = encoded.parse()?;
            let usage = self.usage_at(&at)?;
            if !usage.substitutes.contains(&choice) {
                return Err(PlmError::invalid_argument(format!(
                    "link {} is not a substitute of the usage link at {}",
                    choice, at
                )));
            }
            let substitute = self
                .links
                .substitute(choice)
                .ok_or_else(|| PlmError::not_found("substitute link", choice))?;
            if !configuration.parts.contains_key(&substitute.substitute) {
                return Err(PlmError::not_allowed(format!(
                    "substitute {} has no {} iteration",
                    substitute.substitute, kind
                )));
            }
            configuration.substitute_choices.insert(at.to_string(), choice);
        }
        for encoded in choices.excluded_optional {
            let at: Path = encoded.parse()?;
            if !self.usage_at(&at)?.optional {
                return Err(PlmError::invalid_argument(format!(
                    "the usage link at {} is not optional",
                    at
                )));
            }
            configuration.excluded_optional.insert(at.to_string());
        }

        let id = self.baselines.keys().next_back().map_or(1, |last| last + 1);
        let baseline = ProductBaseline {
            id,
            name: name.to_string(),
            product: product.to_string(),
            kind,
            description,
            created: Utc::now(),
            author: author.to_string(),
            configuration,
            path_links: self.product(product)?.path_links.clone(),
        };
        info!(product, baseline = id, %kind, parts = baseline.configuration.parts.len(), "baseline created");
        Ok(self.baselines.entry(id).or_insert(baseline))
    }

    /// Usage link addressed by the last step of `at`
    fn usage_at(&self, at: &Path) -> PlmResult<&UsageLink> {
        let links = path::resolve(&self.links, at)?;
        match links.last() {
            Some(PartLink::Usage(usage)) => Ok(usage),
            _ => Err(PlmError::invalid_argument(format!(
                "{} does not end in a usage link",
                at
            ))),
        }
    }

    fn freeze(
        &self,
        spec: &ConfigSpec,
        root: &PartKey,
        kind: BaselineKind,
    ) -> PlmResult<BTreeMap<PartKey, IterationRef>> {
        let resolver = StructureResolver::new(self);
        let mut parts: BTreeMap<PartKey, IterationRef> = BTreeMap::new();
        let mut assemblies: Vec<(Path, PartKey)> = Vec::new();
        for node in resolver.walk(spec, Start::Part(root.clone()), None)? {
            let node = node?;
            if node.is_assembly {
                assemblies.push((node.path.clone(), node.part.clone()));
            }
            parts.insert(node.part, node.at);
        }
        if !parts.contains_key(root) {
            return Err(PlmError::not_allowed(format!(
                "{} has no {} iteration",
                root, kind
            )));
        }

        // usage children the walk had to skip have no eligible iteration
        for (at, part) in assemblies {
            let master = self.load_master(&part, ReadView::SYSTEM)?;
            let Some(selected) = spec.select(&master) else {
                continue;
            };
            for link in spec.filter_links(&self.links, &at, &selected.iteration.components, false)? {
                if !parts.contains_key(link.component()) {
                    return Err(PlmError::not_allowed(format!(
                        "{} used at {} has no {} iteration",
                        link.component(),
                        at.child(&link),
                        kind
                    )));
                }
            }
        }
        Ok(parts)
    }

    pub fn instances(&self) -> impl Iterator<Item = &ProductInstance> {
        self.instances.values()
    }

    pub fn instances_of<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a ProductInstance> {
        self.instances.values().filter(move |i| i.product == product)
    }

    pub fn product_instance(&self, product: &str, serial: &str) -> PlmResult<&ProductInstance> {
        self.instances
            .get(&(product.to_string(), serial.to_string()))
            .ok_or_else(|| PlmError::ProductInstanceNotFound {
                product: product.to_string(),
                serial: serial.to_string(),
            })
    }

    fn instance_iteration(
        &self,
        product: &str,
        baseline: u32,
        number: u32,
        author: &str,
    ) -> PlmResult<InstanceIteration> {
        let baseline = self.baseline(product, baseline)?;
        Ok(InstanceIteration {
            number,
            based_on: baseline.id,
            created: Utc::now(),
            author: author.to_string(),
            configuration: baseline.configuration.clone(),
            path_links: baseline.path_links.clone(),
        })
    }

    /// Freeze baseline `baseline` under a new serial number
    pub fn create_product_instance(
        &mut self,
        product: &str,
        serial: &str,
        baseline: u32,
        author: &str,
    ) -> PlmResult<&ProductInstance> {
        self.product(product)?;
        let serial = serial.trim();
        if serial.is_empty() || serial.contains(char::is_whitespace) || serial.contains('/') {
            return Err(PlmError::invalid_argument(format!(
                "serial number '{}' must be non-empty without whitespace or '/'",
                serial
            )));
        }
        let key = (product.to_string(), serial.to_string());
        if self.instances.contains_key(&key) {
            return Err(PlmError::not_allowed(format!(
                "product instance {}/{} already exists",
                product, serial
            )));
        }
        let iteration = self.instance_iteration(product, baseline, 1, author)?;
        info!(product, serial, baseline, "product instance created");
        Ok(self.instances.entry(key).or_insert(ProductInstance {
            product: product.to_string(),
            serial: serial.to_string(),
            iterations: vec![iteration],
        }))
    }

    /// Append a new instance iteration frozen from `baseline`
    pub fn rebase_product_instance(
        &mut self,
        product: &str,
        serial: &str,
        baseline: u32,
        author: &str,
    ) -> PlmResult<&ProductInstance> {
        let next = self
            .product_instance(product, serial)?
            .last_iteration()
            .map_or(1, |i| i.number + 1);
        let iteration = self.instance_iteration(product, baseline, next, author)?;
        let key = (product.to_string(), serial.to_string());
        let instance = self
            .instances
            .get_mut(&key)
            .ok_or_else(|| PlmError::ProductInstanceNotFound {
                product: product.to_string(),
                serial: serial.to_string(),
            })?;
        instance.iterations.push(iteration);
        info!(product, serial, baseline, iteration = next, "product instance rebased");
        Ok(instance)
    }

    /// Build the `ConfigSpec` a selector names, scoped to `product`
    pub fn config_spec(
        &self,
        product: &str,
        selector: &FilterSelector,
        viewer: &str,
        diverge: bool,
    ) -> PlmResult<ConfigSpec> {
        Ok(match selector {
            FilterSelector::Wip => ConfigSpec::Wip {
                viewer: viewer.to_string(),
                diverge,
            },
            FilterSelector::Latest => ConfigSpec::LatestCheckedIn { diverge },
            FilterSelector::Released => ConfigSpec::Released { diverge },
            FilterSelector::LatestReleased => ConfigSpec::LatestReleased { diverge },
            FilterSelector::Baseline(id) => ConfigSpec::Baseline {
                id: *id,
                configuration: self.baseline(product, *id)?.configuration.clone(),
                diverge,
            },
            FilterSelector::ProductInstance(serial) => {
                let instance = self.product_instance(product, serial)?;
                let configuration = instance
                    .last_iteration()
                    .map(|i| i.configuration.clone())
                    .ok_or_else(|| PlmError::ProductInstanceNotFound {
                        product: product.to_string(),
                        serial: serial.clone(),
                    })?;
                ConfigSpec::ProductInstance {
                    serial: serial.clone(),
                    configuration,
                    diverge,
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Path-to-path links
    // ------------------------------------------------------------------

    /// Parse `encoded` and check that every step resolves
    pub fn decode_path(&self, encoded: &str) -> PlmResult<Path> {
        let links = path::decode(&self.links, encoded)?;
        Ok(Path::from_links(&links))
    }

    pub fn create_path_link(
        &mut self,
        product: &str,
        link_type: &str,
        source: &str,
        target: &str,
        description: Option<String>,
    ) -> PlmResult<PathToPathLink> {
        let source: Path = source.parse()?;
        let target: Path = target.parse()?;
        let validator = LinkGraphValidator::new(&self.links);
        let item = self
            .products
            .get_mut(product)
            .ok_or_else(|| PlmError::not_found("product", product))?;
        let link = validator.create_link(&mut item.path_links, link_type, source, target, description)?;
        info!(product, link_type = %link.link_type, id = %link.id, "path-to-path link created");
        Ok(link)
    }

    pub fn delete_path_link(&mut self, product: &str, id: Ulid) -> PlmResult<PathToPathLink> {
        let item = self.product_mut(product)?;
        let index = item
            .path_links
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| PlmError::not_found("path-to-path link", id))?;
        Ok(item.path_links.remove(index))
    }

    pub fn update_path_link_description(
        &mut self,
        product: &str,
        id: Ulid,
        description: Option<String>,
    ) -> PlmResult<&PathToPathLink> {
        let item = self.product_mut(product)?;
        let link = item
            .path_links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PlmError::not_found("path-to-path link", id))?;
        link.description = description;
        Ok(link)
    }

    pub fn path_links_of_type(
        &self,
        product: &str,
        link_type: &str,
    ) -> PlmResult<Vec<&PathToPathLink>> {
        Ok(self
            .product(product)?
            .path_links
            .iter()
            .filter(|l| l.link_type == link_type)
            .collect())
    }

    /// Distinct link types used on `product`, sorted
    pub fn path_link_types(&self, product: &str) -> PlmResult<Vec<String>> {
        let types: BTreeSet<&str> = self
            .product(product)?
            .path_links
            .iter()
            .map(|l| l.link_type.as_str())
            .collect();
        Ok(types.into_iter().map(str::to_string).collect())
    }

    /// Virtual root labelled `link_type` over the source node of every root link
    ///
    /// Sources that are invisible under `spec`, or that `reader` cannot
    /// read, are left out.
    pub fn path_link_roots(
        &self,
        product: &str,
        link_type: &str,
        spec: &ConfigSpec,
        reader: &str,
    ) -> PlmResult<Component> {
        let item = self.product(product)?;
        let resolver = StructureResolver::new(self).reading_as(reader);
        let mut children = Vec::new();
        for link in link_graph::root_links(&item.path_links, link_type) {
            let start = Start::Path {
                root: item.design_item.clone(),
                path: link.source.clone(),
            };
            match resolver.resolve_tree(spec, start, Some(0)) {
                Ok(Some(node)) => children.push(node),
                Ok(None) | Err(PlmError::AccessDenied { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Component::virtual_root(link_type, children))
    }

    /// Remove path-to-path links, on products, baselines and instances, whose
    /// paths no longer resolve
    pub fn prune_stale_path_links(&mut self) -> usize {
        let validator = LinkGraphValidator::new(&self.links);
        let mut removed = 0;
        for item in self.products.values_mut() {
            removed += validator.prune_stale(&mut item.path_links);
        }
        for baseline in self.baselines.values_mut() {
            removed += validator.prune_stale(&mut baseline.path_links);
        }
        for instance in self.instances.values_mut() {
            for iteration in &mut instance.iterations {
                removed += validator.prune_stale(&mut iteration.path_links);
            }
        }
        if removed > 0 {
            debug!(removed, "stale path-to-path links pruned");
        }
        removed
    }
}
