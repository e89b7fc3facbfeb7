//! Path-to-path link validation
//!
//! Cross-links join two resolved paths outside the hierarchy. Within one
//! link type they must form a DAG: a link's "next" links are the links of
//! the same type whose source is its target.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::LinkCode;
use crate::entities::link::{LinkArena, PartLink};
use crate::entities::product::PathToPathLink;
use crate::structure::path::{self, Path};

/// Validates and maintains a set of path-to-path links against a link arena
pub struct LinkGraphValidator<'a> {
    arena: &'a LinkArena,
}

impl<'a> LinkGraphValidator<'a> {
    pub fn new(arena: &'a LinkArena) -> Self {
        Self { arena }
    }

    /// Append a new link to `links`, or leave `links` untouched and fail
    ///
    /// Rejects an empty type, identical endpoints, endpoints that are
    /// substitutes of one another, and an existing identical triple. After
    /// appending, a cycle within the link type fails `PathToPathCyclic` and
    /// the tentative link is removed again.
    pub fn create_link(
        &self,
        links: &mut Vec<PathToPathLink>,
        link_type: &str,
        source: Path,
        target: Path,
        description: Option<String>,
    ) -> PlmResult<PathToPathLink> {
        let link_type = link_type.trim();
        if link_type.is_empty() {
            return Err(PlmError::invalid_argument("link type must not be empty"));
        }
        if source == target {
            return Err(PlmError::not_allowed(format!(
                "source and target are the same path ({})",
                source
            )));
        }

        let source_links = path::resolve(self.arena, &source)?;
        let target_links = path::resolve(self.arena, &target)?;
        if self.are_substitutes(&source_links, &target_links) {
            return Err(PlmError::not_allowed(format!(
                "{} and {} are substitutes of each other",
                source, target
            )));
        }

        let candidate = PathToPathLink::new(link_type, source, target, description);
        if links.iter().any(|l| l.same_triple(&candidate)) {
            return Err(PlmError::not_allowed(format!(
                "a '{}' link from {} to {} already exists",
                candidate.link_type, candidate.source, candidate.target
            )));
        }

        links.push(candidate);
        let index = links.len() - 1;
        if let Err(err) = check_cycles(links, index) {
            links.pop();
            return Err(err);
        }
        debug!(link_type, source = %links[index].source, target = %links[index].target, "path-to-path link created");
        Ok(links[index].clone())
    }

    /// Two paths that differ only in their last level, where one ends in a
    /// usage link and the other in one of its substitutes
    fn are_substitutes(&self, a: &[PartLink<'_>], b: &[PartLink<'_>]) -> bool {
        let (Some((last_a, above_a)), Some((last_b, above_b))) = (a.split_last(), b.split_last())
        else {
            return false;
        };
        if above_a.len() != above_b.len()
            || above_a.iter().zip(above_b).any(|(x, y)| x.id() != y.id())
        {
            return false;
        }
        match (last_a.code(), last_b.code()) {
            (LinkCode::Usage, LinkCode::Substitute) => {
                self.arena.is_substitute_of(last_b.id(), last_a.id())
            }
            (LinkCode::Substitute, LinkCode::Usage) => {
                self.arena.is_substitute_of(last_a.id(), last_b.id())
            }
            _ => false,
        }
    }

    /// Whether both endpoints of `link` still decode
    pub fn is_live(&self, link: &PathToPathLink) -> bool {
        path::resolve(self.arena, &link.source).is_ok()
            && path::resolve(self.arena, &link.target).is_ok()
    }

    /// Drop links whose paths no longer decode; returns how many were removed
    pub fn prune_stale(&self, links: &mut Vec<PathToPathLink>) -> usize {
        let before = links.len();
        links.retain(|link| {
            let live = self.is_live(link);
            if !live {
                warn!(
                    link_type = %link.link_type,
                    source = %link.source,
                    target = %link.target,
                    "removing stale path-to-path link"
                );
            }
            live
        });
        before - links.len()
    }
}

/// Links of the same type that continue from `link`'s target
pub fn next_links<'l>(
    links: &'l [PathToPathLink],
    link: &'l PathToPathLink,
) -> impl Iterator<Item = &'l PathToPathLink> + 'l {
    links
        .iter()
        .filter(move |l| l.link_type == link.link_type && l.source == link.target)
}

/// Links of `link_type` whose source is not the target of another link of
/// that type
pub fn root_links<'l>(links: &'l [PathToPathLink], link_type: &str) -> Vec<&'l PathToPathLink> {
    let of_type: Vec<&PathToPathLink> = links.iter().filter(|l| l.link_type == link_type).collect();
    of_type
        .iter()
        .filter(|l| !of_type.iter().any(|other| other.target == l.source))
        .copied()
        .collect()
}

/// DFS from `links[start]` over the next-link relation; an edge already on
/// the active path means a cycle
///
/// Edges whose continuations are fully explored go to `done` and are not
/// walked again, so shared downstream links (diamonds) stay legal and each
/// edge is expanded at most once.
fn check_cycles(links: &[PathToPathLink], start: usize) -> PlmResult<()> {
    let next_of = |index: usize| -> Vec<usize> {
        let from = &links[index];
        links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.link_type == from.link_type && l.source == from.target)
            .map(|(i, _)| i)
            .collect()
    };

    let mut on_path: HashSet<usize> = HashSet::from([start]);
    let mut done: HashSet<usize> = HashSet::new();
    let mut stack: Vec<(usize, Vec<usize>)> = vec![(start, next_of(start))];
    loop {
        let Some(top) = stack.last_mut() else {
            break;
        };
        match top.1.pop() {
            Some(next) => {
                if on_path.contains(&next) {
                    return Err(PlmError::PathToPathCyclic {
                        link_type: links[start].link_type.clone(),
                    });
                }
                if done.contains(&next) {
                    continue;
                }
                on_path.insert(next);
                stack.push((next, next_of(next)));
            }
            None => {
                if let Some((edge, _)) = stack.pop() {
                    on_path.remove(&edge);
                    done.insert(edge);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PartKey;
    use crate::entities::link::{NewSubstitute, NewUsage};

    fn key(s: &str) -> PartKey {
        PartKey::new(s).unwrap()
    }

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    /// Arena with four sibling usage links u2..u5 and one substitute s6 of u5
    fn arena() -> LinkArena {
        let mut arena = LinkArena::new();
        arena.insert(NewUsage::of(key("A")));
        arena.insert(NewUsage::of(key("B")));
        arena.insert(NewUsage::of(key("C")));
        arena.insert(NewUsage::of(key("D")).substitute(NewSubstitute::of(key("E"))));
        arena
    }

    #[test]
    fn test_cycle_is_rejected_and_not_kept() {
        let arena = arena();
        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();
        validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), None)
            .unwrap();
        validator
            .create_link(&mut links, "T", p("-1-u3"), p("-1-u4"), None)
            .unwrap();
        let err = validator
            .create_link(&mut links, "T", p("-1-u4"), p("-1-u2"), None)
            .unwrap_err();
        assert!(matches!(err, PlmError::PathToPathCyclic { .. }));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_other_type_does_not_close_cycle() {
        let arena = arena();
        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();
        validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), None)
            .unwrap();
        validator
            .create_link(&mut links, "V", p("-1-u3"), p("-1-u2"), None)
            .unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_diamond_is_accepted() {
        let arena = arena();
        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();
        for (s, t) in [("-1-u2", "-1-u3"), ("-1-u2", "-1-u4"), ("-1-u3", "-1-u5"), ("-1-u4", "-1-u5")] {
            validator
                .create_link(&mut links, "T", p(s), p(t), None)
                .unwrap();
        }
        assert_eq!(links.len(), 4);
    }

    #[test]
    fn test_long_diamond_chain_stays_linear() {
        // node i of the chain is n(i); each hop n(i) -> n(i+1) is a diamond
        // through a(i) and b(i)
        const DIAMONDS: u64 = 64;
        let mut arena = LinkArena::new();
        for i in 0..(3 * DIAMONDS + 1) {
            arena.insert(NewUsage::of(key(&format!("P{}", i))));
        }
        let n = |i: u64| p(&format!("-1-u{}", 2 + 3 * i));
        let a = |i: u64| p(&format!("-1-u{}", 3 + 3 * i));
        let b = |i: u64| p(&format!("-1-u{}", 4 + 3 * i));

        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();
        // back to front, so every insertion sees the whole chain downstream
        for i in (0..DIAMONDS).rev() {
            for (s, t) in [(a(i), n(i + 1)), (b(i), n(i + 1)), (n(i), a(i)), (n(i), b(i))] {
                validator.create_link(&mut links, "T", s, t, None).unwrap();
            }
        }
        assert_eq!(links.len(), 4 * DIAMONDS as usize);

        let err = validator
            .create_link(&mut links, "T", n(DIAMONDS), n(0), None)
            .unwrap_err();
        assert!(matches!(err, PlmError::PathToPathCyclic { .. }));
        assert_eq!(links.len(), 4 * DIAMONDS as usize);
    }

    #[test]
    fn test_rejections() {
        let arena = arena();
        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();

        let err = validator
            .create_link(&mut links, " ", p("-1-u2"), p("-1-u3"), None)
            .unwrap_err();
        assert!(matches!(err, PlmError::InvalidArgument(_)));

        let err = validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u2"), None)
            .unwrap_err();
        assert!(matches!(err, PlmError::NotAllowed(_)));

        let err = validator
            .create_link(&mut links, "T", p("-1-u5"), p("-1-s6"), None)
            .unwrap_err();
        assert!(matches!(err, PlmError::NotAllowed(_)));

        let err = validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u99"), None)
            .unwrap_err();
        assert!(err.is_not_found());

        validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), None)
            .unwrap();
        let err = validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), Some("dup".into()))
            .unwrap_err();
        assert!(matches!(err, PlmError::NotAllowed(_)));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_root_links() {
        let arena = arena();
        let validator = LinkGraphValidator::new(&arena);
        let mut links = Vec::new();
        validator
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), None)
            .unwrap();
        validator
            .create_link(&mut links, "T", p("-1-u3"), p("-1-u4"), None)
            .unwrap();
        validator
            .create_link(&mut links, "T", p("-1-u5"), p("-1-u4"), None)
            .unwrap();

        let roots: Vec<String> = root_links(&links, "T")
            .iter()
            .map(|l| l.source.to_string())
            .collect();
        assert_eq!(roots, vec!["-1-u2", "-1-u5"]);

        let next: Vec<String> = next_links(&links, &links[0])
            .map(|l| l.target.to_string())
            .collect();
        assert_eq!(next, vec!["-1-u4"]);
    }

    #[test]
    fn test_prune_stale() {
        let mut arena = arena();
        let mut links = Vec::new();
        LinkGraphValidator::new(&arena)
            .create_link(&mut links, "T", p("-1-u2"), p("-1-u3"), None)
            .unwrap();
        arena.remove_usage(crate::core::identity::LinkId(3));
        let removed = LinkGraphValidator::new(&arena).prune_stale(&mut links);
        assert_eq!(removed, 1);
        assert!(links.is_empty());
    }
}
