//! Pattern-based resource resolution.
//!
//! A [`ResourcePattern`] addresses namespace entries symbolically:
//! `/`-separated segments where `**` descends recursively, `*` matches any
//! child, `{a|b}` selects alternatives, and anything else matches literally.
//! [`search`] resolves a pattern against a root into the concrete entry set.
//!
//! Resolution never errors on absence: a missing root or an unmatched
//! intermediate directory simply contributes nothing to the result, which is
//! what makes retried searches cheap and idempotent.

use std::collections::BTreeMap;

use harrow_core::error::{Error, Result};
use harrow_core::namespace::{Namespace, ResourceStatus};
use harrow_core::paths;

/// One segment of a resource pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches exactly this token.
    Literal(String),
    /// Matches any single child name.
    Wildcard,
    /// Matches any one of the alternatives.
    Selection(Vec<String>),
    /// Recursive-descent marker: the current entries and all their
    /// descendants.
    Traverse,
}

/// A parsed, segmented resource pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    segments: Vec<Segment>,
}

impl ResourcePattern {
    /// Parses a pattern from text.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty pattern, an empty segment,
    /// an empty selection, or a `*`/`{` embedded in a literal token — the
    /// segment grammar is closed and anything outside it is a programmer
    /// error caught before any I/O.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_matches('/');
        if text.is_empty() {
            return Err(Error::InvalidInput("empty resource pattern".into()));
        }
        let mut segments = Vec::new();
        for token in text.split('/') {
            segments.push(Self::parse_segment(token)?);
        }
        Ok(Self { segments })
    }

    fn parse_segment(token: &str) -> Result<Segment> {
        match token {
            "" => Err(Error::InvalidInput("empty pattern segment".into())),
            "**" => Ok(Segment::Traverse),
            "*" => Ok(Segment::Wildcard),
            _ if token.starts_with('{') && token.ends_with('}') => {
                let body = &token[1..token.len() - 1];
                let alternatives: Vec<String> = body
                    .split('|')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if alternatives.is_empty() {
                    return Err(Error::InvalidInput(format!("empty selection: {token}")));
                }
                Ok(Segment::Selection(alternatives))
            }
            _ if token.contains('*') || token.contains('{') || token.contains('}') => Err(
                Error::InvalidInput(format!("unsupported pattern token: {token}")),
            ),
            _ => Ok(Segment::Literal(token.to_string())),
        }
    }

    /// The parsed segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Resolves `pattern` against `root`, returning the matching entries sorted
/// by path.
///
/// A missing root terminates with an empty result, not an error.
///
/// # Errors
///
/// Propagates namespace faults; absence along the way is never one.
pub async fn search(
    ns: &dyn Namespace,
    root: &str,
    pattern: &ResourcePattern,
) -> Result<Vec<ResourceStatus>> {
    let mut frontier: BTreeMap<String, ResourceStatus> = BTreeMap::new();
    match ns.status(root).await? {
        Some(status) => {
            frontier.insert(status.path.clone(), status);
        }
        None => return Ok(Vec::new()),
    }

    let segments = pattern.segments();
    let mut index = 0;
    while index < segments.len() {
        if segments[index] == Segment::Traverse {
            frontier = traverse_closure(ns, frontier).await?;
            index += 1;
            continue;
        }
        let run_end = segments[index..]
            .iter()
            .position(|s| *s == Segment::Traverse)
            .map_or(segments.len(), |p| index + p);
        let templates = cross_join(&segments[index..run_end]);
        frontier = expand_run(ns, &frontier, &templates).await?;
        index = run_end;
    }

    tracing::debug!(
        root,
        matches = frontier.len(),
        "resolved resource pattern"
    );
    Ok(frontier.into_values().collect())
}

/// Replaces the frontier with itself plus every reachable descendant.
async fn traverse_closure(
    ns: &dyn Namespace,
    frontier: BTreeMap<String, ResourceStatus>,
) -> Result<BTreeMap<String, ResourceStatus>> {
    let mut closure = frontier;
    let mut queue: Vec<String> = closure
        .values()
        .filter(|e| e.is_dir)
        .map(|e| e.path.clone())
        .collect();
    while let Some(dir) = queue.pop() {
        for child in ns.list_dir(&dir).await? {
            if closure.contains_key(&child.path) {
                continue;
            }
            if child.is_dir {
                queue.push(child.path.clone());
            }
            closure.insert(child.path.clone(), child);
        }
    }
    Ok(closure)
}

/// Cross-joins a run of non-traverse segments into path-suffix templates.
///
/// Each template is a list of tokens; `*` stands for "any child" at that
/// level. Runs of literals and selections therefore fuse into concrete
/// multi-level suffixes resolved with a single status call each.
fn cross_join(run: &[Segment]) -> Vec<Vec<String>> {
    let mut templates: Vec<Vec<String>> = vec![Vec::new()];
    for segment in run {
        let alternatives: Vec<String> = match segment {
            Segment::Literal(token) => vec![token.clone()],
            Segment::Wildcard => vec!["*".to_string()],
            Segment::Selection(alts) => alts.clone(),
            Segment::Traverse => unreachable!("traverse segments never join a run"),
        };
        let mut next = Vec::with_capacity(templates.len() * alternatives.len());
        for template in &templates {
            for alternative in &alternatives {
                let mut extended = template.clone();
                extended.push(alternative.clone());
                next.push(extended);
            }
        }
        templates = next;
    }
    templates
}

/// Expands every (frontier entry, template) pair, deduplicating by path.
async fn expand_run(
    ns: &dyn Namespace,
    frontier: &BTreeMap<String, ResourceStatus>,
    templates: &[Vec<String>],
) -> Result<BTreeMap<String, ResourceStatus>> {
    let mut next: BTreeMap<String, ResourceStatus> = BTreeMap::new();
    for entry in frontier.values() {
        // Files have no children; only directories expand on a non-empty run.
        if !entry.is_dir {
            continue;
        }
        for template in templates {
            if template.iter().all(|t| t != "*") {
                // Fused literal suffix: one lookup, no intermediate listing.
                let target = template
                    .iter()
                    .fold(entry.path.clone(), |acc, t| paths::join(&acc, t));
                if let Some(status) = ns.status(&target).await? {
                    next.insert(status.path.clone(), status);
                }
            } else {
                for status in expand_glob(ns, entry, template).await? {
                    next.insert(status.path.clone(), status);
                }
            }
        }
    }
    Ok(next)
}

/// Walks one template level by level under one directory entry.
async fn expand_glob(
    ns: &dyn Namespace,
    entry: &ResourceStatus,
    template: &[String],
) -> Result<Vec<ResourceStatus>> {
    let mut current = vec![entry.clone()];
    for (level, token) in template.iter().enumerate() {
        let last = level + 1 == template.len();
        let mut matched = Vec::new();
        for parent in current {
            if !parent.is_dir {
                continue;
            }
            if token == "*" {
                matched.extend(ns.list_dir(&parent.path).await?);
            } else if let Some(status) = ns.status(&paths::join(&parent.path, token)).await? {
                matched.push(status);
            }
        }
        if matched.is_empty() && !last {
            return Ok(Vec::new());
        }
        current = matched;
    }
    Ok(current)
}

/// Removes every entry that is a strict descendant of a directory entry in
/// the same set.
///
/// The survivors are the minimal set of roots covering everything listed.
#[must_use]
pub fn only_minimal_covered(entries: &[ResourceStatus]) -> Vec<ResourceStatus> {
    let dirs: Vec<&str> = entries
        .iter()
        .filter(|e| e.is_dir)
        .map(|e| e.path.as_str())
        .collect();
    entries
        .iter()
        .filter(|entry| {
            !dirs
                .iter()
                .any(|dir| paths::is_strict_ancestor(dir, &entry.path))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use harrow_core::namespace::MemoryNamespace;

    async fn seed(ns: &MemoryNamespace, files: &[&str]) {
        for file in files {
            ns.write(file, Bytes::from_static(b"x")).await.unwrap();
        }
    }

    fn names(entries: &[ResourceStatus]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn parse_recognizes_all_segment_kinds() {
        let pattern = ResourcePattern::parse("logs/**/{2024|2025}/*/data").expect("parse");
        assert_eq!(
            pattern.segments(),
            [
                Segment::Literal("logs".into()),
                Segment::Traverse,
                Segment::Selection(vec!["2024".into(), "2025".into()]),
                Segment::Wildcard,
                Segment::Literal("data".into()),
            ]
        );
    }

    #[test]
    fn parse_rejects_malformed_patterns() {
        assert!(ResourcePattern::parse("").is_err());
        assert!(ResourcePattern::parse("a//b").is_err());
        assert!(ResourcePattern::parse("a/{}/b").is_err());
        assert!(ResourcePattern::parse("a/pre*fix").is_err());
        assert!(ResourcePattern::parse("a/{b|c").is_err());
    }

    #[tokio::test]
    async fn wildcard_resolves_across_branches() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/a/x/c", "root/a/y/c", "root/a/x/d"]).await;

        let pattern = ResourcePattern::parse("a/*/c").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert_eq!(names(&result), ["root/a/x/c", "root/a/y/c"]);
    }

    #[tokio::test]
    async fn literal_run_fuses_without_listing() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/a/b/c", "root/a/b/d"]).await;

        let pattern = ResourcePattern::parse("a/b/c").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert_eq!(names(&result), ["root/a/b/c"]);
    }

    #[tokio::test]
    async fn selection_cross_joins_alternatives() {
        let ns = MemoryNamespace::new();
        seed(
            &ns,
            &["root/2024/jan/r", "root/2025/jan/r", "root/2023/jan/r"],
        )
        .await;

        let pattern = ResourcePattern::parse("{2024|2025}/jan/r").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert_eq!(names(&result), ["root/2024/jan/r", "root/2025/jan/r"]);
    }

    #[tokio::test]
    async fn traverse_collects_all_descendants() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/a/f1", "root/a/b/f2", "root/f3"]).await;

        let pattern = ResourcePattern::parse("**").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert_eq!(
            names(&result),
            ["root", "root/a", "root/a/b", "root/a/b/f2", "root/a/f1", "root/f3"]
        );
    }

    #[tokio::test]
    async fn traverse_then_literal_matches_at_any_depth() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/x/part", "root/x/y/part", "root/z/other"]).await;

        let pattern = ResourcePattern::parse("**/part").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert_eq!(names(&result), ["root/x/part", "root/x/y/part"]);
    }

    #[tokio::test]
    async fn missing_root_is_empty_not_error() {
        let ns = MemoryNamespace::new();
        let pattern = ResourcePattern::parse("a/*").expect("parse");
        let result = search(&ns, "absent", &pattern).await.expect("search");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn missing_intermediate_directory_is_empty() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/a/f"]).await;

        let pattern = ResourcePattern::parse("nope/*/f").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn file_frontier_entries_never_expand() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["root/f"]).await;

        let pattern = ResourcePattern::parse("f/*").expect("parse");
        let result = search(&ns, "root", &pattern).await.expect("search");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn minimal_cover_drops_strict_descendants() {
        let ns = MemoryNamespace::new();
        seed(&ns, &["p/q"]).await;

        let dir = ns.status("p").await.unwrap().unwrap();
        let file = ns.status("p/q").await.unwrap().unwrap();
        let minimal = only_minimal_covered(&[dir.clone(), file]);
        assert_eq!(names(&minimal), ["p"]);

        // An entry is never removed for being covered by itself, and files
        // cover nothing.
        let standalone = ns.status("p/q").await.unwrap().unwrap();
        let kept = only_minimal_covered(&[standalone.clone()]);
        assert_eq!(names(&kept), ["p/q"]);
    }
}
