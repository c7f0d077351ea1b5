// ── Tree crawler ──
//
// Depth-first discovery of the provider tree. Containers are expanded one
// at a time; accepted parameters are registered under their accumulated
// label. The walk uses an explicit work stack, so tree depth never grows
// the call stack.

use serde::Serialize;
use tracing::{debug, info, trace};

use emberlink_api::{Provider, TreeNode};

use crate::error::CoreError;
use crate::filter::FilterRules;
use crate::store::{ParameterRegistry, Registration};

/// Marker some providers put in front of identifiers.
const RESERVED_MARKER: char = '#';

/// Counters describing one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Directory requests issued, root included.
    pub expanded: usize,
    /// Elements taken off the work stack.
    pub visited: usize,
    /// Parameters newly registered.
    pub registered: usize,
    /// Children dropped because no auto-parse rule admitted them.
    pub pruned: usize,
    /// Containers and parameters skipped because the registry was full.
    pub skipped_at_capacity: usize,
}

struct Frame {
    node: TreeNode,
    label: String,
    depth: usize,
}

/// Identifier as shown in labels: one leading reserved marker removed.
pub fn display_identifier(identifier: &str) -> &str {
    identifier
        .strip_prefix(RESERVED_MARKER)
        .unwrap_or(identifier)
}

/// One crawl over a provider tree into a registry.
pub struct TreeCrawler<'a, P: Provider> {
    provider: &'a P,
    rules: &'a FilterRules,
    registry: &'a ParameterRegistry,
}

impl<'a, P: Provider> TreeCrawler<'a, P> {
    pub fn new(provider: &'a P, rules: &'a FilterRules, registry: &'a ParameterRegistry) -> Self {
        Self {
            provider,
            rules,
            registry,
        }
    }

    /// Expand the root and crawl every top-level element with an empty
    /// label at depth 1.
    ///
    /// Any failed directory request aborts the whole crawl.
    pub async fn crawl(&self) -> Result<CrawlReport, CoreError> {
        let mut report = CrawlReport::default();
        let root = self.provider.root();
        let top_level = self.expand(&root, &mut report).await?;
        let frames = top_level
            .into_iter()
            .map(|node| Frame {
                node,
                label: String::new(),
                depth: 1,
            })
            .collect();

        self.walk(frames, report).await
    }

    /// Crawl below `start` as if it had been reached with `label` at `depth`.
    pub async fn crawl_from(
        &self,
        start: TreeNode,
        label: impl Into<String>,
        depth: usize,
    ) -> Result<CrawlReport, CoreError> {
        let frame = Frame {
            node: start,
            label: label.into(),
            depth,
        };
        self.walk(vec![frame], CrawlReport::default()).await
    }

    async fn walk(
        &self,
        initial: Vec<Frame>,
        mut report: CrawlReport,
    ) -> Result<CrawlReport, CoreError> {
        info!(
            rules = self.rules.auto_parse.len(),
            node_filters = self.rules.node_filters.len(),
            parameter_filters = self.rules.parameter_filters.len(),
            "crawling provider tree"
        );

        // Reversed so that popping yields document order.
        let mut stack: Vec<Frame> = initial.into_iter().rev().collect();

        while let Some(frame) = stack.pop() {
            report.visited += 1;

            if frame.node.is_container() {
                if self.registry.is_full() {
                    report.skipped_at_capacity += 1;
                    continue;
                }
                let children = self.expand(&frame.node, &mut report).await?;
                let next = self.admit_children(&frame, children, &mut report);
                stack.extend(next.into_iter().rev());
            } else {
                self.visit_parameter(frame, &mut report);
            }
        }

        info!(
            expanded = report.expanded,
            visited = report.visited,
            registered = report.registered,
            pruned = report.pruned,
            skipped_at_capacity = report.skipped_at_capacity,
            "crawl finished"
        );
        Ok(report)
    }

    async fn expand(
        &self,
        node: &TreeNode,
        report: &mut CrawlReport,
    ) -> Result<Vec<TreeNode>, CoreError> {
        trace!(path = %node.path, "expanding container");
        let children = self
            .provider
            .expand(node)
            .await
            .map_err(|e| CoreError::DiscoveryFailed {
                path: if node.path.is_root() {
                    "<root>".into()
                } else {
                    node.path.to_string()
                },
                reason: e.to_string(),
            })?;
        report.expanded += 1;
        Ok(children)
    }

    /// Label every child and keep those the auto-parse rules admit.
    fn admit_children(
        &self,
        parent: &Frame,
        children: Vec<TreeNode>,
        report: &mut CrawlReport,
    ) -> Vec<Frame> {
        let parent_identifier = display_identifier(parent.node.identifier());
        let mut admitted = Vec::with_capacity(children.len());

        for child in children {
            let identifier = display_identifier(child.identifier());
            let label = if parent.label.is_empty() {
                format!("{parent_identifier}.{identifier}")
            } else {
                format!("{}.{identifier}", parent.label)
            };

            if !self.rules.auto_parse.is_empty() {
                match self.rules.matching_rule(&child.path, parent.depth) {
                    Some(rule) => {
                        trace!(path = %child.path, rule = %rule.path, "auto-parse rule matched");
                    }
                    None => {
                        trace!(path = %child.path, "pruned by auto-parse rules");
                        report.pruned += 1;
                        continue;
                    }
                }
            }

            admitted.push(Frame {
                node: child,
                label,
                depth: parent.depth + 1,
            });
        }
        admitted
    }

    fn visit_parameter(&self, frame: Frame, report: &mut CrawlReport) {
        let Some(parameter) = frame.node.as_parameter() else {
            return;
        };

        // Top-level parameters have no accumulated label of their own.
        let label = if frame.label.is_empty() {
            display_identifier(&parameter.identifier).to_owned()
        } else {
            frame.label
        };

        if !self.rules.accepts_parameter(&label, &parameter.identifier) {
            trace!(path = %frame.node.path, label = %label, "parameter filtered out");
            return;
        }

        match self.registry.register(frame.node.path.clone(), label) {
            Registration::Added => report.registered += 1,
            Registration::AtCapacity => report.skipped_at_capacity += 1,
            Registration::AlreadyRegistered => {
                debug!(path = %frame.node.path, "parameter reached twice");
            }
        }
    }
}
