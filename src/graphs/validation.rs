//! Structural validation run eagerly before compilation.
//!
//! Validation operates on the flattened graph (subgraphs already inlined)
//! and checks the declared topology only; routing behavior is the engine's
//! concern. The first violation found is returned; checks run in a fixed
//! order so error reports are deterministic.

use super::GraphError;
use super::builder::StateGraph;
use crate::types::NodeKind;

impl StateGraph {
    /// Validate the flattened graph against the compile-time rules:
    ///
    /// 1. an edge must leave `Start` (the entry point)
    /// 2. every target refers to a registered node or `End`
    /// 3. every source other than `Start` refers to a registered node
    /// 4. a parallel fanout lists no duplicate targets
    /// 5. interrupt lists name registered nodes only
    pub(super) fn validate(&self, interrupts: &[NodeKind]) -> Result<(), GraphError> {
        if !self.plain.contains_key(&NodeKind::Start)
            && !self.conditional.contains_key(&NodeKind::Start)
        {
            return Err(GraphError::MissingEntryPoint);
        }

        // Deterministic source order: Start first, then registration order.
        let mut sources: Vec<NodeKind> = vec![NodeKind::Start];
        sources.extend(self.node_order.iter().cloned());

        for source in &sources {
            if let Some(targets) = self.plain.get(source) {
                for target in targets {
                    self.check_target(source, target)?;
                }
                if targets.len() > 1 {
                    for (index, target) in targets.iter().enumerate() {
                        if targets[..index].contains(target) {
                            return Err(GraphError::DuplicateParallelTarget {
                                node: source.clone(),
                                target: target.clone(),
                            });
                        }
                    }
                }
            }
            if let Some(edge) = self.conditional.get(source) {
                for (_, target) in &edge.mapping {
                    self.check_target(source, target)?;
                }
            }
        }

        for source in self.plain.keys().chain(self.conditional.keys()) {
            if !source.is_start() && !self.nodes.contains_key(source) {
                return Err(GraphError::UnknownSource {
                    node: source.clone(),
                });
            }
        }

        for node in interrupts {
            if !self.nodes.contains_key(node) {
                return Err(GraphError::UnknownInterruptNode { node: node.clone() });
            }
        }

        Ok(())
    }

    fn check_target(&self, source: &NodeKind, target: &NodeKind) -> Result<(), GraphError> {
        if target.is_end() || self.nodes.contains_key(target) {
            Ok(())
        } else {
            Err(GraphError::DanglingTarget {
                node: source.clone(),
                target: target.clone(),
            })
        }
    }
}
