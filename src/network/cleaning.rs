use super::Network;
use tracing::{debug, info};

impl Network {
    /// Aligns every link, then merges fragments across degree-2 nodes and
    /// drops the nodes merged away.
    pub fn clean(&mut self) {
        self.align();

        let mut ids: Vec<String> = self.links.keys().cloned().collect();
        ids.sort_unstable();

        let mut removed = 0usize;
        for id in &ids {
            let Some(link) = self.links.get_mut(id) else {
                continue;
            };
            for node_id in link.clean(&self.nodes) {
                let still_pass_through = self
                    .nodes
                    .get(&node_id)
                    .is_some_and(|node| node.is_pass_through());
                if still_pass_through {
                    debug!("Removing pass-through node {} on {}", node_id, id);
                    self.nodes.remove(&node_id);
                    removed += 1;
                }
            }
        }

        self.infer_forbidden_turns();
        info!(
            "Cleaned network: {} fragments, {} nodes, {} nodes removed",
            self.fragment_count(),
            self.nodes.len(),
            removed
        );
    }

    /// Points every fragment along its link's digitised direction and rebuilds
    /// node connectivity from the result.
    pub fn align(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_links();
        }

        for (id, link) in self.links.iter_mut() {
            link.align();
            for part in link.fragments() {
                if let Some(node) = self.nodes.get_mut(&part.from_node) {
                    node.add_outgoing(id);
                }
                if let Some(node) = self.nodes.get_mut(&part.to_node) {
                    node.add_incoming(id);
                }
            }
        }
    }

    /// Turn restrictions are carried on nodes but none are derived from the
    /// fused attributes yet.
    fn infer_forbidden_turns(&self) {
        debug!("No turn restrictions inferred for {} nodes", self.nodes.len());
    }
}
