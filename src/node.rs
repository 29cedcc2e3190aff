use ahash::AHashSet;
use geo::Coord;
use std::hash::{Hash, Hasher};

/// A graph vertex. Identity is the id plus the synthetic flag; the degree
/// sets and turn table do not take part in equality.
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    point: Coord,
    /// Created by an overlay split rather than loaded with the network.
    synthetic: bool,
    incoming: AHashSet<String>,
    outgoing: AHashSet<String>,
    forbidden_turns: AHashSet<(String, String)>,
}

impl Node {
    pub fn new(id: impl Into<String>, point: Coord, synthetic: bool) -> Self {
        Self {
            id: id.into(),
            point,
            synthetic,
            incoming: AHashSet::new(),
            outgoing: AHashSet::new(),
            forbidden_turns: AHashSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn point(&self) -> Coord {
        self.point
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn add_incoming(&mut self, link_id: &str) {
        self.incoming.insert(link_id.to_string());
    }

    pub fn add_outgoing(&mut self, link_id: &str) {
        self.outgoing.insert(link_id.to_string());
    }

    pub fn remove_incoming(&mut self, link_id: &str) {
        self.incoming.remove(link_id);
    }

    pub fn remove_outgoing(&mut self, link_id: &str) {
        self.outgoing.remove(link_id);
    }

    pub fn clear_links(&mut self) {
        self.incoming.clear();
        self.outgoing.clear();
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming.len()
    }

    pub fn outgoing_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Exactly one link in and one link out.
    pub fn is_pass_through(&self) -> bool {
        self.incoming.len() == 1 && self.outgoing.len() == 1
    }

    /// U-turns onto the same link are not recorded.
    pub fn forbid_turn(&mut self, from: &str, to: &str) {
        if from != to {
            self.forbidden_turns.insert((from.to_string(), to.to_string()));
        }
    }

    pub fn is_turn_forbidden(&self, from: &str, to: &str) -> bool {
        self.forbidden_turns
            .contains(&(from.to_string(), to.to_string()))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.synthetic == other.synthetic
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.synthetic.hash(state);
    }
}
