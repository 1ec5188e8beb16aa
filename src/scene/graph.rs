//! Scene graph with generational node ids
//!
//! Nodes live in slots; each slot has a generation counter that is bumped
//! when the node is removed. A `NodeId` held across a removal therefore
//! stops resolving instead of aliasing whatever reuses the slot. Long
//! running sequences rely on this to check that the model they started
//! with is still in the scene.

use super::node::{Model, Node, Sprite};

/// Handle to a node in the `SceneGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Index into the slot storage
    index: u32,
    /// Generation counter - increments when slot is reused
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Owner of every node in the view
#[derive(Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    /// Free slots available for reuse (LIFO)
    free_indices: Vec<u32>,
    /// Insertion order, used as draw order
    order: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = if let Some(index) = self.free_indices.pop() {
            // Generation was already incremented on remove
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        };
        self.order.push(id);
        id
    }

    pub fn insert_model(&mut self, model: Model) -> NodeId {
        self.insert(Node::Model(model))
    }

    pub fn insert_sprite(&mut self, sprite: Sprite) -> NodeId {
        self.insert(Node::Sprite(sprite))
    }

    /// Remove a node, returning it if the id was live
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if !self.contains(id) {
            return None;
        }
        let slot = &mut self.slots[id.index as usize];
        let node = slot.node.take();
        // Increment generation to invalidate existing references
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(id.index);
        self.order.retain(|n| *n != id);
        node
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|s| s.generation == id.generation && s.node.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn model(&self, id: NodeId) -> Option<&Model> {
        match self.get(id)? {
            Node::Model(m) => Some(m),
            Node::Sprite(_) => None,
        }
    }

    pub fn model_mut(&mut self, id: NodeId) -> Option<&mut Model> {
        match self.get_mut(id)? {
            Node::Model(m) => Some(m),
            Node::Sprite(_) => None,
        }
    }

    pub fn sprite(&self, id: NodeId) -> Option<&Sprite> {
        match self.get(id)? {
            Node::Sprite(s) => Some(s),
            Node::Model(_) => None,
        }
    }

    pub fn sprite_mut(&mut self, id: NodeId) -> Option<&mut Sprite> {
        match self.get_mut(id)? {
            Node::Sprite(s) => Some(s),
            Node::Model(_) => None,
        }
    }

    /// Live nodes in draw order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order.iter().filter_map(move |id| self.get(*id).map(|n| (*id, n)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove every node, returning them in draw order
    pub fn drain(&mut self) -> Vec<Node> {
        let ids: Vec<NodeId> = self.order.clone();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}
