//! Conservative pruning of body pairs and ground candidates.
//!
//! Each body is enclosed in a bounding sphere (its radius for spheres, the
//! length of the half-extent vector for boxes). A pair survives when the
//! spheres, inflated by a small slack, overlap. The test never rejects a pair
//! the narrow phase would accept.

use crate::body::RigidBody;
use crate::config::WorldConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadPhase {
    /// Distance added to the sum of bounding radii.
    pub slack: f32,
    /// Height of the ground plane.
    pub floor_y: f32,
}

impl BroadPhase {
    pub fn new(slack: f32, floor_y: f32) -> Self {
        Self { slack, floor_y }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.broadphase_slack, config.floor_y)
    }

    /// Whether a pair may be in contact. Pairs of two immovable bodies are
    /// always rejected.
    pub fn test_pair(&self, a: &RigidBody, b: &RigidBody) -> bool {
        if a.is_fixed() && b.is_fixed() {
            return false;
        }
        let reach = a.bounding_radius() + b.bounding_radius() + self.slack;
        (a.position - b.position).norm_squared() <= reach * reach
    }

    /// Whether a body may touch the ground plane this tick.
    ///
    /// The bounding sphere is checked first; boxes that pass are confirmed
    /// against their lowest sampled vertex.
    pub fn is_ground_candidate(&self, body: &RigidBody) -> bool {
        if body.is_fixed() {
            return false;
        }
        if body.position.y - body.bounding_radius() >= self.floor_y {
            return false;
        }
        body.lowest_point() < self.floor_y
    }

}
