//! Object/group info and the statistics-item projection used throughout the
//! detectors (§3). A statistics item is either a single tracked object
//! (player) or a group (team); both project to a single inner-key string so
//! that the same store can be addressed uniformly for per-player and
//! per-team counters.

use crate::geometry::Vec3;

/// A tracked object (player or ball) at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub object_id: String,
    pub group_id: String,
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
    pub v_abs: Option<f64>,
}

impl ObjectInfo {
    pub fn new(object_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self { object_id: object_id.into(), group_id: group_id.into(), position: None, velocity: None, v_abs: None }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.v_abs = Some(velocity.norm());
        self.velocity = Some(velocity);
        self
    }
}

/// A team/group, addressed by its group id alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub group_id: String,
}

impl GroupInfo {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self { group_id: group_id.into() }
    }
}

/// Either a player or a team; both project to one inner-key string via
/// [`StatisticsItem::inner_key`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsItem {
    Player(ObjectInfo),
    Team(GroupInfo),
}

impl StatisticsItem {
    pub fn player(object_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        StatisticsItem::Player(ObjectInfo::new(object_id, group_id))
    }

    pub fn team(group_id: impl Into<String>) -> Self {
        StatisticsItem::Team(GroupInfo::new(group_id))
    }

    /// The inner-key a state store addresses this item by: the object id
    /// for a player, the group id for a team.
    pub fn inner_key(&self) -> &str {
        match self {
            StatisticsItem::Player(o) => &o.object_id,
            StatisticsItem::Team(g) => &g.group_id,
        }
    }

    pub fn group_id(&self) -> &str {
        match self {
            StatisticsItem::Player(o) => &o.group_id,
            StatisticsItem::Team(g) => &g.group_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_inner_key_is_object_id() {
        let item = StatisticsItem::player("P1", "teamA");
        assert_eq!(item.inner_key(), "P1");
        assert_eq!(item.group_id(), "teamA");
    }

    #[test]
    fn team_inner_key_is_group_id() {
        let item = StatisticsItem::team("teamA");
        assert_eq!(item.inner_key(), "teamA");
    }

    #[test]
    fn velocity_derives_v_abs() {
        let info = ObjectInfo::new("P1", "teamA").with_velocity(Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(info.v_abs, Some(5.0));
    }
}
