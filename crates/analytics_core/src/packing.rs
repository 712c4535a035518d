//! Packing: the count of opposing players strictly closer to a goal than a
//! reference point (§3, used by the possession/duel and pass/shot
//! detectors to score how many defenders a pass or dribble bypassed).

use crate::geometry::Vec3;

/// Goal position for a team attacking towards the right (`+x`) or left
/// (`-x`) end of a field of the given length, on the pitch centerline.
pub fn goal_position(field_length: f64, attacking_right: bool) -> Vec3 {
    let x = if attacking_right { field_length / 2.0 } else { -field_length / 2.0 };
    Vec3::new(x, 0.0, 0.0)
}

/// Number of `others` strictly closer to `goal` (XY plane) than
/// `reference` is.
pub fn count_closer_to_goal(goal: Vec3, reference: Vec3, others: &[Vec3]) -> usize {
    let reference_dist = reference.distance_xy(goal);
    others.iter().filter(|p| p.distance_xy(goal) < reference_dist).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_position_depends_on_attacking_side() {
        assert_eq!(goal_position(100.0, true), Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(goal_position(100.0, false), Vec3::new(-50.0, 0.0, 0.0));
    }

    #[test]
    fn counts_only_strictly_closer_opponents() {
        let goal = Vec3::new(50.0, 0.0, 0.0);
        let reference = Vec3::new(40.0, 0.0, 0.0);
        let others = [
            Vec3::new(45.0, 0.0, 0.0), // closer
            Vec3::new(41.0, 0.0, 0.0), // closer
            Vec3::new(40.0, 0.0, 0.0), // tied, not strictly closer
            Vec3::new(10.0, 0.0, 0.0), // farther
        ];
        assert_eq!(count_closer_to_goal(goal, reference, &others), 2);
    }
}
