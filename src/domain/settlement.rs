use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use super::FriendId;

/// Per-friend score adjustments produced by one trip settlement. These are
/// deltas to add to each friend's current score, never absolute values.
pub type ScoreDeltas = BTreeMap<FriendId, i64>;

/// Why a trip could not be settled. All variants are user-correctable input
/// problems; none of them leaves any state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("friend {0} cannot be both driver and passenger on the same trip")]
    ConflictingRole(FriendId),

    #[error("there are no passengers")]
    NoPassengers,

    #[error("there are no drivers")]
    NoDrivers,

    #[error("more drivers ({drivers}) than passengers ({passengers})")]
    DriverPassengerImbalance { drivers: usize, passengers: usize },

    #[error("friend {0} does not exist")]
    FriendNotFound(FriendId),
}

/// Settle a trip: split `distance` into score deltas for the given partition
/// of the roster into drivers and passengers.
///
/// Every driver earns the full trip distance; the passengers collectively
/// fund it, each losing `drivers * distance / passengers` truncated toward
/// zero. The truncation means the deltas of an unevenly divisible trip do
/// not sum to exactly zero; callers relying on exact conservation must pick
/// distances divisible by the passenger count.
///
/// `distance` must be non-negative; range-checking raw input is the caller's
/// job. Duplicate ids within one role list are collapsed. Validation runs in
/// a fixed order and the first failure is returned with nothing applied.
pub fn settle_trip(
    distance: f64,
    driver_ids: &[FriendId],
    passenger_ids: &[FriendId],
    eligible: &BTreeSet<FriendId>,
) -> Result<ScoreDeltas, SettlementError> {
    let drivers = dedup(driver_ids);
    let passengers = dedup(passenger_ids);

    let passenger_set: BTreeSet<FriendId> = passengers.iter().copied().collect();
    if let Some(&both) = drivers.iter().find(|id| passenger_set.contains(id)) {
        return Err(SettlementError::ConflictingRole(both));
    }
    if passengers.is_empty() {
        return Err(SettlementError::NoPassengers);
    }
    if drivers.is_empty() {
        return Err(SettlementError::NoDrivers);
    }
    if drivers.len() > passengers.len() {
        return Err(SettlementError::DriverPassengerImbalance {
            drivers: drivers.len(),
            passengers: passengers.len(),
        });
    }
    if let Some(&missing) = drivers
        .iter()
        .chain(passengers.iter())
        .find(|id| !eligible.contains(id))
    {
        return Err(SettlementError::FriendNotFound(missing));
    }

    let mut deltas = ScoreDeltas::new();
    for &driver in &drivers {
        deltas.insert(driver, distance as i64);
    }
    let share = drivers.len() as f64 * distance / passengers.len() as f64;
    for &passenger in &passengers {
        deltas.insert(passenger, -(share as i64));
    }
    Ok(deltas)
}

/// Drop repeated ids, keeping first-occurrence order.
fn dedup(ids: &[FriendId]) -> Vec<FriendId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible(ids: &[FriendId]) -> BTreeSet<FriendId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_simple_settlement() {
        let deltas = settle_trip(10.0, &[1], &[2, 3], &eligible(&[1, 2, 3])).unwrap();

        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[&1], 10);
        assert_eq!(deltas[&2], -5);
        assert_eq!(deltas[&3], -5);
        assert_eq!(deltas.values().sum::<i64>(), 0);
    }

    #[test]
    fn test_driver_reward_is_uniform() {
        let deltas = settle_trip(12.0, &[1, 2], &[3, 4, 5, 6], &eligible(&[1, 2, 3, 4, 5, 6]))
            .unwrap();

        assert_eq!(deltas[&1], 12);
        assert_eq!(deltas[&2], 12);
        // 2 drivers * 12 / 4 passengers = 6 each
        for p in [3, 4, 5, 6] {
            assert_eq!(deltas[&p], -6);
        }
        assert_eq!(deltas.values().sum::<i64>(), 0);
    }

    #[test]
    fn test_truncation_loses_remainder() {
        // 10 / 3 = 3.33..., applied as -3 per passenger; the remainder is
        // lost and the deltas sum to +1.
        let deltas = settle_trip(10.0, &[1], &[2, 3, 4], &eligible(&[1, 2, 3, 4])).unwrap();

        assert_eq!(deltas[&1], 10);
        for p in [2, 3, 4] {
            assert_eq!(deltas[&p], -3);
        }
        assert_eq!(deltas.values().sum::<i64>(), 1);
    }

    #[test]
    fn test_conflicting_role_wins_over_everything() {
        // Friend 1 is flagged both ways; friend 2 is a valid passenger. The
        // conflict is reported even though the trip would otherwise be
        // invalid for other reasons too.
        let err = settle_trip(10.0, &[1], &[1, 2], &eligible(&[2])).unwrap_err();
        assert_eq!(err, SettlementError::ConflictingRole(1));
    }

    #[test]
    fn test_no_passengers() {
        let err = settle_trip(10.0, &[1], &[], &eligible(&[1])).unwrap_err();
        assert_eq!(err, SettlementError::NoPassengers);
    }

    #[test]
    fn test_no_drivers() {
        let err = settle_trip(10.0, &[], &[2], &eligible(&[2])).unwrap_err();
        assert_eq!(err, SettlementError::NoDrivers);
    }

    #[test]
    fn test_empty_roles_report_passengers_first() {
        let err = settle_trip(10.0, &[], &[], &eligible(&[])).unwrap_err();
        assert_eq!(err, SettlementError::NoPassengers);
    }

    #[test]
    fn test_more_drivers_than_passengers() {
        let err = settle_trip(5.0, &[1, 2], &[3], &eligible(&[1, 2, 3])).unwrap_err();
        assert_eq!(
            err,
            SettlementError::DriverPassengerImbalance {
                drivers: 2,
                passengers: 1
            }
        );
    }

    #[test]
    fn test_unknown_driver_is_reported() {
        let err = settle_trip(10.0, &[99], &[2, 3], &eligible(&[2, 3])).unwrap_err();
        assert_eq!(err, SettlementError::FriendNotFound(99));
    }

    #[test]
    fn test_unknown_passenger_reported_after_drivers() {
        // Both a driver and a passenger are unknown; drivers are checked
        // first.
        let err = settle_trip(10.0, &[99], &[98, 2], &eligible(&[2])).unwrap_err();
        assert_eq!(err, SettlementError::FriendNotFound(99));
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        // Passing the same driver twice must not double the share charged
        // to the passengers.
        let deltas = settle_trip(10.0, &[1, 1], &[2, 3], &eligible(&[1, 2, 3])).unwrap();
        assert_eq!(deltas[&1], 10);
        assert_eq!(deltas[&2], -5);
        assert_eq!(deltas[&3], -5);
    }

    #[test]
    fn test_equal_driver_and_passenger_counts_allowed() {
        let deltas = settle_trip(8.0, &[1, 2], &[3, 4], &eligible(&[1, 2, 3, 4])).unwrap();
        // 2 * 8 / 2 = 8 per passenger
        assert_eq!(deltas[&3], -8);
        assert_eq!(deltas[&4], -8);
        assert_eq!(deltas.values().sum::<i64>(), 0);
    }

    #[test]
    fn test_zero_distance_settles_to_nothing() {
        let deltas = settle_trip(0.0, &[1], &[2], &eligible(&[1, 2])).unwrap();
        assert_eq!(deltas[&1], 0);
        assert_eq!(deltas[&2], 0);
    }

    #[test]
    fn test_fractional_distance_truncates_on_both_sides() {
        let deltas = settle_trip(7.9, &[1], &[2], &eligible(&[1, 2])).unwrap();
        assert_eq!(deltas[&1], 7);
        assert_eq!(deltas[&2], -7);
    }
}
