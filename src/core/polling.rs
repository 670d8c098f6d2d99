// LogDeck - core/polling.rs
//
// Pure tick logic for the status poller. The worker thread in
// `app::poller` fetches, this module decides what changed.

use crate::core::model::WatchedEntity;

/// Result of fetching one watched entity during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFetch {
    Updated(WatchedEntity),
    Failed { id: String, message: String },
}

/// Everything a tick computes from the previous snapshot and the fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub snapshot: Vec<WatchedEntity>,
    /// Ids whose status differs from the previous snapshot, plus ids that
    /// were not watched before.
    pub changed: Vec<String>,
    /// Every entity in `snapshot` is terminal.
    pub all_terminal: bool,
    /// (id, message) per failed fetch.
    pub errors: Vec<(String, String)>,
}

/// Keep only entities that are still in flight.
pub fn filter_in_flight(entities: &[WatchedEntity]) -> Vec<WatchedEntity> {
    entities
        .iter()
        .filter(|e| e.is_in_flight())
        .cloned()
        .collect()
}

/// Number of in-flight entities; drives the "N items still processing"
/// notification.
pub fn in_flight_count(entities: &[WatchedEntity]) -> usize {
    entities.iter().filter(|e| e.is_in_flight()).count()
}

/// Merge one tick's fetch results into the previous snapshot.
///
/// A failed fetch keeps that entity's last-known state; it never affects
/// other entities. Order of the previous snapshot is preserved, new ids
/// are appended.
pub fn merge_tick(previous: &[WatchedEntity], fetches: Vec<EntityFetch>) -> TickOutcome {
    let mut snapshot = previous.to_vec();
    let mut changed = Vec::new();
    let mut errors = Vec::new();

    for fetch in fetches {
        match fetch {
            EntityFetch::Updated(entity) => {
                match snapshot.iter_mut().find(|e| e.id == entity.id) {
                    Some(existing) => {
                        if existing.status != entity.status {
                            changed.push(entity.id.clone());
                        }
                        *existing = entity;
                    }
                    None => {
                        changed.push(entity.id.clone());
                        snapshot.push(entity);
                    }
                }
            }
            EntityFetch::Failed { id, message } => errors.push((id, message)),
        }
    }

    let all_terminal = snapshot.iter().all(|e| !e.is_in_flight());
    TickOutcome {
        snapshot,
        changed,
        all_terminal,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ProjectStatus;

    fn entity(id: &str, status: ProjectStatus) -> WatchedEntity {
        WatchedEntity {
            id: id.to_string(),
            name: format!("project-{id}"),
            status,
        }
    }

    #[test]
    fn test_filter_in_flight_drops_terminal() {
        let input = vec![
            entity("a", ProjectStatus::Ready),
            entity("b", ProjectStatus::InProgress),
            entity("c", ProjectStatus::Failed),
            entity("d", ProjectStatus::Other("QUEUED".to_string())),
        ];
        let ids: Vec<_> = filter_in_flight(&input).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert_eq!(in_flight_count(&input), 2);
    }

    #[test]
    fn test_failed_fetch_retains_last_known_status() {
        let previous = vec![
            entity("a", ProjectStatus::InProgress),
            entity("b", ProjectStatus::Initiated),
        ];
        let outcome = merge_tick(
            &previous,
            vec![
                EntityFetch::Failed {
                    id: "a".to_string(),
                    message: "timeout".to_string(),
                },
                EntityFetch::Updated(entity("b", ProjectStatus::Ready)),
            ],
        );
        assert_eq!(outcome.snapshot[0].status, ProjectStatus::InProgress);
        assert_eq!(outcome.snapshot[1].status, ProjectStatus::Ready);
        assert_eq!(outcome.changed, vec!["b"]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(!outcome.all_terminal);
    }

    #[test]
    fn test_all_terminal_detected() {
        let previous = vec![entity("a", ProjectStatus::InProgress)];
        let outcome = merge_tick(
            &previous,
            vec![EntityFetch::Updated(entity("a", ProjectStatus::Failed))],
        );
        assert!(outcome.all_terminal);
        assert_eq!(outcome.changed, vec!["a"]);
    }

    #[test]
    fn test_unchanged_status_not_reported() {
        let previous = vec![entity("a", ProjectStatus::InProgress)];
        let outcome = merge_tick(
            &previous,
            vec![EntityFetch::Updated(entity("a", ProjectStatus::InProgress))],
        );
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn test_new_entity_appended() {
        let previous = vec![entity("a", ProjectStatus::InProgress)];
        let outcome = merge_tick(
            &previous,
            vec![EntityFetch::Updated(entity("z", ProjectStatus::InProgress))],
        );
        assert_eq!(outcome.snapshot.len(), 2);
        assert_eq!(outcome.snapshot[1].id, "z");
        assert_eq!(outcome.changed, vec!["z"]);
    }
}
