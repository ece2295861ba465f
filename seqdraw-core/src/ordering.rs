//! Left-to-right participant order
//!
//! Two hints are composed: explicit `position` overrides first, then group
//! adjacency on top of that result.

use std::collections::HashSet;

use crate::ast::{Diagnostic, DiagnosticKind, Group, Participant};

/// Resolved order as indices into the participant list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticipantOrder {
    pub order: Vec<usize>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve the participant order from position overrides and groups
pub fn resolve_order(participants: &[Participant], groups: &[Group]) -> ParticipantOrder {
    let mut diagnostics = Vec::new();
    let by_position = apply_position_overrides(participants, &mut diagnostics);
    let order = apply_group_adjacency(participants, groups, by_position);
    ParticipantOrder { order, diagnostics }
}

/// Map a signed override onto a slot; negative counts from the end
fn resolve_slot(position: i32, len: usize) -> usize {
    let last = len.saturating_sub(1);
    if position >= 0 {
        (position as usize).min(last)
    } else {
        len.saturating_sub(position.unsigned_abs() as usize).min(last)
    }
}

/// Nearest free slot, searching +1, -1, +2, -2, ...
fn nearest_free(slots: &[Option<usize>], target: usize) -> Option<usize> {
    if slots.get(target).is_some_and(|s| s.is_none()) {
        return Some(target);
    }
    for offset in 1..slots.len() {
        let above = target + offset;
        if above < slots.len() && slots[above].is_none() {
            return Some(above);
        }
        if offset <= target && slots[target - offset].is_none() {
            return Some(target - offset);
        }
    }
    None
}

fn apply_position_overrides(
    participants: &[Participant],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<usize> {
    let len = participants.len();
    let mut requests: Vec<(usize, usize)> = participants
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.position.map(|pos| (resolve_slot(pos, len), i)))
        .collect();
    if requests.is_empty() {
        return (0..len).collect();
    }
    requests.sort();

    let mut slots: Vec<Option<usize>> = vec![None; len];
    for (target, index) in requests {
        let Some(placed) = nearest_free(&slots, target) else {
            continue;
        };
        if placed != target {
            let participant = &participants[index];
            let kind = DiagnosticKind::PositionConflict {
                participant: participant.id.clone(),
                requested: target,
                placed,
            };
            tracing::debug!(line = participant.line, %kind, "diagram diagnostic");
            diagnostics.push(Diagnostic::new(participant.line, kind));
        }
        slots[placed] = Some(index);
    }

    let mut unplaced = (0..len).filter(|&i| participants[i].position.is_none());
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        *slot = unplaced.next();
    }
    slots.into_iter().flatten().collect()
}

fn apply_group_adjacency(
    participants: &[Participant],
    groups: &[Group],
    order: Vec<usize>,
) -> Vec<usize> {
    if groups.is_empty() {
        return order;
    }

    let mut placed = vec![false; participants.len()];
    let mut result = Vec::with_capacity(order.len());
    for group in groups {
        let members: HashSet<&str> = group.members.iter().map(String::as_str).collect();
        for &index in &order {
            if !placed[index] && members.contains(participants[index].id.as_str()) {
                placed[index] = true;
                result.push(index);
            }
        }
    }
    result.extend(order.into_iter().filter(|&index| !placed[index]));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn ordered_ids(input: &str) -> Vec<String> {
        let doc = parse(input);
        resolve_order(&doc.participants, &doc.groups)
            .order
            .into_iter()
            .map(|i| doc.participants[i].id.clone())
            .collect()
    }

    #[test]
    fn test_no_hints_keeps_discovery_order() {
        assert_eq!(ordered_ids("A -> B: x\nB -> C: y"), ["A", "B", "C"]);
    }

    #[test]
    fn test_negative_position_already_last() {
        let input = "participant A\nparticipant B\nparticipant C position -1";
        assert_eq!(ordered_ids(input), ["A", "B", "C"]);
    }

    #[test]
    fn test_negative_position_moves_to_end() {
        let input = "participant A position -1\nparticipant B\nparticipant C";
        assert_eq!(ordered_ids(input), ["B", "C", "A"]);
    }

    #[test]
    fn test_positive_position() {
        let input = "participant A\nparticipant B\nparticipant C position 0\nparticipant D";
        assert_eq!(ordered_ids(input), ["C", "A", "B", "D"]);
    }

    #[test]
    fn test_out_of_range_position_is_clamped() {
        let input = "participant A position 10\nparticipant B\nparticipant C position -7";
        assert_eq!(ordered_ids(input), ["C", "B", "A"]);
    }

    #[test]
    fn test_conflict_prefers_next_slot_up() {
        let input = "participant A\nparticipant B position 1\nparticipant C position 1\nparticipant D";
        let doc = parse(input);
        let resolved = resolve_order(&doc.participants, &doc.groups);
        let ids: Vec<&str> = resolved
            .order
            .iter()
            .map(|&i| doc.participants[i].id.as_str())
            .collect();
        assert_eq!(ids, ["A", "B", "C", "D"]);
        assert_eq!(
            resolved.diagnostics,
            vec![Diagnostic::new(
                3,
                DiagnosticKind::PositionConflict {
                    participant: "C".to_string(),
                    requested: 1,
                    placed: 2,
                }
            )]
        );
    }

    #[test]
    fn test_conflict_at_last_slot_searches_down() {
        let input = "participant A position -1\nparticipant B position -1\nparticipant C";
        assert_eq!(ordered_ids(input), ["C", "B", "A"]);
    }

    #[test]
    fn test_group_adjacency() {
        let input = "A -> B: x\nB -> C: y\nC -> D: z\ngroup Data: D, B";
        assert_eq!(ordered_ids(input), ["B", "D", "A", "C"]);
    }

    #[test]
    fn test_groups_in_declaration_order() {
        let input = "participant A\nparticipant B\nparticipant C\nparticipant D\ngroup Second: C\ngroup First: A, D";
        assert_eq!(ordered_ids(input), ["C", "A", "D", "B"]);
    }

    #[test]
    fn test_group_applies_after_positions() {
        let input = "participant A\nparticipant B\nparticipant C position 0\ngroup G: A, C";
        assert_eq!(ordered_ids(input), ["C", "A", "B"]);
    }
}
