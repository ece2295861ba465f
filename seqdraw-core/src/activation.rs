//! Activation intervals on lifelines

use serde::Serialize;
use std::collections::HashMap;

use crate::sequence::{RenderStep, StepKind};

/// A participant busy handling a call, between two render steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub participant: String,
    pub start_step: usize,
    pub end_step: usize,
    /// 0 is the outermost call on this participant
    pub depth: usize,
}

/// Compute nested activation intervals from the full step list.
///
/// Async calls never open an activation. Results are ordered by closing step.
pub fn compute_activations(steps: &[RenderStep]) -> Vec<Activation> {
    let mut open: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut activations = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        match step.kind {
            StepKind::Call if !step.is_async => {
                open.entry(step.to.as_str()).or_default().push(index);
            }
            StepKind::Call => {}
            StepKind::Return => {
                let Some(stack) = open.get_mut(step.from.as_str()) else {
                    continue;
                };
                if let Some(start_step) = stack.pop() {
                    activations.push(Activation {
                        participant: step.from.clone(),
                        start_step,
                        end_step: index,
                        depth: stack.len(),
                    });
                }
            }
        }
    }

    activations
}
