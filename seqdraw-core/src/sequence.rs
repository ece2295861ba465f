//! Render sequence: the ordered call and return arrows derived from the flat message list
//!
//! Return arrows are never written in the source. They are inferred with an
//! explicit call stack: a pending call stays open while its callee keeps
//! talking, and is answered as soon as someone else takes the floor.

use serde::Serialize;

use crate::ast::Message;

/// Direction of a render step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Call,
    Return,
}

/// One arrow in draw order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderStep {
    pub kind: StepKind,
    pub from: String,
    pub to: String,
    pub label: String,
    /// Message this step was derived from
    pub message_index: usize,
    pub is_async: bool,
}

impl RenderStep {
    pub fn is_self(&self) -> bool {
        self.from == self.to
    }

    /// Whether the step ends up as a visible arrow.
    ///
    /// Unlabeled returns and self-call returns still take part in activation
    /// and position bookkeeping, they just draw nothing.
    pub fn draws_arrow(&self) -> bool {
        match self.kind {
            StepKind::Call => true,
            StepKind::Return => !self.label.is_empty() && !self.is_self(),
        }
    }
}

/// A synchronous call still waiting for its return
#[derive(Debug)]
struct PendingCall<'a> {
    from: &'a str,
    to: &'a str,
    return_label: Option<&'a str>,
    message_index: usize,
}

impl PendingCall<'_> {
    fn into_return(self) -> RenderStep {
        RenderStep {
            kind: StepKind::Return,
            from: self.to.to_string(),
            to: self.from.to_string(),
            label: self.return_label.unwrap_or_default().to_string(),
            message_index: self.message_index,
            is_async: false,
        }
    }
}

/// Build the ordered call/return steps for a message list
pub fn build_render_sequence(messages: &[Message]) -> Vec<RenderStep> {
    let mut steps = Vec::with_capacity(messages.len() * 2);
    let mut stack: Vec<PendingCall<'_>> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        // Close everything nested inside other parties before the sender speaks
        while let Some(top) = stack.pop() {
            if top.to == message.from {
                stack.push(top);
                break;
            }
            tracing::trace!(message = index, closed = top.message_index, "return before call");
            steps.push(top.into_return());
        }

        // Talking back to the waiting caller answers its call first
        if let Some(top) = stack.pop() {
            if top.from == message.to && top.to == message.from {
                tracing::trace!(message = index, closed = top.message_index, "reply closes call");
                steps.push(top.into_return());
            } else {
                stack.push(top);
            }
        }

        steps.push(RenderStep {
            kind: StepKind::Call,
            from: message.from.clone(),
            to: message.to.clone(),
            label: message.label.clone(),
            message_index: index,
            is_async: message.is_async,
        });

        let pending = PendingCall {
            from: &message.from,
            to: &message.to,
            return_label: message.return_label.as_deref(),
            message_index: index,
        };
        if message.is_async {
            continue;
        }
        if message.is_self_call() {
            steps.push(pending.into_return());
        } else {
            stack.push(pending);
        }
    }

    while let Some(top) = stack.pop() {
        steps.push(top.into_return());
    }

    tracing::trace!(messages = messages.len(), steps = steps.len(), "render sequence built");
    steps
}

/// Steps that draw an arrow, with their index in the full sequence
pub fn renderable_steps(steps: &[RenderStep]) -> impl Iterator<Item = (usize, &RenderStep)> {
    steps.iter().enumerate().filter(|(_, step)| step.draws_arrow())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn summary(input: &str) -> Vec<String> {
        let doc = parse(input);
        build_render_sequence(&doc.messages)
            .iter()
            .map(|s| {
                let kind = match s.kind {
                    StepKind::Call => "call",
                    StepKind::Return => "return",
                };
                format!("{} {}->{}", kind, s.from, s.to)
            })
            .collect()
    }

    fn message(from: &str, to: &str) -> Message {
        Message {
            from: from.to_string(),
            to: to.to_string(),
            label: format!("{}{}", from, to),
            return_label: None,
            is_async: false,
            line: 1,
        }
    }

    #[test]
    fn test_independent_messages_close_before_next() {
        assert_eq!(
            summary("A -> B: hello\nB -> A: world"),
            ["call A->B", "return B->A", "call B->A", "return A->B"]
        );
    }

    #[test]
    fn test_delegation_closes_inner_work_first() {
        let steps = summary("A -> B: setup\nB -> C: delegate\nC -> B: result\nB -> A: done");
        assert_eq!(steps[..3], ["call A->B", "call B->C", "return C->B"]);
        let inner_return = steps.iter().position(|s| s == "return C->B").unwrap();
        let reply = steps.iter().position(|s| s == "call B->A").unwrap();
        assert!(inner_return < reply);
    }

    #[test]
    fn test_nested_calls_stay_open() {
        assert_eq!(
            summary("A -> B: a\nB -> C: b\nC -> D: c"),
            [
                "call A->B",
                "call B->C",
                "call C->D",
                "return D->C",
                "return C->B",
                "return B->A"
            ]
        );
    }

    #[test]
    fn test_self_call_returns_immediately() {
        let doc = parse("A -> A: validate");
        let steps = build_render_sequence(&doc.messages);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind, StepKind::Call);
        assert_eq!(steps[1].kind, StepKind::Return);
        assert_eq!((steps[1].from.as_str(), steps[1].to.as_str()), ("A", "A"));
        assert_eq!(renderable_steps(&steps).count(), 1);
    }

    #[test]
    fn test_async_has_no_return() {
        let doc = parse("A ~> B: notify");
        let steps = build_render_sequence(&doc.messages);
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_async);
    }

    #[test]
    fn test_return_labels() {
        let doc = parse("A -> B: get <- item\nA -> C: ping");
        let steps = build_render_sequence(&doc.messages);
        assert_eq!(steps[1].kind, StepKind::Return);
        assert_eq!(steps[1].label, "item");
        // The unlabeled return of the ping is bookkeeping only
        let drawn: Vec<usize> = renderable_steps(&steps).map(|(i, _)| i).collect();
        assert_eq!(drawn, [0, 1, 2]);
        assert_eq!(steps.len(), 4);
    }

    #[test]
    fn test_every_sync_call_gets_one_matching_return() {
        let names = ["A", "B", "C", "D"];
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..200 {
            let len = (next() % 12) as usize + 1;
            let messages: Vec<Message> = (0..len)
                .map(|_| {
                    let from = names[(next() % 4) as usize];
                    let mut to = names[(next() % 4) as usize];
                    if to == from {
                        to = names[(names.iter().position(|n| *n == from).unwrap() + 1) % 4];
                    }
                    message(from, to)
                })
                .collect();

            let steps = build_render_sequence(&messages);
            let calls: Vec<&RenderStep> =
                steps.iter().filter(|s| s.kind == StepKind::Call).collect();
            let returns: Vec<&RenderStep> =
                steps.iter().filter(|s| s.kind == StepKind::Return).collect();
            assert_eq!(calls.len(), len);
            assert_eq!(returns.len(), len);

            for ret in &returns {
                let call = calls
                    .iter()
                    .find(|c| c.message_index == ret.message_index)
                    .unwrap();
                assert_eq!(ret.from, call.to);
                assert_eq!(ret.to, call.from);
                let call_pos = steps.iter().position(|s| std::ptr::eq(s, *call)).unwrap();
                let ret_pos = steps.iter().position(|s| std::ptr::eq(s, *ret)).unwrap();
                assert!(call_pos < ret_pos);
            }
        }
    }
}
