//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::tools::ToolOutput;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

/// Apply a transition's log effects to a conversation, as the runtime does.
fn apply(conv: &mut Conversation, new_state: &TurnState, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::AppendMessage(message) => conv.push(message.clone()),
            Effect::SetApproval(outcome) => conv.approval = Some(*outcome),
            _ => {}
        }
    }
    conv.turn = new_state.clone();
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("web_search".to_string()),
        Just("arxiv_search".to_string()),
        Just("wikipedia_search".to_string()),
        Just("human_in_the_loop".to_string()),
        "[a-z_]{3,12}",
    ]
}

fn arb_tool_call_request() -> impl Strategy<Value = ToolCallRequest> {
    ("call_[a-z0-9]{6}", arb_tool_name(), "[a-zA-Z ]{0,20}")
        .prop_map(|(id, name, query)| ToolCallRequest::new(id, name, json!({ "query": query })))
}

fn arb_model_response_event() -> impl Strategy<Value = Event> {
    (
        "[a-zA-Z ]{0,30}",
        proptest::collection::vec(arb_tool_call_request(), 0..3),
    )
        .prop_map(|(text, tool_calls)| Event::ModelResponse { text, tool_calls })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ?]{1,30}".prop_map(|text| Event::UserMessage { text }),
        arb_model_response_event(),
        "[a-zA-Z ]{1,30}".prop_map(|message| Event::ModelError { message }),
        ("call_[a-z0-9]{6}", any::<bool>(), "[a-zA-Z ]{0,30}").prop_map(
            |(tool_call_id, success, text)| Event::ToolComplete {
                tool_call_id,
                output: if success {
                    ToolOutput::success(text)
                } else {
                    ToolOutput::error(text)
                },
            }
        ),
        "\\PC{0,12}".prop_map(|answer| Event::ApprovalAnswer { answer }),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // The log is append-only: every transition leaves the old log as a prefix
    #[test]
    fn prop_log_is_append_only(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut conv = Conversation::new("prop");

        for event in events {
            // Correlate tool results with whatever call is pending so dispatch progresses
            let event = match (&conv.turn, event) {
                (TurnState::DispatchingTool { call }, Event::ToolComplete { output, .. }) => {
                    Event::ToolComplete { tool_call_id: call.id.clone(), output }
                }
                (_, other) => other,
            };

            let before = conv.messages().to_vec();
            if let Ok(result) = transition(&conv.turn, event) {
                apply(&mut conv, &result.new_state, &result.effects);
                prop_assert!(conv.messages().len() >= before.len());
                prop_assert_eq!(&conv.messages()[..before.len()], &before[..]);
            }
        }
    }

    // Every tool result in the log answers an earlier request
    #[test]
    fn prop_tool_results_correlate(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut conv = Conversation::new("prop");

        for event in events {
            let event = match (&conv.turn, event) {
                (TurnState::DispatchingTool { call }, Event::ToolComplete { output, .. }) => {
                    Event::ToolComplete { tool_call_id: call.id.clone(), output }
                }
                (_, other) => other,
            };
            if let Ok(result) = transition(&conv.turn, event) {
                apply(&mut conv, &result.new_state, &result.effects);
            }
        }

        for (i, msg) in conv.messages().iter().enumerate() {
            if msg.role == Role::Tool {
                let id = msg.tool_call_id.as_deref().unwrap_or_default();
                let requested = conv.messages()[..i]
                    .iter()
                    .any(|m| m.tool_calls.iter().any(|c| c.id == id));
                prop_assert!(requested, "tool result {} has no matching request", id);
            }
            if msg.role == Role::Assistant {
                prop_assert!(msg.tool_calls.len() <= 1);
            }
        }
    }

    // Two or more tool calls never reach dispatch
    #[test]
    fn prop_multiple_tool_calls_abort(
        text in "[a-zA-Z ]{0,20}",
        calls in proptest::collection::vec(arb_tool_call_request(), 2..5)
    ) {
        let result = transition(
            &TurnState::AwaitingModel,
            Event::ModelResponse { text, tool_calls: calls },
        ).unwrap();

        prop_assert_eq!(result.new_state, TurnState::Done);
        let reported = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::ReportFailure { .. }));
        let touched_log = result.effects.iter().any(|e| {
            matches!(
                e,
                Effect::ExecuteTool { .. } | Effect::AppendMessage(_) | Effect::RequestModel
            )
        });
        prop_assert!(reported);
        prop_assert!(!touched_log);
    }

    // Approval is "proceed" iff the first non-whitespace char lower-cases to 'y'
    #[test]
    fn prop_approval_classification(answer in "\\PC{0,16}") {
        let expected = answer
            .chars()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| c.to_ascii_lowercase() == 'y');
        let outcome = ApprovalOutcome::classify(&answer);
        prop_assert_eq!(outcome == ApprovalOutcome::Proceed, expected);
    }

    // Every approval answer resumes the model and records the decision
    #[test]
    fn prop_approval_answer_always_resumes(answer in "\\PC{0,16}") {
        let state = TurnState::AwaitingHumanApproval {
            call: ToolCall::new("call_h", ToolKind::HumanApproval, json!({})),
            question: APPROVAL_QUESTION.to_string(),
        };
        let result = transition(&state, Event::ApprovalAnswer { answer }).unwrap();

        prop_assert_eq!(result.new_state, TurnState::AwaitingModel);
        prop_assert!(result.effects.iter().any(|e| matches!(e, Effect::SetApproval(_))));
        prop_assert!(matches!(result.effects.last(), Some(Effect::RequestModel)));
    }

    // A known single tool call always leaves the model waiting on exactly one thing
    #[test]
    fn prop_single_known_call_never_ends_turn(
        kind in prop_oneof![
            Just(ToolKind::WebSearch),
            Just(ToolKind::ArxivSearch),
            Just(ToolKind::WikipediaSearch),
            Just(ToolKind::HumanApproval),
        ],
        id in "call_[a-z0-9]{6}"
    ) {
        let request = ToolCallRequest::new(id, kind.name(), json!({"query": "q"}));
        let result = transition(
            &TurnState::AwaitingModel,
            Event::ModelResponse { text: String::new(), tool_calls: vec![request] },
        ).unwrap();

        let execute_count = result
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::ExecuteTool { .. }))
            .count();
        if kind == ToolKind::HumanApproval {
            let suspended = matches!(result.new_state, TurnState::AwaitingHumanApproval { .. });
            prop_assert!(suspended);
            prop_assert_eq!(execute_count, 0);
        } else {
            let dispatching = matches!(result.new_state, TurnState::DispatchingTool { .. });
            prop_assert!(dispatching);
            prop_assert_eq!(execute_count, 1);
        }
    }
}
