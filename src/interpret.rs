//! Result interpretation
//!
//! Parses the recognizer's semantic token strings into a de-duplicated,
//! ordered list of candidate actions. Hypotheses are processed in n-best
//! order until the result limit is reached; a hypothesis that cannot be
//! parsed contributes nothing.

use crate::actions::{ActionDescriptor, CallTarget, Hypothesis, IntentRef};
use crate::contacts::{CallLog, PhoneId, ID_UNDEFINED};
use tracing::{debug, warn};

/// Upper bound on derived actions per session.
pub const RESULT_LIMIT: usize = 5;

const AT_HOME: &str = " at home";
const ON_MOBILE: &str = " on mobile";
const AT_WORK: &str = " at work";
const AT_OTHER: &str = " at other";

/// Turn an n-best list into candidate actions. An empty return is the
/// caller's cue for the distinct "no actions" failure.
pub fn interpret(hypotheses: &[Hypothesis], call_log: &dyn CallLog) -> Vec<ActionDescriptor> {
    let mut actions: Vec<ActionDescriptor> = Vec::new();

    for hypothesis in hypotheses {
        if actions.len() >= RESULT_LIMIT {
            break;
        }
        debug!("interpreting {hypothesis}");

        let tokens: Vec<&str> = hypothesis.semantic.split_whitespace().collect();
        let literal = hypothesis.literal.as_str();

        match tokens.as_slice() {
            ["DIAL", digits, ..] => {
                if digits.chars().all(|c| c.is_ascii_digit()) {
                    let number = group_digits(digits);
                    let verb = literal.split_whitespace().next().unwrap_or_default();
                    let spoken = format!("{verb} {number}");
                    push_unique(
                        &mut actions,
                        ActionDescriptor::call(CallTarget::RawNumber(number), spoken),
                    );
                } else {
                    warn!("cannot parse number {digits:?} in DIAL command");
                }
            }

            ["CALL", ids @ ..] if ids.len() >= 6 => {
                interpret_call(&mut actions, ids, literal);
            }

            ["voicemail"] => {
                push_unique(
                    &mut actions,
                    ActionDescriptor::call(CallTarget::Voicemail, literal)
                        .exclude_from_recents(),
                );
            }

            ["redial"] => {
                if let Some(number) = call_log.last_outgoing() {
                    push_unique(
                        &mut actions,
                        ActionDescriptor::call(CallTarget::RawNumber(number), literal)
                            .exclude_from_recents(),
                    );
                } else {
                    debug!("redial with empty call log");
                }
            }

            [command, refs @ ..] if command.eq_ignore_ascii_case("Intent") => {
                for token in refs {
                    let Some(mut reference) = IntentRef::parse(token) else {
                        warn!("poorly formed action reference in grammar: {token:?}");
                        continue;
                    };
                    if reference.spoken_sentence.is_none() {
                        reference.spoken_sentence = Some(literal.to_string());
                    }
                    push_unique(&mut actions, ActionDescriptor::intent(reference, literal));
                }
            }

            _ => {
                warn!("cannot parse semantic string {:?}", hypothesis.semantic);
            }
        }
    }

    actions
}

/// `CALL <person> <primary> <home> <mobile> <work> <other> [H|M|W|O]`
fn interpret_call(actions: &mut Vec<ActionDescriptor>, ids: &[&str], literal: &str) {
    let mut parsed = [ID_UNDEFINED; 6];
    for (slot, token) in parsed.iter_mut().zip(ids) {
        match token.parse::<PhoneId>() {
            Ok(id) => *slot = id,
            Err(_) => {
                warn!("cannot parse id {token:?} in CALL command");
                return;
            }
        }
    }
    let [person, primary, home, mobile, work, other] = parsed;
    let typed = [
        (home, AT_HOME),
        (mobile, ON_MOBILE),
        (work, AT_WORK),
        (other, AT_OTHER),
    ];

    let suffix = ids.get(6).copied();
    let before = actions.len();

    // explicit 'at home' / 'on mobile' / ... suffix with a defined id
    let spoken_id = match suffix {
        Some(s) if s.eq_ignore_ascii_case("H") => Some(home),
        Some(s) if s.eq_ignore_ascii_case("M") => Some(mobile),
        Some(s) if s.eq_ignore_ascii_case("W") => Some(work),
        Some(s) if s.eq_ignore_ascii_case("O") => Some(other),
        _ => None,
    };
    if let Some(id) = spoken_id.filter(|&id| id != ID_UNDEFINED) {
        push_unique(actions, ActionDescriptor::call(CallTarget::Phone(id), literal));
        return;
    }

    // a defined primary that matches a typed id resolves to that one phone
    if primary != ID_UNDEFINED {
        if let Some((_, phrase)) = typed.iter().find(|(id, _)| *id == primary) {
            push_unique(
                actions,
                ActionDescriptor::call(
                    CallTarget::Phone(primary),
                    format!("{literal}{phrase}"),
                ),
            );
            return;
        }
    }

    // no single best phone: offer every defined typed id
    let base = if suffix.is_some() {
        strip_last_words(literal, 2)
    } else {
        literal.to_string()
    };
    for (id, phrase) in typed {
        if id != ID_UNDEFINED {
            push_unique(
                actions,
                ActionDescriptor::call(CallTarget::Phone(id), format!("{base}{phrase}")),
            );
        }
    }

    // last resort: the bare person row
    if actions.len() == before && person != ID_UNDEFINED {
        push_unique(actions, ActionDescriptor::call(CallTarget::Person(person), literal));
    }
}

/// Group a dialed number for display: 3-3-4 for ten digits, 3-4 for
/// seven, verbatim otherwise.
fn group_digits(digits: &str) -> String {
    match digits.len() {
        10 => format!("{} {} {}", &digits[..3], &digits[3..6], &digits[6..]),
        7 => format!("{} {}", &digits[..3], &digits[3..]),
        _ => digits.to_string(),
    }
}

/// Drop the trailing `n` words, e.g. the spoken "at home" phrase.
fn strip_last_words(literal: &str, n: usize) -> String {
    let words: Vec<&str> = literal.split_whitespace().collect();
    words[..words.len().saturating_sub(n)].join(" ")
}

fn push_unique(actions: &mut Vec<ActionDescriptor>, action: ActionDescriptor) {
    if actions.iter().any(|existing| existing.same_target(&action)) {
        return;
    }
    actions.push(action);
}
