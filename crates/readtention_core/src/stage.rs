//! crates/readtention_core/src/stage.rs
//!
//! The step-by-step conversation that walks a reader from a central idea, to
//! main branches, to supporting sub-branches, and finally into open-ended
//! refinement.
//!
//! The machine is pure: callers feed it the text the model produced for the
//! current step, persist the resulting [`ConversationState`], and post the
//! returned follow-up question as an AI message.

use crate::domain::ConversationState;
use crate::parse::parse_items;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Welcome,
    Central,
    Branches,
    Subbranches,
    Refinement,
    Declined,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Welcome => "welcome",
            Stage::Central => "central",
            Stage::Branches => "branches",
            Stage::Subbranches => "subbranches",
            Stage::Refinement => "refinement",
            Stage::Declined => "declined",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(Stage::Welcome),
            "central" => Ok(Stage::Central),
            "branches" => Ok(Stage::Branches),
            "subbranches" => Ok(Stage::Subbranches),
            "refinement" => Ok(Stage::Refinement),
            "declined" => Ok(Stage::Declined),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

pub fn welcome_message(title: &str) -> String {
    format!("👋 Welcome! Ready to generate your mind map for *{}*?", title)
}

pub const DECLINED_MESSAGE: &str =
    "No worries! You can start typing anytime when you're ready to build your mind map.";

pub const CENTRAL_FOLLOW_UP: &str = "Great start! Now let's go one level deeper.\n\nStep 2️⃣: What are the *main branches* of ideas that support this central theme?";
pub const COMPLETE_FOLLOW_UP: &str =
    "✅ You've outlined a complete mind map! You can refine it further or move to Markmap.";
pub const REFINEMENT_FOLLOW_UP: &str = "Anything else you'd like to add?";

/// Asked when the reader starts building by hand, e.g. after a failed
/// one-shot generation.
pub fn central_question(title: &str) -> String {
    format!("What's the main theme or central idea of \"{}\"?", title)
}

/// Posted while a one-shot generation runs.
pub fn generating_message(title: &str, lens_keys: &[&str]) -> String {
    let modes = if lens_keys.is_empty() {
        String::new()
    } else {
        format!(" with {} perspectives", lens_keys.join(", "))
    };
    format!(
        "🎯 Perfect! I'm generating your personalized mind map for \"{}\"{}. This may take a few moments...",
        title, modes
    )
}

/// Posted after a one-shot generation succeeds.
pub fn generated_message(lens_keys: &[&str]) -> String {
    if lens_keys.is_empty() {
        return "✅ Your mind map is ready! You can see it below. Would you like to refine or add anything to it?"
            .to_string();
    }
    format!(
        "✅ Your personalized mind map is ready! I've focused on the {} perspective{} you selected. You can see it below. Would you like to refine or add anything to it?",
        lens_keys.join(" and "),
        if lens_keys.len() > 1 { "s" } else { "" }
    )
}

/// Posted after a one-shot generation fails; the reader continues by hand.
pub fn generation_failed_message(title: &str, upstream: bool) -> String {
    let reason = if upstream {
        "🤖 AI service is temporarily unavailable. Let's create your mind map manually instead!"
    } else {
        "⚡ Something went wrong with the automatic generation. No worries - let's build your mind map step by step!"
    };
    format!("❌ {} {}", reason, central_question(title))
}

fn sub_branch_question(branch: &str, is_first: bool) -> String {
    if is_first {
        format!(
            "Awesome! Let's explore further.\n\nStep 3️⃣: What are some *supporting sub-branches* or specific examples for \"{}\"?",
            branch
        )
    } else {
        format!(
            "Nice! Next up: what supports \"{}\"? Share a few sub-branches or examples.",
            branch
        )
    }
}

/// What the caller should do with a model reply at the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRequest {
    /// Distill the reply into the central idea.
    CentralIdea,
    /// Turn the reply into the main branch list.
    Branches { central_idea: String },
    /// Turn the reply into sub-branches of one branch.
    SubBranches { central_idea: String, branch: String },
    /// No outline work; answer with a reflective question.
    Reflect,
}

/// Result of folding one reply into the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// The stage the reply was folded at.
    pub folded_at: Stage,
    /// Whether the outline changed.
    pub advanced: bool,
    /// The AI follow-up question to post next.
    pub follow_up: String,
    /// The outline after the fold.
    pub markdown: String,
}

/// Drives a [`ConversationState`] through the outline-building stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StageMachine {
    state: ConversationState,
}

impl StageMachine {
    pub fn new(state: ConversationState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn into_state(self) -> ConversationState {
        self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn markdown(&self) -> String {
        self.state.tree.to_markdown()
    }

    /// The kind of model work needed for the next user message.
    pub fn next_request(&self) -> StepRequest {
        let tree = &self.state.tree;
        match self.state.stage {
            Stage::Welcome | Stage::Central => StepRequest::CentralIdea,
            Stage::Branches => StepRequest::Branches {
                central_idea: tree.central_idea.clone(),
            },
            Stage::Subbranches => match tree.branches.get(self.state.branch_cursor) {
                Some(branch) => StepRequest::SubBranches {
                    central_idea: tree.central_idea.clone(),
                    branch: branch.clone(),
                },
                None => StepRequest::Reflect,
            },
            Stage::Refinement | Stage::Declined => StepRequest::Reflect,
        }
    }

    /// Records that the reader declined the welcome offer. Only valid at
    /// `welcome`; returns `false` and leaves the stage alone otherwise.
    pub fn decline(&mut self) -> bool {
        if self.state.stage != Stage::Welcome {
            return false;
        }
        self.state.stage = Stage::Declined;
        true
    }

    /// Switches to building the outline by hand, starting from the central idea.
    pub fn begin_manual(&mut self) {
        self.state.stage = Stage::Central;
    }

    /// Marks the outline as finished, e.g. after a one-shot generation.
    pub fn finish(&mut self) {
        self.state.stage = Stage::Refinement;
    }

    /// Resets to a fresh welcome with an empty outline.
    pub fn reset(&mut self) {
        let version = self.state.version;
        self.state = ConversationState::new(self.state.book_id, Stage::Welcome);
        self.state.version = version;
    }

    /// Folds the model's reply for the current stage into the outline and
    /// advances.
    ///
    /// Free text at `welcome` is taken as the central idea. Replies with
    /// nothing usable leave the stage unchanged and repeat the question.
    pub fn apply_reply(&mut self, reply: &str) -> StepOutcome {
        if self.state.stage == Stage::Welcome {
            self.begin_manual();
        }
        let folded_at = self.state.stage;

        let (advanced, follow_up) = match folded_at {
            Stage::Central => self.fold_central(reply),
            Stage::Branches => self.fold_branches(reply),
            Stage::Subbranches => self.fold_sub_branches(reply),
            _ => (false, REFINEMENT_FOLLOW_UP.to_string()),
        };

        StepOutcome {
            folded_at,
            advanced,
            follow_up,
            markdown: self.markdown(),
        }
    }

    fn fold_central(&mut self, reply: &str) -> (bool, String) {
        let idea = reply.trim();
        if idea.is_empty() {
            return (false, "What's the central idea or core thesis of this book?".to_string());
        }
        self.state.tree.set_central_idea(idea);
        self.state.stage = Stage::Branches;
        (true, CENTRAL_FOLLOW_UP.to_string())
    }

    fn fold_branches(&mut self, reply: &str) -> (bool, String) {
        let branches = parse_items(reply);
        let Some(first) = branches.first().cloned() else {
            return (false, CENTRAL_FOLLOW_UP.to_string());
        };
        self.state.tree.set_branches(branches);
        self.state.branch_cursor = 0;
        self.state.stage = Stage::Subbranches;
        (true, sub_branch_question(&first, true))
    }

    fn fold_sub_branches(&mut self, reply: &str) -> (bool, String) {
        let cursor = self.state.branch_cursor;
        let Some(branch) = self.state.tree.branches.get(cursor).cloned() else {
            self.state.stage = Stage::Refinement;
            return (false, COMPLETE_FOLLOW_UP.to_string());
        };

        let subs = parse_items(reply);
        if subs.is_empty() {
            return (false, sub_branch_question(&branch, cursor == 0));
        }
        self.state.tree.set_sub_branches(cursor, subs);
        self.state.branch_cursor = cursor + 1;

        match self.state.tree.branches.get(cursor + 1) {
            Some(next) => (true, sub_branch_question(next, false)),
            None => {
                self.state.stage = Stage::Refinement;
                (true, COMPLETE_FOLLOW_UP.to_string())
            }
        }
    }
}

/// Picks the starting stage for a book with no saved conversation state.
///
/// Books that already have messages predate the persisted state and resume
/// in refinement, since their outline progress cannot be recovered.
pub fn initial_stage(has_messages: bool) -> Stage {
    if has_messages {
        Stage::Refinement
    } else {
        Stage::Welcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn machine(stage: Stage) -> StageMachine {
        StageMachine::new(ConversationState::new(Uuid::new_v4(), stage))
    }

    #[test]
    fn central_reply_becomes_root_heading() {
        let mut m = machine(Stage::Central);
        let outcome = m.apply_reply("Tiny changes, remarkable results");
        assert!(outcome.advanced);
        assert_eq!(outcome.folded_at, Stage::Central);
        assert_eq!(outcome.follow_up, CENTRAL_FOLLOW_UP);
        assert_eq!(outcome.markdown.lines().next(), Some("# Tiny changes, remarkable results"));
        assert_eq!(m.stage(), Stage::Branches);
    }

    #[test]
    fn branches_reply_adds_ordered_bullets() {
        let mut m = machine(Stage::Central);
        m.apply_reply("Habits compound");
        let outcome = m.apply_reply("A, B, C");

        let bullets: Vec<&str> = outcome.markdown.lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(bullets, vec!["- A", "- B", "- C"]);
        assert_eq!(outcome.markdown.matches("# Habits compound").count(), 1);
        assert_eq!(m.stage(), Stage::Subbranches);
        assert!(outcome.follow_up.contains("\"A\""));
    }

    #[test]
    fn sub_branches_walk_every_branch_then_finish() {
        let mut m = machine(Stage::Central);
        m.apply_reply("Habits compound");
        m.apply_reply("[\"Identity\", \"Systems\"]");

        let first = m.apply_reply("Beliefs, Votes");
        assert_eq!(m.stage(), Stage::Subbranches);
        assert!(first.follow_up.contains("\"Systems\""));

        let second = m.apply_reply("Habit stacking, Two-minute rule");
        assert_eq!(m.stage(), Stage::Refinement);
        assert_eq!(second.follow_up, COMPLETE_FOLLOW_UP);
        assert_eq!(
            second.markdown,
            "# Habits compound\n- Identity\n  - Beliefs\n  - Votes\n- Systems\n  - Habit stacking\n  - Two-minute rule"
        );
    }

    #[test]
    fn repeated_branch_names_keep_separate_sub_branches() {
        let mut m = machine(Stage::Central);
        m.apply_reply("Core");
        m.apply_reply("Habits, Habits");
        m.apply_reply("a1, a2");
        let outcome = m.apply_reply("b1");
        assert_eq!(m.stage(), Stage::Refinement);
        assert_eq!(outcome.markdown, "# Core\n- Habits\n  - a1\n  - a2\n- Habits\n  - b1");
    }

    #[test]
    fn decline_only_applies_at_welcome() {
        let mut m = machine(Stage::Welcome);
        assert!(m.decline());
        assert_eq!(m.stage(), Stage::Declined);

        for stage in [Stage::Central, Stage::Branches, Stage::Subbranches, Stage::Refinement, Stage::Declined] {
            let mut m = machine(stage);
            assert!(!m.decline());
            assert_eq!(m.stage(), stage);
        }
    }

    #[test]
    fn empty_reply_does_not_advance() {
        let mut m = machine(Stage::Branches);
        let outcome = m.apply_reply("  ,  ");
        assert!(!outcome.advanced);
        assert_eq!(m.stage(), Stage::Branches);
    }

    #[test]
    fn welcome_free_text_starts_manual_building() {
        let mut m = machine(Stage::Welcome);
        let outcome = m.apply_reply("Attention is a resource");
        assert_eq!(outcome.folded_at, Stage::Central);
        assert_eq!(m.stage(), Stage::Branches);
    }

    #[test]
    fn refinement_and_declined_do_not_advance() {
        for stage in [Stage::Refinement, Stage::Declined] {
            let mut m = machine(stage);
            assert_eq!(m.next_request(), StepRequest::Reflect);
            let outcome = m.apply_reply("What about chapter 4?");
            assert!(!outcome.advanced);
            assert_eq!(outcome.follow_up, REFINEMENT_FOLLOW_UP);
            assert_eq!(m.stage(), stage);
        }
    }

    #[test]
    fn next_request_tracks_the_cursor() {
        let mut m = machine(Stage::Central);
        m.apply_reply("Core");
        m.apply_reply("X, Y");
        assert_eq!(
            m.next_request(),
            StepRequest::SubBranches {
                central_idea: "Core".into(),
                branch: "X".into()
            }
        );
        m.apply_reply("x1");
        assert_eq!(
            m.next_request(),
            StepRequest::SubBranches {
                central_idea: "Core".into(),
                branch: "Y".into()
            }
        );
    }

    #[test]
    fn reset_clears_outline_but_keeps_version() {
        let mut state = ConversationState::new(Uuid::new_v4(), Stage::Refinement);
        state.version = 7;
        state.tree.set_central_idea("Old");
        let mut m = StageMachine::new(state);
        m.reset();
        assert_eq!(m.stage(), Stage::Welcome);
        assert!(m.state().tree.is_empty());
        assert_eq!(m.state().version, 7);
    }

    #[test]
    fn generation_messages_name_the_lenses() {
        assert_eq!(
            generating_message("Dune", &["creative", "practical"]),
            "🎯 Perfect! I'm generating your personalized mind map for \"Dune\" with creative, practical perspectives. This may take a few moments..."
        );
        assert!(generated_message(&["creative", "practical"]).contains("creative and practical perspectives"));
        assert!(generated_message(&["creative"]).contains("creative perspective you"));
        assert!(generation_failed_message("Dune", true)
            .ends_with("What's the main theme or central idea of \"Dune\"?"));
    }

    #[test]
    fn stage_round_trips_through_str() {
        for stage in [
            Stage::Welcome,
            Stage::Central,
            Stage::Branches,
            Stage::Subbranches,
            Stage::Refinement,
            Stage::Declined,
        ] {
            assert_eq!(stage.as_str().parse::<Stage>(), Ok(stage));
        }
        assert_eq!(initial_stage(false), Stage::Welcome);
        assert_eq!(initial_stage(true), Stage::Refinement);
    }
}
