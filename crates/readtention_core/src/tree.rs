//! crates/readtention_core/src/tree.rs
//!
//! Accumulates the central idea, branches and sub-branches gathered during a
//! step-by-step conversation and renders them as a Markmap-style outline.

use serde::{Deserialize, Serialize};

/// The partial mind map built up turn by turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapTree {
    #[serde(default)]
    pub central_idea: String,
    #[serde(default)]
    pub branches: Vec<String>,
    /// Sub-branches by branch position, parallel to `branches`. Branch names
    /// may repeat, so they cannot serve as keys.
    #[serde(default)]
    pub sub_branches: Vec<Vec<String>>,
}

impl MindMapTree {
    pub fn is_empty(&self) -> bool {
        self.central_idea.is_empty() && self.branches.is_empty()
    }

    pub fn set_central_idea(&mut self, idea: &str) {
        self.central_idea = idea.trim().to_string();
    }

    /// Replaces the branch list and clears every sub-branch.
    pub fn set_branches(&mut self, branches: Vec<String>) {
        self.sub_branches = vec![Vec::new(); branches.len()];
        self.branches = branches;
    }

    /// Attaches sub-branches to the branch at `index`, replacing any previous
    /// set. Returns `false` if there is no such branch.
    pub fn set_sub_branches(&mut self, index: usize, subs: Vec<String>) -> bool {
        if index >= self.branches.len() {
            return false;
        }
        if self.sub_branches.len() < self.branches.len() {
            self.sub_branches.resize(self.branches.len(), Vec::new());
        }
        self.sub_branches[index] = subs;
        true
    }

    pub fn sub_branches_at(&self, index: usize) -> &[String] {
        self.sub_branches
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Renders the outline. Only lines derivable from the current state are
    /// emitted; identical state always renders identical text.
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::with_capacity(1 + self.branches.len());
        if !self.central_idea.is_empty() {
            lines.push(format!("# {}", self.central_idea));
        }
        for (index, branch) in self.branches.iter().enumerate() {
            lines.push(format!("- {}", branch));
            for sub in self.sub_branches_at(index) {
                lines.push(format!("  - {}", sub));
            }
        }
        lines.join("\n")
    }

    /// Reads an outline in the shape [`MindMapTree::to_markdown`] writes.
    ///
    /// `# ` is the root, `- ` a branch and `  - ` a sub-branch of the branch
    /// above it. Anything else, including sub-branches with no branch above
    /// them, is skipped.
    pub fn from_markdown(markdown: &str) -> Self {
        let mut tree = Self::default();
        for line in markdown.lines() {
            if let Some(idea) = line.strip_prefix("# ") {
                tree.central_idea = idea.trim().to_string();
            } else if let Some(branch) = line.strip_prefix("- ") {
                tree.branches.push(branch.trim().to_string());
                tree.sub_branches.push(Vec::new());
            } else if let Some(sub) = line.strip_prefix("  - ") {
                if let Some(subs) = tree.sub_branches.last_mut() {
                    subs.push(sub.trim().to_string());
                }
            }
        }
        tree
    }
}
