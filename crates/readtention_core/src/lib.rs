pub mod domain;
pub mod lens;
pub mod parse;
pub mod ports;
pub mod prompt;
pub mod stage;
pub mod tree;

pub use domain::{Book, ConversationMessage, ConversationState, Insight, MessageKind, MessageRole, MindMap, Note};
pub use lens::{EmphasisTier, Lens, LensError, LensRequest, LensSelection, Preset};
pub use ports::{
    BookDetails, BookSearchService, BookSummary, ChatTurn, CompletionRequest, CoverSet, DatabaseService, IsbnBook,
    PortError, PortResult, TextGenerationService,
};
pub use stage::{Stage, StageMachine, StepOutcome, StepRequest};
pub use tree::MindMapTree;
