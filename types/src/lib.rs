pub mod answer_key;
pub mod conversation;
pub mod game_type;
pub mod ids;
pub mod invite;
pub mod player;
pub mod question;
pub mod role;
pub mod session;

pub use answer_key::AnswerKey;
pub use conversation::{
    ConversationThread, EntryKind, ThreadEntry, TodChoice, TodKind, TodMode, TodQuestion,
    TodReaction, TodResponse, SKIP_SENTINEL,
};
pub use game_type::GameType;
pub use ids::{CoupleId, PlayerId, SessionId};
pub use invite::PendingGameInvite;
pub use player::Strategy;
pub use question::{Question, QuestionCatalog, QuestionDeck, TodPrompts};
pub use role::{quiz_role, turn_owner, QuizRole, Role};
pub use session::{AnswerPayload, AnswerSlot, GameSession, PlayerEntry, SessionStatus};
