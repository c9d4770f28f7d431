//! Cross-repository quest suggestions, optionally enriched with the model a
//! token.place deployment currently serves.

mod repo;
mod suggest;
pub mod token_place;

pub use repo::{RepoInfo, parse_repo};
pub use suggest::{DEFAULT_LIMIT, QuestSuggestion, SECURITY_RATIONALE, suggest};
pub use token_place::{
    ClientIntegration, ModelCatalog, TokenPlaceClient, TokenPlaceError, plan_client_integrations,
    quest_detail,
};
