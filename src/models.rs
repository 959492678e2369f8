mod ids;
mod note;
mod share_token;
mod tag;

pub use ids::{NoteId, ShareTokenId, TagId};
pub use note::{Note, NoteBuilder};
pub use share_token::ShareToken;
pub use tag::Tag;
