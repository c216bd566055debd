mod credentials;
mod reissue;
mod store;

pub use credentials::{Credentials, TokenKind};
pub use reissue::{
    DEFAULT_REFRESH_HEADER, DEFAULT_REISSUE_PATH, ReissueConfig, SessionState, TokenReissuer,
};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
