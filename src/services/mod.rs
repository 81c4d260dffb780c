pub mod auth;
pub mod cache;
pub mod error;
pub mod guard;
pub mod jwt;
pub mod mailer;
pub mod store;

pub use auth::AuthService;
pub use cache::{MemoryCache, RedisCache, VolatileStore};
pub use error::ServiceError;
pub use guard::LoginGuard;
pub use jwt::{Claims, TokenKind, TokenService};
pub use mailer::{LogMailer, MailKind, Mailer, RecordingMailer};
pub use store::{MemoryStore, NewUser, PgStore, UserStore};
