pub mod auth;
pub mod directory;
pub mod error;
pub mod gating;
pub mod jwt;
pub mod keys;
pub mod mirror;
pub mod oidc;
pub mod rbac;
pub mod resolver;

pub use auth::AccountService;
pub use directory::{InMemoryDirectory, PrincipalStore};
pub use error::{
    AuthenticationError, AuthorizationError, ConflictError, IdentityError, UpstreamError,
};
pub use gating::{AgentGate, GateError};
pub use jwt::JwtService;
pub use keys::KeyMaterialCache;
pub use mirror::MirrorSync;
pub use oidc::OidcClient;
pub use rbac::{RbacEngine, RbacError};
pub use resolver::PrincipalResolver;
