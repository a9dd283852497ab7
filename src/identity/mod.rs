//! Identity and role-based authorization.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod mutation;
mod principal;
mod provider;
mod request_context;
mod role;
mod session;
mod trust;

pub use authorizer::{has_role, AuthorizationResult, Authorizer, SessionResolver, NOT_AUTHENTICATED};
pub use mutation::{can_change_role, can_change_role_between, RoleChangeDenied, RoleChangeRequest};
pub use principal::{Attrs, Principal, INTERNAL_SERVICE_ID, ROLE_OVERRIDE_ID};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, SignupRequest};
pub use request_context::{RequestContext, INTERNAL_TOKEN_HEADER, ROLE_OVERRIDE_HEADER, SESSION_COOKIE};
pub use role::{level_of, Role, RoleParseError, UNRECOGNIZED_LEVEL};
pub use session::{DirectoryResolver, Session, SessionManager, SessionToken};
pub use trust::{InternalBypass, RoleOverride, TrustSignal, TrustSignals};
