//! Passwordless.dev integration for axum: register and sign-in endpoints backed by a
//! [`UserStore`], and step-up authorization for sensitive routes.
extern crate alloc;

pub mod clock;
pub mod customize;
pub mod error;
pub mod options;
pub mod principal;
pub mod router;
pub mod service;
pub mod step_up;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use customize::{
    CustomizeRegisterOptions, CustomizeRegisterOptionsContext, NoopCustomizeRegisterOptions,
};
pub use error::IntegrationError;
pub use options::{
    PasswordlessEndpointOptions, PasswordlessIntegrationOptions, RegisterDefaults, StepUpOptions,
};
pub use principal::{Claim, ClaimsPrincipal};
pub use router::passwordless_router;
pub use service::{
    MagicLinkQuery, PasswordlessAddCredentialRequest, PasswordlessLoginRequest,
    PasswordlessService, UserInformation,
};
pub use step_up::{RequireStepUp, StepUpRequest, step_up_guard};
pub use store::memory::{InMemoryUserStore, StoredUser};
pub use store::{PasswordlessRegisterRequest, UserStore, UserStoreError};
pub use {rp_passwordless_client, tower_sessions};
