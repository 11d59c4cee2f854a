use core::future::Future;

use rp_passwordless_client::types::RegisterOptions;

/// Register options about to be sent, open for changes by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizeRegisterOptionsContext {
    /// `true` while registering a brand new user, `false` when adding a credential.
    pub new_user: bool,
    /// Setting this to `None` aborts the registration with `401 Unauthorized`.
    pub options: Option<RegisterOptions>,
}

pub trait CustomizeRegisterOptions: Send + Sync + 'static {
    fn customize(
        &self,
        context: &mut CustomizeRegisterOptionsContext,
    ) -> impl Future<Output = ()> + Send;
}

/// Leaves the options untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCustomizeRegisterOptions;

impl CustomizeRegisterOptions for NoopCustomizeRegisterOptions {
    async fn customize(&self, _context: &mut CustomizeRegisterOptionsContext) {}
}
