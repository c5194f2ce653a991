pub mod columns;
pub mod error;
pub mod gateway;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;

pub use error::{ApiError, ServerError};
pub use gateway::Gateway;
pub use request::{RequestDescriptor, Verb};
pub use response::ApiData;
pub use session::{Credentials, LoginInfo};
pub use transport::{HttpTransport, Transport};

/// A backend resource category. Each module has its own URL path segment;
/// the first seven also have their own column namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Mail,
    Contacts,
    Calendar,
    Tasks,
    Folders,
    User,
    Account,
    /// Authentication endpoint (login/autologin). Not column-mapped.
    Login,
    /// Batch envelope carrying several logical requests in one call.
    Multiple,
}

impl Module {
    /// The path segment used in request URLs and batch envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Mail => "mail",
            Module::Contacts => "contacts",
            Module::Calendar => "calendar",
            Module::Tasks => "tasks",
            Module::Folders => "folders",
            Module::User => "user",
            Module::Account => "account",
            Module::Login => "login",
            Module::Multiple => "multiple",
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
