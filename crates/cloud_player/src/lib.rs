//! Login session against the cloud player API.

pub mod cookie;
pub mod error;
pub mod session;
pub mod transport;

pub use cookie::{CookieStore, FileCookieStore, MemoryCookieStore};
pub use error::SessionError;
pub use session::{AuthSession, AuthState, SessionSettings};
pub use transport::{
    fold_set_cookies, ApiRequest, ApiResponse, HttpMethod, HttpTransport, ReqwestTransport,
    TransportSettings,
};
