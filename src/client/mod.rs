//! HTTP client side of the session protocol.

mod gateway;
mod single_flight;
mod transport;

pub use gateway::{DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, Gateway, LoggingNavigator, Navigator};
pub use single_flight::{LeaderGuard, RefreshCoordinator, RefreshOutcome, Ticket, wait_for};
pub use transport::{ApiRequest, ApiResponse, ClientError, HttpTransport, Transport};
