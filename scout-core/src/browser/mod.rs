mod automation;
mod error;
mod session;

pub use automation::{ChromiumLauncher, ChromiumSession};
pub use error::{BrowserError, BrowserResult};
pub use session::{Exchange, PageSession, SessionCookie, SessionLauncher};
