//! Asynchronous client for the [RCON](https://wiki.vg/RCON) remote console
//! protocol spoken by Minecraft and Source engine game servers.
//!
//! A client owns one TCP connection, authenticates once with [`RconClient::login`]
//! and then runs commands with [`RconClient::execute`], one at a time.
//!
//! # Example
//! ```no_run
//! use mc_rcon::{strip_formatting, RconClient};
//!
//! #[tokio::main]
//! async fn main() -> mc_rcon::Result<()> {
//!     let mut client = RconClient::new("localhost", 25575);
//!     client.open().await?;
//!
//!     let result = client.login("password").await;
//!     if result.is_ok() {
//!         let output = client.execute("list").await?;
//!         println!("{}", strip_formatting(&output).unwrap_or_default());
//!     }
//!
//!     client.close().await?;
//!     result
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]

macro_rules! create_timeout {
    ($name:ident($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        ::paste::paste! {
            #[doc = concat!("Similar to [`", stringify!($name), "`]")]
            /// but with an added argument for timeout.
            ///
            /// Note that timeouts are not precise, and may vary on the order
            /// of milliseconds, because of the way the async event loop works.
            ///
            /// # Errors
            /// Returns `Err` on any condition that
            #[doc = concat!("[`", stringify!($name), "`]")]
            /// does, and [`RconError::Timeout`](crate::RconError::Timeout)
            /// when the whole exchange does not finish within `dur`.
            pub async fn [<$name _with_timeout>](
                $($arg: $ty,)*
                dur: ::std::time::Duration,
            ) -> crate::Result<$ret> {
                ::tokio::time::timeout(dur, $name($($arg),*)).await?
            }
        }
    };
}

mod client;
mod config;
pub mod errors;
pub mod packet;
mod session;
mod text;
mod transport;

pub use client::{run_command, run_command_with_timeout, RconClient, SessionState};
pub use config::RconConfig;
pub use errors::{FramingError, RconError};
pub use session::RconSession;
pub use text::strip_formatting;

/// [`Result`](std::result::Result) alias for [`RconError`].
pub type Result<T> = std::result::Result<T, RconError>;
