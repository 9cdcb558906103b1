//! Paced, self-refreshing OAuth 2.0 gateway for rate-limited REST APIs—bearer renewal,
//! admission gaps, and Retry-After aware replays behind a single call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod limiter;
pub mod oauth;
pub mod obs;

mod _prelude {
	pub use std::{
		borrow::Cow,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::{
		AccessToken, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken,
		http::{HeaderMap, Method, StatusCode},
	};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
