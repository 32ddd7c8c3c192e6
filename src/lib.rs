//! Cache-backed OAuth2 token broker and typed HTTP client for the Factus e-invoicing API—
//! coalesced logins, shared bearer tokens, and a provider-aware error taxonomy.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod cache;
pub mod error;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(feature = "reqwest")] pub mod api;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
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
#[cfg(not(feature = "reqwest"))] use serde_path_to_error as _;
#[cfg(test)] use httpmock as _;
