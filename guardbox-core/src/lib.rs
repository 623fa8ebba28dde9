//! Core types and contracts for the guardbox authentication ecosystem
//!
//! This crate defines the data model (users, linked accounts, sessions,
//! one-time tokens), the error taxonomy, and the capability contracts that
//! storage backends and cookie transports implement. It performs no I/O of
//! its own: the facade in the `guardbox` crate composes these contracts into
//! the actual authentication engine.
//!
//! See [`User`] and [`Account`] for identity types, [`Session`] for the
//! sliding-window session record, [`Otp`] for one-time tokens, and the
//! [`adapter`] module for the storage contracts backends implement.

pub mod adapter;
pub mod cookie;
pub mod error;
pub mod id;
pub mod otp;
pub mod session;
pub mod user;

pub use adapter::{OnUserCreate, OtpAdapter, SessionAdapter, UserAdapter};
pub use cookie::{CookieJar, CookieOptions, SameSite};
pub use error::Error;
pub use otp::{Otp, OtpCreate, OtpId};
pub use session::{Session, SessionDuration, SessionId};
pub use user::{Account, NewAccount, User, UserCreate, UserId, UserUpdate};
