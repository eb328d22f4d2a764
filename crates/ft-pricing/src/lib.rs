//! `ft-pricing` — what a destination change costs and when it arrives.
//!
//! | Module    | Contents                                        |
//! |-----------|-------------------------------------------------|
//! | [`quote`] | `quote_address_change`, `FeeQuote`, `KM_TO_MILES` |
//! | [`error`] | `PricingError`, `PricingResult<T>`              |
//!
//! Everything here is a pure function of its inputs.  Persisting a ledger
//! row for an accepted quote is the caller's job.

pub mod error;
pub mod quote;


pub use error::{PricingError, PricingResult};
pub use quote::{FeeQuote, KM_TO_MILES, quote_address_change};
