//! # DOM drivers
//!
//! - `traits`: the [`DomDriver`] seam, node references and locators
//! - `scripts`: page scripts used by the CDP driver
//! - `cdp`: driver over a live CDP connection
//! - `mock`: in-memory document for tests

pub mod traits;
pub mod scripts;
pub mod cdp;
pub mod mock;

pub use traits::{css_quote, DomDriver, Locator, NodeRef};
pub use cdp::CdpDomDriver;
pub use mock::{El, MockDom};
