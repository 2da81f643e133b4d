//! Domain definitions.

pub mod client;
pub mod identity;
pub mod message;
pub mod payment;
pub mod professional;
pub mod review;
pub mod session;

pub use self::{
    identity::{Identity, Role},
    message::Message,
    professional::Professional,
    review::Review,
    session::Session,
};
