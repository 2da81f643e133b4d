//! Infrastructure layer.

pub mod directory;
pub mod notify;
pub mod payments;
pub mod storage;

pub use self::{
    directory::{Directory, Roster},
    notify::{Log, Notifier},
    payments::{Gateway, Paystack},
    storage::{Memory, Storage},
};
