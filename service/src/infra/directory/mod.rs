//! [`Professional`] directory integration.

use std::sync::Arc;

use common::operations::{By, Select};
use dashmap::DashMap;
use derive_more::{Display, Error as StdError};
use tracerr::Traced;

use crate::domain::{professional, Professional};

/// [`Professional`] directory operation.
///
/// The directory is the boundary to the upstream account system: the session
/// engine only ever asks it who a [`Professional`] is and what they charge.
pub use common::Handler as Directory;

/// In-memory [`Directory`] of bookable [`Professional`]s.
///
/// Cheap to [`Clone`]: every clone shares the same underlying roster.
#[derive(Clone, Debug, Default)]
pub struct Roster(Arc<DashMap<professional::Id, Professional>>);

impl Roster {
    /// Creates a new [`Roster`] of the provided [`Professional`]s.
    #[must_use]
    pub fn new(professionals: impl IntoIterator<Item = Professional>) -> Self {
        let roster = Self::default();
        for professional in professionals {
            roster.insert(professional);
        }
        roster
    }

    /// Adds the provided [`Professional`] to this [`Roster`], replacing the
    /// previous entry under the same ID.
    pub fn insert(&self, professional: Professional) {
        _ = self.0.insert(professional.id, professional);
    }
}

impl Directory<Select<By<Option<Professional>, professional::Id>>>
    for Roster
{
    type Ok = Option<Professional>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Professional>, professional::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.get(&by.into_inner()).map(|p| p.value().clone()))
    }
}

/// [`Directory`] error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {}
