//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity activation.
#[derive(Clone, Copy, Debug)]
pub struct Activation;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing a deadline imposed on an entity.
#[derive(Clone, Copy, Debug)]
pub struct Deadline;

/// Marker type describing an entity termination.
#[derive(Clone, Copy, Debug)]
pub struct Termination;
