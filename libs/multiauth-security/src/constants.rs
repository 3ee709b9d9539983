//! Well-known values shared by collectors and hosts.

/// Username of the fallback identity.
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Origin recorded on the fallback identity.
pub const STATIC_ORIGIN: &str = "StaticUser-anonymous";
