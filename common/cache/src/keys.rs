//! Physical key derivation.
//!
//! Every cache slot is addressed by
//! `schema_version + ":" + namespace.prefix + logical_key`. The schema
//! version is injected at store construction and orphans every previously
//! written key when bumped (old entries age out through their own TTLs); the
//! namespace prefix partitions the keyspace per entity family so bulk
//! invalidation and uniform expiry can be scoped to one family.

/// A named `(ttl, prefix)` pair grouping related keys.
///
/// Immutable and `Copy`; callers pass it by value into every operation.
/// Prefixes must be unique across namespaces; that invariant is owned by
/// whoever defines the namespace set (it is a convention, not something the
/// key builder checks). `ttl_seconds` must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub ttl_seconds: u64,
    pub prefix: &'static str,
}

impl Namespace {
    pub const fn new(ttl_seconds: u64, prefix: &'static str) -> Self {
        Namespace {
            ttl_seconds,
            prefix,
        }
    }

    /// Fallback namespace for keys outside any named entity family.
    pub const DEFAULT: Namespace = Namespace::new(86_400, "storefront:");
    pub const PRODUCT: Namespace = Namespace::new(86_400, "storefront:product:");
    pub const SEARCH: Namespace = Namespace::new(14_400, "storefront:search:");
    pub const USER: Namespace = Namespace::new(14_400, "storefront:user:");
    pub const SESSION: Namespace = Namespace::new(14_400, "storefront:session:");
    pub const RATE_LIMIT: Namespace = Namespace::new(60, "storefront:ratelimit:");
}

/// Derive the physical key for a logical key. Pure, no I/O.
pub fn physical_key(schema_version: &str, namespace: Namespace, logical_key: &str) -> String {
    format!("{schema_version}:{}{logical_key}", namespace.prefix)
}

/// Derive the physical form of a key pattern. Wildcards in `logical_pattern`
/// use the backend's native syntax and pass through uninterpreted; this is
/// pure concatenation, exactly like [`physical_key`].
pub fn physical_pattern(
    schema_version: &str,
    namespace: Namespace,
    logical_pattern: &str,
) -> String {
    physical_key(schema_version, namespace, logical_pattern)
}
