//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around the given inner type with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `get()`
/// - `Display` and `FromStr` delegating to the inner type
/// - `From` conversions in both directions
///
/// # Example
///
/// ```rust
/// # use star_admin_core::define_id;
/// define_id!(CategoryId, i64);
/// define_id!(VendorId, i64);
///
/// let category_id = CategoryId::new(1);
/// let vendor_id = VendorId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: CategoryId = vendor_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $inner:ty) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Create a new ID from its raw value.
            #[must_use]
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            /// Get the underlying raw value.
            #[must_use]
            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = <$inner as ::core::str::FromStr>::Err;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<$inner>().map(Self)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Product and message rows use bigint identity columns; auth users are UUIDs.
define_id!(ProductId, i64);
define_id!(MessageId, i64);
define_id!(UserId, uuid::Uuid);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse_and_display() {
        let id: UserId = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000001");
    }

    #[test]
    fn test_user_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_product_id_parse_trims_whitespace() {
        let id: ProductId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&MessageId::new(7)).unwrap();
        assert_eq!(json, "7");

        let id: UserId =
            serde_json::from_str("\"5f0c7a2e-8a51-4d0b-9d8e-3c2a1b0f9e11\"").unwrap();
        assert_eq!(id.to_string(), "5f0c7a2e-8a51-4d0b-9d8e-3c2a1b0f9e11");
    }
}
