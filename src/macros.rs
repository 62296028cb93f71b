// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Declares a static enumeration whose variants map to fixed numeric ids.
///
/// Static data is persisted by id, so every id read back from a backing store goes
/// through `from_id`, which rejects unknown ids with
/// [`Error::InvalidStaticId`](crate::Error::InvalidStaticId).
///
/// The generated enum derives `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`,
/// `PartialOrd`, `Ord` and `Hash`, implements `Display` via its description, and
/// provides `ALL`, `to_id`, `from_id` and `name`.
///
/// ```rust
/// verdata::static_data! {
///     /// How often something happens.
///     pub enum Frequency: "frequency" {
///         Weekly = 1 => "Weekly",
///         Monthly = 2 => "Monthly",
///     }
/// }
///
/// assert_eq!(Frequency::from_id(2).unwrap(), Frequency::Monthly);
/// assert_eq!(Frequency::Weekly.to_id(), 1);
/// assert!(Frequency::from_id(7).is_err());
/// assert_eq!(Frequency::Monthly.to_string(), "Monthly");
/// ```
#[macro_export]
macro_rules! static_data {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $id:literal => $desc:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The persisted id of this variant.
            pub const fn to_id(self) -> i32 {
                match self {
                    $($name::$variant => $id),+
                }
            }

            /// Looks a variant up by its persisted id.
            pub fn from_id(id: i32) -> $crate::Result<Self> {
                match id {
                    $($id => Ok($name::$variant),)+
                    _ => Err($crate::Error::InvalidStaticId {
                        kind: $label,
                        id: i64::from(id),
                    }),
                }
            }

            /// Human-readable description.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $desc),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    crate::static_data! {
        enum Colour: "colour" {
            Red = 3 => "red",
            Green = 5 => "green",
        }
    }

    #[test]
    fn id_table() {
        for colour in Colour::ALL {
            assert_eq!(Colour::from_id(colour.to_id()).unwrap(), *colour);
        }
        assert_eq!(Colour::Green.name(), "green");
    }

    #[test]
    fn unknown_id_is_data_error() {
        let err = Colour::from_id(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert_eq!(err.to_string(), "invalid colour id 4");
    }
}
