//! Declarative typed models over attribute trees.
//!
//! `tree_model!` declares a struct whose fields are tri-state values and
//! implements [`TreeModel`](super::TreeModel) for it. Field names are the
//! attribute names. Each field is one of:
//! - `value T`: a leaf of any [`Attr`](super::Attr) type
//! - `object M`: a single nested object
//! - `object_set M`: a set of nested objects
//!
//! A field declared as `field as "name": ...` maps to the attribute `name`.

macro_rules! tree_model {
    (@ty value $ty:ty) => { $crate::framework::Value<$ty> };
    (@ty object $ty:ty) => { $crate::framework::Value<$ty> };
    (@ty object_set $ty:ty) => { $crate::framework::Value<Vec<$ty>> };

    (@attr_type value $ty:ty) => {
        <$ty as $crate::framework::Attr>::attr_type()
    };
    (@attr_type object $ty:ty) => {
        <$ty as $crate::framework::TreeModel>::object_type()
    };
    (@attr_type object_set $ty:ty) => {
        $crate::framework::AttrType::set(<$ty as $crate::framework::TreeModel>::object_type())
    };

    (@get value $ty:ty, $tree:ident, $path:ident, $name:expr, $diags:ident) => {
        $tree.get_value::<$ty>($path, $name, $diags)
    };
    (@get object $ty:ty, $tree:ident, $path:ident, $name:expr, $diags:ident) => {
        $tree.get_object::<$ty>($path, $name, $diags)
    };
    (@get object_set $ty:ty, $tree:ident, $path:ident, $name:expr, $diags:ident) => {
        $tree.get_object_set::<$ty>($path, $name, $diags)
    };

    (@name $field:ident) => { stringify!($field) };
    (@name $field:ident $attr:literal) => { $attr };

    (@set value, $tree:ident, $name:expr, $value:expr) => {
        $tree.set_value($name, $value.clone())
    };
    (@set object, $tree:ident, $name:expr, $value:expr) => {
        $tree.set_object($name, &$value)
    };
    (@set object_set, $tree:ident, $name:expr, $value:expr) => {
        $tree.set_object_set($name, &$value)
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident $(as $attr:literal)? : $kind:ident $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $crate::framework::tree_model!(@ty $kind $ty),
            )*
        }

        impl $crate::framework::TreeModel for $name {
            fn attr_types() -> ::std::collections::BTreeMap<String, $crate::framework::AttrType> {
                let mut types = ::std::collections::BTreeMap::new();
                $(
                    types.insert(
                        $crate::framework::tree_model!(@name $field $($attr)?).to_string(),
                        $crate::framework::tree_model!(@attr_type $kind $ty),
                    );
                )*
                types
            }

            fn from_tree(
                tree: &$crate::framework::Tree,
                path: &$crate::framework::AttributePath,
                diags: &mut $crate::framework::Diagnostics,
            ) -> Self {
                Self {
                    $(
                        $field: $crate::framework::tree_model!(
                            @get $kind $ty, tree, path, $crate::framework::tree_model!(@name $field $($attr)?), diags
                        ),
                    )*
                }
            }

            fn to_tree(&self) -> $crate::framework::Tree {
                let mut tree = $crate::framework::Tree::new();
                $(
                    $crate::framework::tree_model!(
                        @set $kind, tree, $crate::framework::tree_model!(@name $field $($attr)?), self.$field
                    );
                )*
                tree
            }
        }
    };
}

pub(crate) use tree_model;
