//! # Built-in Keywords
//!
//! | Module | Keywords |
//! |---|---|
//! | [`standard`] | `type`, `const`, `enum`, `required` |
//! | [`reference`] | `$ref`, `$defs`, `definitions`, `$id`, `$anchor` |
//! | [`applicator`] | `allOf`, `anyOf`, `oneOf`, `not`, `properties`, `items` |
//! | [`annotation`] | `$schema`, `$comment`, `title`, `description`, `default`, `examples`, and any unknown key |

pub mod annotation;
pub mod applicator;
pub mod reference;
pub mod standard;

use crate::keyword::KeywordCatalog;

/// Install every built-in keyword into `catalog`.
pub fn register_standard(catalog: &mut KeywordCatalog) {
    catalog
        .register("type", standard::Type::construct)
        .register("const", standard::Const::construct)
        .register("enum", standard::Enum::construct)
        .register("required", standard::Required::construct)
        .register("$ref", reference::Ref::construct)
        .register("$defs", reference::Defs::construct)
        .register("definitions", reference::Defs::construct)
        .register("$id", reference::Identifier::construct)
        .register("$anchor", reference::Identifier::construct)
        .register("allOf", applicator::AllOf::construct)
        .register("anyOf", applicator::AnyOf::construct)
        .register("oneOf", applicator::OneOf::construct)
        .register("not", applicator::Not::construct)
        .register("properties", applicator::Properties::construct)
        .register("items", applicator::Items::construct);
    for name in annotation::ANNOTATIONS {
        catalog.register(name, annotation::Annotation::construct);
    }
}
