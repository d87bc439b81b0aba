mod attributes;
mod mapper;

use crate::attributes::MapperAttributes;
use crate::mapper::generate_mapper;
use proc_macro::TokenStream;
use syn::{parse_macro_input, Error, ItemTrait};

/// Generates a mapper from a trait. Every method needs one of the `select`, `select(list)`,
/// `insert`, `update` or `delete` attributes, optionally with an explicit `statement = "..."`.
/// The trait gets implemented for `MapperProxy`, while the mapper definition is registered
/// statically for scanning. Without an explicit `namespace`, the module path of the trait is used.
#[proc_macro_attribute]
pub fn mapper(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args as MapperAttributes);
    let item = parse_macro_input!(input as ItemTrait);

    generate_mapper(item, &args)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
