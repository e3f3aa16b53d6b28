mod tracked_item;

use proc_macro::TokenStream;

/// Generates an `itemstore_core::proxy::Item` implementation from a
/// struct with an `envelope: itemstore_core::model::Envelope` field and
/// `#[tracked]`/`#[queryable]` field attributes.
#[proc_macro_derive(TrackedItem, attributes(tracked, queryable))]
pub fn derive_tracked_item(input: TokenStream) -> TokenStream {
    tracked_item::derive(input.into()).into()
}
