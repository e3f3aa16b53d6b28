//! Codegen for `#[derive(TrackedItem)]`, grounded on
//! `icydb-derive::field_values`'s struct-field-iteration approach: walk
//! the named fields once, building one match arm per field rather than
//! scanning attributes reflectively at runtime (spec §4.1: "The proxy
//! consults this metadata at type-registration time, not per call").

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident};

const ENVELOPE_FIELD: &str = "envelope";

pub fn derive(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match named_fields(&input) {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error(),
    };

    if !fields.iter().any(|f| field_name(f) == ENVELOPE_FIELD) {
        return Error::new_spanned(
            &input.ident,
            "TrackedItem requires a field named `envelope: itemstore_core::model::Envelope`",
        )
        .to_compile_error();
    }

    let tracked: Vec<&syn::Field> = fields.iter().filter(|f| has_attr(f, "tracked")).collect();
    let queryable_only: Vec<&syn::Field> =
        fields.iter().filter(|f| has_attr(f, "queryable")).collect();

    let tracked_names: Vec<String> = tracked.iter().map(|f| field_name(f)).collect();
    let mut queryable_names: Vec<String> = tracked_names.clone();
    for f in &queryable_only {
        let name = field_name(f);
        if !queryable_names.contains(&name) {
            queryable_names.push(name);
        }
    }
    for implicit in ["typeName", "updatedDate", "isDeleted"] {
        queryable_names.push(implicit.to_string());
    }

    let tracked_value_arms = tracked.iter().map(|f| {
        let ident = f.ident.as_ref().expect("named field");
        let name = ident.to_string();
        quote! {
            #name => ::serde_json::to_value(&self.#ident).ok(),
        }
    });

    quote! {
        impl #impl_generics ::itemstore_core::proxy::Item for #ident #ty_generics #where_clause {
            const TRACKED_FIELDS: &'static [&'static str] = &[#(#tracked_names),*];
            const QUERYABLE_FIELDS: &'static [&'static str] = &[#(#queryable_names),*];

            fn envelope(&self) -> &::itemstore_core::model::Envelope {
                &self.envelope
            }

            fn envelope_mut(&mut self) -> &mut ::itemstore_core::model::Envelope {
                &mut self.envelope
            }

            fn tracked_value(&self, field: &str) -> Option<::serde_json::Value> {
                match field {
                    #(#tracked_value_arms)*
                    _ => None,
                }
            }
        }
    }
}

fn named_fields(input: &DeriveInput) -> syn::Result<&syn::punctuated::Punctuated<syn::Field, syn::token::Comma>> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "TrackedItem can only be derived for structs with named fields",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            &data.fields,
            "TrackedItem can only be derived for structs with named fields",
        ));
    };
    Ok(&named.named)
}

fn field_name(field: &syn::Field) -> String {
    field.ident.as_ref().map(Ident::to_string).unwrap_or_default()
}

fn has_attr(field: &syn::Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}
