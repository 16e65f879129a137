use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

mod id_field;

use id_field::find_id_member;

/// Attribute macro that derives everything a repository message needs.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Message)]
/// ```
///
/// The serde derives make the type usable in exported snapshots.
///
/// # Example
///
/// ```ignore
/// use ramify_core::message;
///
/// #[message]
/// struct ChatTurn {
///     id: String,
///     text: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn message(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::std::cmp::PartialEq,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::ramify_core::Message
        )]
        #input
    };

    output.into()
}

/// Derive macro for the Message trait.
///
/// The id is read from the field named `id`, or from the field marked
/// `#[message(id)]`. The field may be any type implementing `AsRef<str>`.
/// Enums need an id field in every variant.
///
/// # Example
///
/// ```ignore
/// use ramify_core::Message;
///
/// #[derive(Message)]
/// struct Turn {
///     #[message(id)]
///     turn_id: String,
///     text: String,
/// }
///
/// #[derive(Message)]
/// enum Entry {
///     User { id: String, text: String },
///     Tool(#[message(id)] String, Vec<u8>),
/// }
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_message_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_message_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        syn::Data::Struct(data) => {
            let member = find_id_member(&data.fields, input)?;
            id_expr(quote! { &self.#member })
        }
        syn::Data::Enum(data) => generate_enum_body(data, input)?,
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Message cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::ramify_core::Message for #name #ty_generics #where_clause {
            fn id(&self) -> &str {
                #body
            }
        }
    })
}

fn generate_enum_body(
    data: &syn::DataEnum,
    input: &DeriveInput,
) -> syn::Result<proc_macro2::TokenStream> {
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "Message cannot be derived for empty enums",
        ));
    }

    let arms = data
        .variants
        .iter()
        .map(|variant| {
            let variant_ident = &variant.ident;
            let member = find_id_member(&variant.fields, variant)?;
            let expr = id_expr(quote! { __ramify_id });
            Ok(quote! {
                Self::#variant_ident { #member: __ramify_id, .. } => #expr
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        match self {
            #(#arms),*
        }
    })
}

fn id_expr(field: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
    quote! { ::core::convert::AsRef::<str>::as_ref(#field) }
}
