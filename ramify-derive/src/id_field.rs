use proc_macro2::TokenStream;
use quote::ToTokens;

/// How the id field is addressed: by name or by tuple position.
pub(crate) enum IdMember {
    Named(syn::Ident),
    Index(syn::Index),
}

impl ToTokens for IdMember {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match self {
            IdMember::Named(ident) => ident.to_tokens(tokens),
            IdMember::Index(index) => index.to_tokens(tokens),
        }
    }
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub id: bool,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                result.id = true;
                Ok(())
            } else {
                Err(meta.error("unsupported message attribute, expected `id`"))
            }
        })?;
    }

    Ok(result)
}

/// Locates the id field.
///
/// A field marked `#[message(id)]` wins; otherwise a field named `id`.
/// Marking more than one field is an error.
pub(crate) fn find_id_member(
    fields: &syn::Fields,
    span: &impl ToTokens,
) -> syn::Result<IdMember> {
    let mut marked = None;
    let mut named_id = None;

    for (i, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs)?;
        let member = match &field.ident {
            Some(ident) => IdMember::Named(ident.clone()),
            None => IdMember::Index(syn::Index::from(i)),
        };

        if attrs.id {
            if marked.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked #[message(id)]",
                ));
            }
            marked = Some(member);
        } else if field.ident.as_ref().is_some_and(|ident| ident == "id") {
            named_id = Some(member);
        }
    }

    marked.or(named_id).ok_or_else(|| {
        syn::Error::new_spanned(
            span,
            "no id field: add a field named `id` or mark one with `#[message(id)]`",
        )
    })
}
