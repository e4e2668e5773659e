use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Path, parse_macro_input};

pub fn derive_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let supertypes = match parse_supertypes(&input) {
        Ok(paths) => paths,
        Err(e) => return e.to_compile_error().into(),
    };

    let cancel_field = match find_cancel_field(&input) {
        Ok(field) => field,
        Err(e) => return e.to_compile_error().into(),
    };

    let supertypes_impl = if supertypes.is_empty() {
        quote! {}
    } else {
        let static_ident = syn::Ident::new(
            &format!("__{}_SUPERTYPES", name.to_string().to_uppercase()),
            Span::call_site(),
        );
        let count = supertypes.len();
        quote! {
            fn supertypes() -> &'static [::std::any::TypeId] {
                static #static_ident: ::std::sync::OnceLock<[::std::any::TypeId; #count]> =
                    ::std::sync::OnceLock::new();
                #static_ident.get_or_init(|| [
                    #(::std::any::TypeId::of::<#supertypes>()),*
                ])
            }
        }
    };

    let cancel_impl = if let Some(field) = cancel_field {
        quote! {
            fn as_cancellable_mut(&mut self) -> ::std::option::Option<&mut dyn ::shardbus_core::CancellableMut> {
                ::std::option::Option::Some(&mut self.#field)
            }
            fn as_cancellable(&self) -> ::std::option::Option<&dyn ::shardbus_core::CancellableRef> {
                ::std::option::Option::Some(&self.#field)
            }
        }
    } else {
        quote! {}
    };

    let expanded = quote! {
        impl #impl_generics ::shardbus_core::EventKind for #name #ty_generics #where_clause {
            #supertypes_impl
            #cancel_impl

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };

    TokenStream::from(expanded)
}

/// Collects every `#[event(supertype = "...")]` on the item, in
/// declaration order (nearest ancestor first, matching
/// `EventKind::supertypes`'s documented ordering).
fn parse_supertypes(input: &DeriveInput) -> syn::Result<Vec<Path>> {
    let mut out = Vec::new();
    for attr in &input.attrs {
        if !attr.path().is_ident("event") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("supertype") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                out.push(lit.parse::<Path>()?);
                Ok(())
            } else if meta.path.is_ident("cancellable") {
                // handled by find_cancel_field
                Ok(())
            } else {
                Err(meta.error("unknown `event` attribute; expected `supertype` or `cancellable`"))
            }
        })?;
    }
    Ok(out)
}

/// Whether the item carries `#[event(cancellable)]`, and if so, which
/// field backs the cancellation capability: the one tagged
/// `#[event(cancel)]`, or failing that, a field literally named `cancel`.
fn find_cancel_field(input: &DeriveInput) -> syn::Result<Option<syn::Ident>> {
    let mut wants_cancellable = false;
    for attr in &input.attrs {
        if !attr.path().is_ident("event") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("cancellable") {
                wants_cancellable = true;
            }
            // `supertype = "..."` requires a value; consume it here too so
            // this second pass over the same attributes doesn't error.
            if meta.path.is_ident("supertype") {
                let _ = meta.value()?.parse::<LitStr>()?;
            }
            Ok(())
        })?;
    }

    if !wants_cancellable {
        return Ok(None);
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "`#[event(cancellable)]` is only supported on structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "`#[event(cancellable)]` requires named fields (a `cancel: Cancellation` field)",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if attr.path().is_ident("event") {
                let mut tagged = false;
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("cancel") {
                        tagged = true;
                    }
                    Ok(())
                })?;
                if tagged {
                    return Ok(field.ident.clone());
                }
            }
        }
    }

    for field in &fields.named {
        if field.ident.as_ref().is_some_and(|id| id == "cancel") {
            return Ok(field.ident.clone());
        }
    }

    Err(syn::Error::new_spanned(
        input,
        "`#[event(cancellable)]` requires a `cancel: Cancellation` field (or a field tagged `#[event(cancel)]`)",
    ))
}
