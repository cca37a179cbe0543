//! `#[derive(Error)]` expansion.
//!
//! ```ignore
//! use stackvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum FaultKind {
//!     #[error("stack underflow at ip {ip}")]
//!     Underflow { ip: usize },
//!
//!     #[error("decode failed: {0}")]
//!     Decode(String),
//!
//!     #[error("already run")]
//!     AlreadyRun,
//! }
//! ```
//!
//! Messages are ordinary `format!` strings. Tuple fields are referenced as
//! `{0}`, `{1}`, ...; named fields by name. Format specs such as `{ip:#06x}`
//! and `{0:?}` pass through untouched.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message_from_attrs(&variant.attrs, ident)?;
                    Ok(match_arm(quote!(Self::#ident), &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message_from_attrs(&input.attrs, name)?;
            let arm = match_arm(quote!(Self), &data.fields, &message);
            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "#[derive(Error)] is only supported on enums and structs",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds one `pattern => write!(...)` arm binding every field by name.
fn match_arm(path: TokenStream2, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            #path => f.write_fmt(format_args!(#message)),
        },
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            quote! {
                #path { #(#idents),* } => write!(f, #message, #(#idents = #idents),*),
            }
        }
        Fields::Unnamed(unnamed) => {
            let count = unnamed.unnamed.len();
            let bindings: Vec<_> = (0..count).map(|i| format_ident!("f{}", i)).collect();
            let message = rename_positional(message, count);
            quote! {
                #path(#(#bindings),*) => write!(f, #message, #(#bindings = #bindings),*),
            }
        }
    }
}

/// Reads the string literal out of `#[error("...")]`.
fn message_from_attrs<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<String> {
    let attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                target,
                "missing #[error(\"...\")] attribute; every variant needs a display message",
            )
        })?;

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] takes a single string literal, e.g. #[error(\"stack underflow at ip {ip}\")]",
        )),
    }
}

/// Rewrites `{0}` / `{0:?}` into `{f0}` / `{f0:?}` so tuple fields can be
/// passed as named format arguments.
fn rename_positional(message: &str, count: usize) -> String {
    let mut out = String::with_capacity(message.len() + count * 2);
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        out.push(c);
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            out.push('{');
            chars.next();
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            continue;
        }
        let index_in_range = digits.parse::<usize>().is_ok_and(|i| i < count);
        if index_in_range && matches!(chars.peek(), Some('}') | Some(':')) {
            out.push('f');
        }
        out.push_str(&digits);
    }

    out
}
