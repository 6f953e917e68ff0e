//! Internal proc-macros shared by the Ferrosat crates.
//!
//! Currently this provides `#[derive(DocDefault)]`, which builds a `Default` impl for a struct
//! from `(Default: <expr>)` markers in its fields' doc comments. This keeps the default value next
//! to the documentation that explains it instead of duplicating it in a separate `impl Default`.
extern crate proc_macro;
extern crate proc_macro2;
#[macro_use]
extern crate quote;
extern crate regex;
extern crate syn;
#[macro_use]
extern crate synstructure;

use regex::Regex;
use syn::{Expr, Lit, Meta, MetaNameValue};

decl_derive!([DocDefault] => doc_default_derive);

fn doc_default_marker() -> Regex {
    Regex::new(r"\(Default:\s*(.+?)\s*\)").expect("invalid DocDefault regex")
}

fn doc_default_expr(attrs: &[syn::Attribute]) -> Expr {
    let marker = doc_default_marker();

    for attr in attrs {
        if let Some(Meta::NameValue(MetaNameValue {
            ident,
            lit: Lit::Str(doc),
            ..
        })) = attr.interpret_meta()
        {
            if ident != "doc" {
                continue;
            }

            if let Some(captures) = marker.captures(&doc.value()) {
                let default_src = &captures[1];
                return syn::parse_str(default_src)
                    .unwrap_or_else(|_| panic!("invalid default expression `{}`", default_src));
            }
        }
    }

    panic!("missing `(Default: <expr>)` marker in field doc comment");
}

fn doc_default_derive(s: synstructure::Structure) -> proc_macro2::TokenStream {
    let ast = s.ast();

    let fields = match &ast.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => &fields.named,
            _ => panic!("DocDefault only supports structs with named fields"),
        },
        _ => panic!("DocDefault only supports structs"),
    };

    let name = &ast.ident;

    let field_defaults = fields.iter().map(|field| {
        let ident = field.ident.as_ref().expect("named field without ident");
        let default_expr = doc_default_expr(&field.attrs);
        quote! { #ident: #default_expr }
    });

    quote! {
        impl Default for #name {
            fn default() -> Self {
                #name {
                    #(#field_defaults),*
                }
            }
        }
    }
}
