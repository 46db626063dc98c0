//! Filter derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let model = get_model_path(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Filter can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Filter can only be derived for structs",
            ));
        }
    };

    let mut condition_pushes: Vec<TokenStream> = Vec::with_capacity(fields.len());
    let mut keyword_entries: Vec<TokenStream> = Vec::new();
    let mut override_entries: Vec<TokenStream> = Vec::new();
    let mut search_field: Option<syn::Ident> = None;

    for field in fields.iter() {
        let field_ident = field.ident.clone().unwrap();
        let field_name = field_ident.unraw().to_string();
        let attr = parse_field_attr(field)?;

        if attr.is_skip {
            continue;
        }

        if attr.is_search || is_search_query(&field.ty) {
            if search_field.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "more than one search meta field",
                ));
            }
            search_field = Some(field_ident);
            continue;
        }

        let mode = match &attr.matches {
            Some(lit) => match_mode(lit)?,
            None => quote! { anyorm::Match::Contains },
        };
        let column = match &attr.column {
            Some(column) => quote! { Some(#column) },
            None => quote! { None },
        };

        condition_pushes.push(quote! {
            if let Some(predicate) = anyorm::FilterField::predicate(&self.#field_ident, #mode) {
                conditions.push(anyorm::Condition::new(#field_name, #column, predicate));
            }
        });

        if attr.is_keyword {
            keyword_entries.push(quote! {
                anyorm::KeywordField {
                    field: #field_name,
                    column: #column,
                    mode: #mode,
                }
            });
        }
        if let Some(column) = &attr.column {
            override_entries.push(quote! { (#field_name, #column) });
        }
    }

    let conditions_body = if condition_pushes.is_empty() {
        quote! { Vec::new() }
    } else {
        quote! {
            let mut conditions = Vec::new();
            #(#condition_pushes)*
            conditions
        }
    };

    let keyword_fields_impl = if keyword_entries.is_empty() {
        quote! {}
    } else {
        quote! {
            fn keyword_fields() -> &'static [anyorm::KeywordField] {
                static KEYWORD_FIELDS: &[anyorm::KeywordField] = &[#(#keyword_entries),*];
                KEYWORD_FIELDS
            }
        }
    };

    let overrides_impl = if override_entries.is_empty() {
        quote! {}
    } else {
        quote! {
            fn overrides() -> &'static [(&'static str, &'static str)] {
                static OVERRIDES: &[(&'static str, &'static str)] = &[#(#override_entries),*];
                OVERRIDES
            }
        }
    };

    let search_impl = match &search_field {
        Some(ident) => quote! {
            fn search(&self) -> Option<&anyorm::SearchQuery> {
                Some(&self.#ident)
            }
        },
        None => quote! {},
    };

    Ok(quote! {
        impl #impl_generics anyorm::Filter for #name #ty_generics #where_clause {
            type Model = #model;

            fn conditions(&self) -> ::std::vec::Vec<anyorm::Condition> {
                #conditions_body
            }

            #keyword_fields_impl

            #overrides_impl

            #search_impl
        }
    })
}

fn get_model_path(input: &DeriveInput) -> Result<syn::Path> {
    for attr in &input.attrs {
        if attr.path().is_ident("orm") {
            if let Ok(nested) = attr.parse_args::<syn::MetaNameValue>() {
                if nested.path.is_ident("model") {
                    if let syn::Expr::Path(expr) = &nested.value {
                        return Ok(expr.path.clone());
                    }
                }
            }
        }
    }
    Err(syn::Error::new_spanned(
        input,
        "Filter requires #[orm(model = ModelType)] attribute",
    ))
}

fn match_mode(lit: &syn::LitStr) -> Result<TokenStream> {
    match lit.value().as_str() {
        "exact" => Ok(quote! { anyorm::Match::Exact }),
        "prefix" => Ok(quote! { anyorm::Match::Prefix }),
        "suffix" => Ok(quote! { anyorm::Match::Suffix }),
        "contains" => Ok(quote! { anyorm::Match::Contains }),
        other => Err(syn::Error::new(
            lit.span(),
            format!("unknown match mode '{other}', expected exact, prefix, suffix, or contains"),
        )),
    }
}

/// Helper struct for parsing field attributes
#[derive(Default)]
struct FilterFieldAttr {
    is_keyword: bool,
    is_search: bool,
    is_skip: bool,
    matches: Option<syn::LitStr>,
    column: Option<String>,
}

impl syn::parse::Parse for FilterFieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut parsed = FilterFieldAttr::default();

        loop {
            if input.is_empty() {
                break;
            }

            let ident = syn::Ident::parse_any(input)?;
            if ident == "keyword" {
                parsed.is_keyword = true;
            } else if ident == "search" {
                parsed.is_search = true;
            } else if ident == "skip" {
                parsed.is_skip = true;
            } else if ident == "matches" || ident == "column" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                if ident == "matches" {
                    parsed.matches = Some(value);
                } else {
                    parsed.column = Some(value.value());
                }
            } else {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("unknown orm attribute '{ident}'"),
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(parsed)
    }
}

/// Fold every `#[orm(...)]` attribute on a field into one resolved set.
fn parse_field_attr(field: &syn::Field) -> Result<FilterFieldAttr> {
    let mut merged = FilterFieldAttr::default();

    for attr in &field.attrs {
        if attr.path().is_ident("orm") {
            if let syn::Meta::List(meta_list) = &attr.meta {
                let parsed = syn::parse2::<FilterFieldAttr>(meta_list.tokens.clone())?;
                merged.is_keyword |= parsed.is_keyword;
                merged.is_search |= parsed.is_search;
                merged.is_skip |= parsed.is_skip;
                if parsed.matches.is_some() {
                    merged.matches = parsed.matches;
                }
                if parsed.column.is_some() {
                    merged.column = parsed.column;
                }
            }
        }
    }

    Ok(merged)
}

fn is_search_query(ty: &syn::Type) -> bool {
    let syn::Type::Path(type_path) = ty else {
        return false;
    };
    type_path
        .path
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "SearchQuery")
}
