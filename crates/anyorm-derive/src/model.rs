//! Model derive macro implementation

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

/// One persisted field, attributes resolved.
struct PersistedField {
    ident: syn::Ident,
    name: String,
    column: String,
    json: String,
    key: bool,
    updatable: bool,
    version: bool,
    bools: Option<(String, String)>,
    /// The field type is `Option<_>`; unset reads as absent, scanning is
    /// lenient about the column missing from a projected row.
    optional: bool,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table_name = get_table_name(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let mut persisted: Vec<PersistedField> = Vec::with_capacity(fields.len());
    let mut ignored: Vec<syn::Ident> = Vec::new();
    let mut version_seen = false;

    for field in fields.iter() {
        let field_ident = field.ident.clone().unwrap();
        let field_name = field_ident.unraw().to_string();
        let attr = parse_field_attr(field)?;

        if attr.is_ignore {
            if attr.is_key
                || attr.is_version
                || attr.is_readonly
                || attr.column.is_some()
                || attr.json.is_some()
                || attr.bools.is_some()
            {
                return Err(syn::Error::new_spanned(
                    field,
                    "#[orm(ignore)] cannot be combined with other orm attributes",
                ));
            }
            ignored.push(field_ident);
            continue;
        }

        let optional = option_inner(&field.ty).is_some();

        if attr.is_key && optional {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "key fields cannot be Option",
            ));
        }
        if attr.is_version {
            if attr.is_key {
                return Err(syn::Error::new_spanned(
                    field,
                    "a key field cannot be the version field",
                ));
            }
            if !is_integer_type(&field.ty) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "version field must be a plain integer type (i16, i32, i64, or u32)",
                ));
            }
            if version_seen {
                return Err(syn::Error::new_spanned(
                    field,
                    "more than one #[orm(version)] field",
                ));
            }
            version_seen = true;
        }
        if attr.bools.is_some() && !is_bool_type(&field.ty) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "#[orm(bools(..))] requires a bool or Option<bool> field",
            ));
        }

        let column = attr
            .column
            .unwrap_or_else(|| field_name.to_snake_case());
        let json = attr.json.unwrap_or_else(|| field_name.clone());

        persisted.push(PersistedField {
            ident: field_ident,
            name: field_name,
            column,
            json,
            key: attr.is_key,
            updatable: !attr.is_key && !attr.is_readonly,
            version: attr.is_version,
            bools: attr.bools,
            optional,
        });
    }

    if persisted.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "Model requires at least one persisted field",
        ));
    }
    if !persisted.iter().any(|f| f.key) {
        return Err(syn::Error::new_spanned(
            &input,
            "Model requires at least one #[orm(key)] field",
        ));
    }

    let field_defs = persisted.iter().map(|f| {
        let PersistedField {
            name,
            column,
            json,
            key,
            updatable,
            version,
            ..
        } = f;
        let bools = match &f.bools {
            Some((true_lit, false_lit)) => quote! { Some((#true_lit, #false_lit)) },
            None => quote! { None },
        };
        quote! {
            anyorm::FieldDef {
                name: #name,
                column: #column,
                json: #json,
                key: #key,
                updatable: #updatable,
                version: #version,
                bools: #bools,
            }
        }
    });

    let value_arms = persisted.iter().enumerate().map(|(idx, f)| {
        let index = proc_macro2::Literal::usize_unsuffixed(idx);
        let ident = &f.ident;
        if f.optional {
            quote! { #index => self.#ident.clone().map(anyorm::Value::from), }
        } else {
            quote! { #index => Some(anyorm::Value::from(self.#ident.clone())), }
        }
    });

    let key_fields: Vec<&PersistedField> = persisted.iter().filter(|f| f.key).collect();
    let key_expr = if let [single] = key_fields.as_slice() {
        let ident = &single.ident;
        quote! { anyorm::Key::Single(anyorm::Value::from(self.#ident.clone())) }
    } else {
        let parts = key_fields.iter().map(|f| {
            let ident = &f.ident;
            let column = &f.column;
            quote! { (#column.to_string(), anyorm::Value::from(self.#ident.clone())) }
        });
        quote! { anyorm::Key::Composite(vec![#(#parts),*]) }
    };

    let scan_fields = persisted
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let column = &f.column;
            match (&f.bools, f.optional) {
                (Some((true_lit, false_lit)), false) => quote! {
                    #ident: match row.value(#column) {
                        Some(v) => anyorm::row::decode_sentinel_bool(v, #true_lit, #false_lit)
                            .map_err(|m| anyorm::OrmError::decode(#column, m))?,
                        None => {
                            return Err(anyorm::OrmError::decode(
                                #column,
                                "column missing from result set",
                            ));
                        }
                    }
                },
                (Some((true_lit, false_lit)), true) => quote! {
                    #ident: match row.value(#column) {
                        Some(anyorm::Value::Null) | None => None,
                        Some(v) => Some(
                            anyorm::row::decode_sentinel_bool(v, #true_lit, #false_lit)
                                .map_err(|m| anyorm::OrmError::decode(#column, m))?,
                        ),
                    }
                },
                (None, true) => quote! {
                    #ident: match row.value(#column) {
                        Some(v) => anyorm::FromValue::from_value(v)
                            .map_err(|m| anyorm::OrmError::decode(#column, m))?,
                        None => None,
                    }
                },
                (None, false) => quote! {
                    #ident: row.try_get(#column)?
                },
            }
        })
        .chain(ignored.iter().map(|ident| {
            quote! { #ident: Default::default() }
        }));

    Ok(quote! {
        impl #impl_generics anyorm::Model for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table_name;

            fn fields() -> &'static [anyorm::FieldDef] {
                static FIELDS: &[anyorm::FieldDef] = &[#(#field_defs),*];
                FIELDS
            }

            fn value(&self, index: usize) -> Option<anyorm::Value> {
                match index {
                    #(#value_arms)*
                    _ => None,
                }
            }

            fn key(&self) -> anyorm::Key {
                #key_expr
            }

            fn from_row(row: &anyorm::Row) -> anyorm::OrmResult<Self> {
                Ok(Self {
                    #(#scan_fields),*
                })
            }
        }
    })
}

fn get_table_name(input: &DeriveInput) -> Result<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("orm") {
            if let Ok(nested) = attr.parse_args::<syn::MetaNameValue>() {
                if nested.path.is_ident("table") {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit),
                        ..
                    }) = &nested.value
                    {
                        return Ok(lit.value());
                    }
                }
            }
        }
    }
    Err(syn::Error::new_spanned(
        input,
        "Model requires #[orm(table = \"table_name\")] attribute",
    ))
}

/// Helper struct for parsing field attributes
#[derive(Default)]
struct FieldAttr {
    is_key: bool,
    is_version: bool,
    is_ignore: bool,
    is_readonly: bool,
    column: Option<String>,
    json: Option<String>,
    bools: Option<(String, String)>,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut parsed = FieldAttr::default();

        // Comma-separated bare markers, key = "value" pairs, and the
        // bools("t", "f") literal pair.
        loop {
            if input.is_empty() {
                break;
            }

            let ident = syn::Ident::parse_any(input)?;
            if ident == "key" {
                parsed.is_key = true;
            } else if ident == "version" {
                parsed.is_version = true;
            } else if ident == "ignore" {
                parsed.is_ignore = true;
            } else if ident == "readonly" {
                parsed.is_readonly = true;
            } else if ident == "bools" {
                let content;
                syn::parenthesized!(content in input);
                let true_lit: syn::LitStr = content.parse()?;
                let _: syn::Token![,] = content.parse()?;
                let false_lit: syn::LitStr = content.parse()?;
                parsed.bools = Some((true_lit.value(), false_lit.value()));
            } else if ident == "column" || ident == "json" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                if ident == "column" {
                    parsed.column = Some(value.value());
                } else {
                    parsed.json = Some(value.value());
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
fn parse_field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();

    for attr in &field.attrs {
        if attr.path().is_ident("orm") {
            if let syn::Meta::List(meta_list) = &attr.meta {
                let parsed = syn::parse2::<FieldAttr>(meta_list.tokens.clone())?;
                merged.is_key |= parsed.is_key;
                merged.is_version |= parsed.is_version;
                merged.is_ignore |= parsed.is_ignore;
                merged.is_readonly |= parsed.is_readonly;
                if parsed.column.is_some() {
                    merged.column = parsed.column;
                }
                if parsed.json.is_some() {
                    merged.json = parsed.json;
                }
                if parsed.bools.is_some() {
                    merged.bools = parsed.bools;
                }
            }
        }
    }

    Ok(merged)
}

/// The inner type of `Option<T>`, when the field type is one.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn is_integer_type(ty: &syn::Type) -> bool {
    let syn::Type::Path(type_path) = ty else {
        return false;
    };
    ["i16", "i32", "i64", "u32"]
        .iter()
        .any(|name| type_path.path.is_ident(name))
}

fn is_bool_type(ty: &syn::Type) -> bool {
    let bare = option_inner(ty).unwrap_or(ty);
    matches!(bare, syn::Type::Path(type_path) if type_path.path.is_ident("bool"))
}
