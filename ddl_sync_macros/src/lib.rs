//! Procedural macros for ddl_sync
//!
//! `#[derive(Model)]` and `#[derive(DbEnum)]` record what a struct or enum
//! declares so the ddl_sync registry can build the desired schema from it.
//! Type mapping and naming happen in the library, not here.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr, Token};

/// Derive `ddl_sync::models::SyncModel` for a struct with named fields
#[proc_macro_derive(Model, attributes(model, column, index, unique_index))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `ddl_sync::models::SyncEnum` for a fieldless enum
#[proc_macro_derive(DbEnum, attributes(db_enum))]
pub fn derive_db_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_db_enum(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn option_string(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v.to_string()) },
        None => quote! { ::core::option::Option::None },
    }
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut table_name = None;
    let mut indexes = Vec::new();

    for attr in &input.attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table_name = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported model attribute"))
                }
            })?;
        } else if attr.path().is_ident("index") {
            indexes.push(index_tokens(attr, quote! { Plain })?);
        } else if attr.path().is_ident("unique_index") {
            indexes.push(index_tokens(attr, quote! { Unique })?);
        }
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Model only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Model only supports structs")),
    };

    let mut field_tokens = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        if let Some(tokens) = field_definition(ident, &field.ty, &field.attrs)? {
            field_tokens.push(tokens);
        }
    }

    let table_name = option_string(&table_name);

    Ok(quote! {
        impl #impl_generics ::ddl_sync::models::SyncModel for #name #ty_generics #where_clause {
            fn model_info() -> ::ddl_sync::models::ModelInfo {
                ::ddl_sync::models::ModelInfo {
                    name: #name_str.to_string(),
                    table_name: #table_name,
                    fields: vec![#(#field_tokens),*],
                    indexes: vec![#(#indexes),*],
                    file_path: ::core::option::Option::None,
                }
            }
        }
    })
}

fn index_tokens(attr: &Attribute, kind: TokenStream2) -> syn::Result<TokenStream2> {
    let columns = attr.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)?;
    if columns.is_empty() {
        return Err(syn::Error::new_spanned(attr, "index needs at least one column"));
    }
    let columns = columns.iter().map(|c| c.to_string());

    Ok(quote! {
        ::ddl_sync::models::IndexDefinition {
            kind: ::ddl_sync::schema::types::IndexKind::#kind,
            columns: vec![#(#columns.to_string()),*],
        }
    })
}

fn field_definition(
    ident: &Ident,
    ty: &syn::Type,
    attrs: &[Attribute],
) -> syn::Result<Option<TokenStream2>> {
    let mut primary_key = false;
    let mut auto_increment = false;
    let mut unique = false;
    let mut skip = false;
    let mut data_type = None;
    let mut default = None;
    let mut references = None;
    let mut on_delete = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                auto_increment = true;
            } else if meta.path.is_ident("unique") {
                unique = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("data_type") {
                data_type = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                default = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("foreign_key") {
                references = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("on_delete") {
                on_delete = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }

    if auto_increment && data_type.is_some() {
        return Err(syn::Error::new_spanned(
            ident,
            "data_type cannot be combined with auto_increment",
        ));
    }

    let foreign_key = match (references, on_delete) {
        (Some(references), on_delete) => {
            let on_delete = option_string(&on_delete);
            quote! {
                ::core::option::Option::Some(::ddl_sync::models::ForeignKeyDefinition {
                    references: #references.to_string(),
                    on_delete: #on_delete,
                })
            }
        }
        (None, Some(_)) => {
            return Err(syn::Error::new_spanned(ident, "on_delete requires foreign_key"));
        }
        (None, None) => quote! { ::core::option::Option::None },
    };

    let name = ident.to_string();
    let rust_type = ty.to_token_stream().to_string();
    let data_type = option_string(&data_type);
    let default = option_string(&default);

    Ok(Some(quote! {
        ::ddl_sync::models::FieldDefinition {
            name: #name.to_string(),
            rust_type: ::ddl_sync::models::definition::normalize_type(#rust_type),
            data_type: #data_type,
            primary_key: #primary_key,
            auto_increment: #auto_increment,
            unique: #unique,
            default: #default,
            foreign_key: #foreign_key,
        }
    }))
}

fn expand_db_enum(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();

    let mut db_name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("db_enum")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                db_name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported db_enum attribute"))
            }
        })?;
    }

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(name, "DbEnum only supports enums"));
    };

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                &variant.ident,
                "database enum variants cannot carry data",
            ));
        }

        let mut rename = None;
        for attr in variant.attrs.iter().filter(|a| a.path().is_ident("db_enum")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported db_enum variant attribute"))
                }
            })?;
        }

        let variant_name = variant.ident.to_string();
        let rename = option_string(&rename);
        variants.push(quote! {
            ::ddl_sync::models::VariantDefinition {
                name: #variant_name.to_string(),
                rename: #rename,
            }
        });
    }

    let db_name = option_string(&db_name);

    Ok(quote! {
        impl ::ddl_sync::models::SyncEnum for #name {
            fn enum_info() -> ::ddl_sync::models::EnumInfo {
                ::ddl_sync::models::EnumInfo {
                    name: #name_str.to_string(),
                    db_name: #db_name,
                    variants: vec![#(#variants),*],
                    file_path: ::core::option::Option::None,
                }
            }
        }
    })
}
