//! Reading model declarations out of Rust source
//!
//! Understands the same attribute grammar the derive macros accept:
//!
//! ```text
//! #[derive(Model)]
//! #[model(table = "api_keys")]
//! #[index(key, created_at)]
//! #[unique_index(created_at, key)]
//! struct ApiKey {
//!     #[column(primary_key, auto_increment)]
//!     id: i32,
//!     #[column(unique, data_type = "uuid")]
//!     key: String,
//!     #[column(foreign_key = "applications(id)", on_delete = "CASCADE")]
//!     application_id: i32,
//!     #[column(default = "NOW()")]
//!     created_at: DateTime<Utc>,
//! }
//!
//! #[derive(DbEnum)]
//! #[db_enum(name = "content_type")]
//! enum ContentType { Markdown, #[db_enum(rename = "plain")] Text }
//! ```

use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Fields, Ident, Item, ItemEnum, ItemStruct, LitStr, Token};

use crate::models::definition::{
    normalize_type, EnumInfo, FieldDefinition, ForeignKeyDefinition, IndexDefinition, ModelInfo,
    VariantDefinition,
};
use crate::schema::types::IndexKind;

/// Declarations found in one source file
#[derive(Debug, Default)]
pub struct Declarations {
    pub models: Vec<ModelInfo>,
    pub enums: Vec<EnumInfo>,
}

/// Parse a whole file, descending into inline modules
pub fn parse_source(source: &str) -> syn::Result<Declarations> {
    let file = syn::parse_file(source)?;
    let mut declarations = Declarations::default();
    collect_items(&file.items, &mut declarations)?;
    Ok(declarations)
}

fn collect_items(items: &[Item], declarations: &mut Declarations) -> syn::Result<()> {
    for item in items {
        match item {
            Item::Struct(item_struct) => {
                if has_derive(&item_struct.attrs, "Model")? {
                    declarations.models.push(parse_model(item_struct)?);
                }
            }
            Item::Enum(item_enum) => {
                if has_derive(&item_enum.attrs, "DbEnum")? {
                    declarations.enums.push(parse_db_enum(item_enum)?);
                }
            }
            Item::Mod(item_mod) => {
                if let Some((_, items)) = &item_mod.content {
                    collect_items(items, declarations)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Whether `#[derive(..)]` lists `name`, bare or path-qualified
pub fn has_derive(attrs: &[Attribute], name: &str) -> syn::Result<bool> {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.segments.last().map_or(false, |s| s.ident == name) {
                found = true;
            }
            Ok(())
        })?;
    }
    Ok(found)
}

pub fn parse_model(item: &ItemStruct) -> syn::Result<ModelInfo> {
    let mut table_name = None;
    let mut indexes = Vec::new();

    for attr in &item.attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let value: LitStr = meta.value()?.parse()?;
                    table_name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported model attribute"))
                }
            })?;
        } else if attr.path().is_ident("index") {
            indexes.push(parse_index(attr, IndexKind::Plain)?);
        } else if attr.path().is_ident("unique_index") {
            indexes.push(parse_index(attr, IndexKind::Unique)?);
        }
    }

    let Fields::Named(named) = &item.fields else {
        return Err(syn::Error::new_spanned(
            &item.ident,
            "models must be structs with named fields",
        ));
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else { continue };
        if let Some(definition) = parse_field(ident, &field.ty, &field.attrs)? {
            fields.push(definition);
        }
    }

    Ok(ModelInfo {
        name: item.ident.to_string(),
        table_name,
        fields,
        indexes,
        file_path: None,
    })
}

fn parse_index(attr: &Attribute, kind: IndexKind) -> syn::Result<IndexDefinition> {
    let columns = attr.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)?;
    if columns.is_empty() {
        return Err(syn::Error::new_spanned(attr, "index needs at least one column"));
    }

    Ok(IndexDefinition {
        kind,
        columns: columns.iter().map(|c| c.to_string()).collect(),
    })
}

/// `None` when the field is marked `skip`
fn parse_field(
    ident: &Ident,
    ty: &syn::Type,
    attrs: &[Attribute],
) -> syn::Result<Option<FieldDefinition>> {
    let mut definition = FieldDefinition {
        name: ident.to_string(),
        rust_type: normalize_type(&ty.to_token_stream().to_string()),
        ..Default::default()
    };
    let mut skip = false;
    let mut references = None;
    let mut on_delete = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                definition.primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                definition.auto_increment = true;
            } else if meta.path.is_ident("unique") {
                definition.unique = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("data_type") {
                definition.data_type = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                definition.default = Some(meta.value()?.parse::<LitStr>()?.value());
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

    match (references, on_delete) {
        (Some(references), on_delete) => {
            definition.foreign_key = Some(ForeignKeyDefinition { references, on_delete });
        }
        (None, Some(_)) => {
            return Err(syn::Error::new_spanned(ident, "on_delete requires foreign_key"));
        }
        (None, None) => {}
    }

    Ok(Some(definition))
}

pub fn parse_db_enum(item: &ItemEnum) -> syn::Result<EnumInfo> {
    let mut db_name = None;
    for attr in item.attrs.iter().filter(|a| a.path().is_ident("db_enum")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                db_name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported db_enum attribute"))
            }
        })?;
    }

    let mut variants = Vec::new();
    for variant in &item.variants {
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

        variants.push(VariantDefinition {
            name: variant.ident.to_string(),
            rename,
        });
    }

    Ok(EnumInfo {
        name: item.ident.to_string(),
        db_name,
        variants,
        file_path: None,
    })
}
