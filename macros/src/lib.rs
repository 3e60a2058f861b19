use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Lit, Token};

/// Derive environment binding for a struct with named fields
///
/// Every `name = value` pair inside `#[env(...)]` is kept as a raw tag and read
/// at run time by the active tag names (`key`, `default` and `prefix` unless
/// renamed). `flatten` binds a nested struct at the current level and `skip`
/// leaves the field alone.
#[proc_macro_derive(Env, attributes(env))]
pub fn derive_env(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_env(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_env(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "#[derive(Env)] only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "#[derive(Env)] only supports structs",
            ));
        }
    };

    let mut visits = Vec::new();
    let mut known_keys = Vec::new();

    for field in fields {
        let config = parse_field_config(&field.attrs)?;
        if config.skip {
            continue;
        }

        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let field_type = &field.ty;
        let name = ident.to_string().trim_start_matches("r#").to_string();
        let type_name = quote!(#field_type).to_string().replace(' ', "");
        let flatten = config.flatten;
        let tag_names = config.tags.iter().map(|(tag, _)| tag);
        let tag_values = config.tags.iter().map(|(_, value)| value);

        // Keep cfg attributes so feature-gated fields stay gated
        let cfg_attrs: Vec<&Attribute> = field
            .attrs
            .iter()
            .filter(|attr| attr.path().is_ident("cfg"))
            .collect();

        let site = quote! {
            &::envbind::Site {
                name: #name,
                ty: #type_name,
                tags: &[#((#tag_names, #tag_values)),*],
                flatten: #flatten,
            }
        };

        visits.push(quote! {
            #(#cfg_attrs)*
            ::envbind::walk::visit(&mut self.#ident, #site, cx, &mut errors);
        });
        known_keys.push(quote! {
            #(#cfg_attrs)*
            ::envbind::collection::collect_known_keys::<#field_type>(#site, prefix, tags, keys);
        });
    }

    Ok(quote! {
        impl #impl_generics ::envbind::Walk for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables, unused_mut)]
            fn walk(
                &mut self,
                cx: &mut ::envbind::walk::Context<'_>,
            ) -> ::std::result::Result<(), ::envbind::AggregateError> {
                let mut errors = ::envbind::AggregateError::new();
                #(#visits)*
                errors.into_result()
            }
        }

        impl #impl_generics ::envbind::Field for #struct_name #ty_generics #where_clause {
            const SHAPE: ::envbind::Shape = ::envbind::Shape::Struct;

            fn zero() -> ::std::option::Option<Self> {
                ::std::option::Option::Some(<Self as ::std::default::Default>::default())
            }

            fn walker(&mut self) -> ::std::option::Option<&mut dyn ::envbind::Walk> {
                ::std::option::Option::Some(self)
            }

            #[allow(unused_variables)]
            fn known_keys(
                prefix: &str,
                tags: &::envbind::TagNames,
                keys: &mut ::envbind::collection::KnownKeys,
            ) {
                #(#known_keys)*
            }
        }

        impl #impl_generics ::envbind::Load for #struct_name #ty_generics #where_clause {}
    })
}

#[derive(Debug, Default)]
struct FieldConfig {
    tags: Vec<(String, String)>,
    flatten: bool,
    skip: bool,
}

/// Parse every #[env(name = "value", flatten, skip)] attribute on a field
fn parse_field_config(attrs: &[Attribute]) -> syn::Result<FieldConfig> {
    let mut config = FieldConfig::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("env")) {
        attr.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .ok_or_else(|| meta.error("expected identifier"))?
                .to_string();
            let name = name.trim_start_matches("r#").to_string();

            if meta.input.peek(Token![=]) {
                meta.input.parse::<Token![=]>()?;
                let value = match meta.input.parse::<Lit>()? {
                    Lit::Str(s) => s.value(),
                    Lit::Int(i) => i.base10_digits().to_string(),
                    Lit::Float(f) => f.base10_digits().to_string(),
                    Lit::Bool(b) => b.value.to_string(),
                    _ => return Err(meta.error("tag values must be string, number or bool literals")),
                };
                if config.tags.iter().any(|(tag, _)| *tag == name) {
                    return Err(meta.error(format!("duplicate tag `{}`", name)));
                }
                config.tags.push((name, value));
                return Ok(());
            }

            match name.as_str() {
                "flatten" => config.flatten = true,
                "skip" => config.skip = true,
                _ => {
                    return Err(meta.error(format!(
                        "unknown flag `{}`, expected `flatten`, `skip` or `name = \"value\"`",
                        name
                    )))
                }
            }
            Ok(())
        })?;
    }

    Ok(config)
}
