use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{DeriveInput, Ident, LitInt, LitStr, Type};

/// Arguments of `#[resource(...)]`.
#[derive(Default)]
pub(crate) struct ResourceArgs {
    class: Option<String>,
    route: Option<String>,
    cache: Option<CacheArgs>,
}

#[derive(Default)]
struct CacheArgs {
    ttl: u64,
    public: bool,
    warmup: bool,
}

impl ResourceArgs {
    pub(crate) fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("class") {
            let value: LitStr = meta.value()?.parse()?;
            self.class = Some(value.value());
        } else if meta.path.is_ident("route") {
            let value: LitStr = meta.value()?.parse()?;
            self.route = Some(value.value());
        } else if meta.path.is_ident("cache") {
            let mut cache = CacheArgs::default();
            meta.parse_nested_meta(|nested| {
                if nested.path.is_ident("ttl") {
                    let value: LitInt = nested.value()?.parse()?;
                    cache.ttl = value.base10_parse()?;
                } else if nested.path.is_ident("public") {
                    cache.public = true;
                } else if nested.path.is_ident("warmup") {
                    cache.warmup = true;
                } else {
                    return Err(nested.error("expected `ttl`, `public` or `warmup`"));
                }
                Ok(())
            })?;
            self.cache = Some(cache);
        } else {
            return Err(meta.error("expected `class`, `route` or `cache`"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    read_only: bool,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else {
                return Err(meta.error("expected `rename` or `read_only`"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// One declared field of the resource.
struct Declared<'a> {
    ident: &'a Ident,
    wire: String,
    /// The declared type with any `Option` stripped.
    ty: &'a Type,
    optional: bool,
    read_only: bool,
}

/// `Option<T>` → `Some(T)`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn declared_fields(input: &DeriveInput) -> syn::Result<Vec<Declared<'_>>> {
    let syn::Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[resource] can only be used on structs",
        ));
    };
    let syn::Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &data.fields,
            "#[resource] requires named fields",
        ));
    };

    named
        .named
        .iter()
        .map(|field| {
            let ident = field
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
            if ident == "id" || ident == "resource" {
                return Err(syn::Error::new_spanned(
                    ident,
                    format!("`{ident}` is reserved: the identifier is implicit"),
                ));
            }
            let attrs = parse_field_attrs(&field.attrs)?;
            let (ty, optional) = match option_inner(&field.ty) {
                Some(inner) => (inner, true),
                None => (&field.ty, false),
            };
            Ok(Declared {
                ident,
                wire: attrs.rename.unwrap_or_else(|| ident.to_string()),
                ty,
                optional,
                read_only: attrs.read_only,
            })
        })
        .collect()
}

pub(crate) fn expand(args: ResourceArgs, input: DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[resource] types cannot be generic",
        ));
    }
    let fields = declared_fields(&input)?;

    let name = &input.ident;
    let vis = &input.vis;
    let attrs = &input.attrs;
    let class = args.class.unwrap_or_else(|| name.to_string());
    let route = args
        .route
        .unwrap_or_else(|| format!("/{}s", name.to_string().to_lowercase()));

    let metadata = generate_metadata(&fields, args.cache.as_ref());
    let accessors = fields.iter().map(|field| generate_accessors(vis, field));

    Ok(quote! {
        #(#attrs)*
        #[derive(
            ::std::clone::Clone,
            ::std::fmt::Debug,
            ::std::cmp::PartialEq,
            ::std::cmp::Eq
        )]
        #vis struct #name {
            resource: ::hydra_core::Resource,
        }

        impl ::hydra_core::ResourceType for #name {
            const CLASS: &'static str = #class;
            const ROUTE: &'static str = #route;

            fn metadata() -> ::hydra_core::ClassMetadata {
                #metadata
            }

            fn from_resource(resource: ::hydra_core::Resource) -> Self {
                #name { resource }
            }

            fn resource(&self) -> &::hydra_core::Resource {
                &self.resource
            }
        }

        impl ::hydra_core::FieldType for #name {
            fn descriptor() -> ::hydra_core::FieldDescriptor {
                ::hydra_core::FieldDescriptor::reference(#class)
            }

            fn from_field(value: ::hydra_core::FieldValue) -> ::std::option::Option<Self> {
                match value {
                    ::hydra_core::FieldValue::Resource(resource) if resource.class() == #class => {
                        ::std::option::Option::Some(#name { resource })
                    }
                    _ => ::std::option::Option::None,
                }
            }

            fn into_field(self) -> ::hydra_core::FieldValue {
                ::hydra_core::FieldValue::Resource(self.resource)
            }
        }

        impl ::std::convert::From<#name> for ::hydra_core::Resource {
            fn from(value: #name) -> Self {
                value.resource
            }
        }

        impl #name {
            #vis fn id(&self) -> ::std::option::Option<::hydra_core::ResourceId> {
                self.resource.id()
            }

            #(#accessors)*
        }
    })
}

fn generate_metadata(fields: &[Declared<'_>], cache: Option<&CacheArgs>) -> TokenStream {
    let declarations = fields.iter().map(|field| {
        let wire = &field.wire;
        let ty = field.ty;
        let read_only = field.read_only.then(|| quote! { .read_only() });
        quote! {
            .with_field(#wire, <#ty as ::hydra_core::FieldType>::descriptor() #read_only)
        }
    });

    let cache = cache.map(|cache| {
        let ttl = cache.ttl;
        let public = cache.public.then(|| quote! { .public() });
        let warmup = cache.warmup.then(|| quote! { .with_warmup() });
        quote! {
            .with_cache(
                ::hydra_core::CachePolicy::enabled(::std::time::Duration::from_secs(#ttl))
                    #public
                    #warmup
            )
        }
    });

    quote! {
        ::hydra_core::ClassMetadata::new(<Self as ::hydra_core::ResourceType>::CLASS)
            #(#declarations)*
            #cache
    }
}

fn generate_accessors(vis: &syn::Visibility, field: &Declared<'_>) -> TokenStream {
    let getter = field.ident;
    let setter = format_ident!("set_{}", field.ident);
    let wire = &field.wire;
    let ty = field.ty;
    let param = if field.optional {
        quote! { ::std::option::Option<#ty> }
    } else {
        quote! { #ty }
    };

    quote! {
        #vis fn #getter(&self) -> ::std::result::Result<::std::option::Option<#ty>, ::hydra_core::ClientError> {
            self.resource.get_typed::<#ty>(#wire)
        }

        #vis fn #setter(&self, value: #param) -> ::std::result::Result<(), ::hydra_core::ClientError> {
            self.resource.set_typed::<#ty>(#wire, value)
        }
    }
}
