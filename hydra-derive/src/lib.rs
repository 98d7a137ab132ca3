use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod expand;

/// Attribute macro declaring a typed resource.
///
/// The annotated struct is replaced by a handle around a
/// `hydra_core::Resource`; every named field becomes a declared field of the
/// class with a getter and a setter, and the type implements
/// `hydra_core::ResourceType` and `hydra_core::FieldType` (so that other
/// resources can reference it).
///
/// # Example
///
/// ```ignore
/// use hydra_core::resource;
///
/// #[resource(class = "Sport", route = "/sports", cache(ttl = 3600, public, warmup))]
/// pub struct Sport {
///     name: String,
///     #[field(rename = "createdAt", read_only)]
///     created_at: chrono::DateTime<chrono::Utc>,
///     universe: Option<Universe>,
///     tags: Vec<String>,
/// }
///
/// // sport.name()? -> Option<String>, sport.set_name("Vélo".to_string())?
/// ```
///
/// # Attributes
///
/// - `class = "Name"` - Class name (defaults to the struct name)
/// - `route = "/prefix"` - Route prefix of the class (defaults to `/{lowercase name}s`)
/// - `cache(ttl = secs, public, warmup)` - Persistent cache policy
/// - `#[field(rename = "name")]` - Wire name of a field
/// - `#[field(read_only)]` - Never sent on create or update
///
/// `Option<T>` fields are declared as `T`; every getter returns an `Option`.
#[proc_macro_attribute]
pub fn resource(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let mut args = expand::ResourceArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    match expand::expand(args, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
