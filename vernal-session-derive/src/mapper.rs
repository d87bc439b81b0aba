use crate::attributes::{MapperAttributes, MethodAttributes, MethodKind};
use itertools::Itertools;
use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Error, FnArg, ItemTrait, Pat, Result, TraitItem, TraitItemFn};

struct MapperMethod {
    item: TraitItemFn,
    attributes: MethodAttributes,
}

fn extract_method(item: &mut TraitItemFn) -> Result<MethodAttributes> {
    if item.default.is_some() {
        return Err(Error::new(
            item.span(),
            "Mapper methods cannot have default implementations!",
        ));
    }

    if !matches!(item.sig.inputs.first(), Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none())
    {
        return Err(Error::new(
            item.sig.span(),
            "Mapper methods must take &self!",
        ));
    }

    let (method_attributes, other_attributes): (Vec<_>, Vec<_>) = item
        .attrs
        .drain(..)
        .partition(MethodAttributes::is_method_attribute);
    item.attrs = other_attributes;

    match method_attributes.as_slice() {
        [attribute] => MethodAttributes::try_from(attribute),
        [] => Err(Error::new(
            item.sig.span(),
            "Missing select, insert, update or delete attribute!",
        )),
        _ => Err(Error::new(
            item.sig.span(),
            "Only one select, insert, update or delete attribute is allowed!",
        )),
    }
}

fn generate_parameter(item: &TraitItemFn) -> Result<TokenStream> {
    let names: Vec<_> = item
        .sig
        .inputs
        .iter()
        .skip(1)
        .map(|input| match input {
            FnArg::Typed(typed) => match typed.pat.as_ref() {
                Pat::Ident(ident) => Ok(ident.ident.clone()),
                pat => Err(Error::new(pat.span(), "Only named arguments are supported!")),
            },
            FnArg::Receiver(receiver) => {
                Err(Error::new(receiver.span(), "Unexpected receiver!"))
            }
        })
        .try_collect()?;

    Ok(match names.as_slice() {
        [] => quote!(::vernal_session::mapper::Value::Null),
        [name] => quote!(::vernal_session::mapper::to_parameter(&#name)?),
        names => {
            let keys = names.iter().map(|name| name.to_string());
            quote! {
                ::vernal_session::mapper::named_parameters([
                    #((#keys, ::vernal_session::mapper::to_parameter(&#names)?)),*
                ])
            }
        }
    })
}

fn generate_method_impl(method: &MapperMethod) -> Result<TokenStream> {
    let sig = &method.item.sig;
    let name = sig.ident.to_string();
    let parameter = generate_parameter(&method.item)?;
    let call = match method.attributes.kind {
        MethodKind::SelectOne => quote!(select_one),
        MethodKind::SelectList => quote!(select_list),
        MethodKind::Insert | MethodKind::Update | MethodKind::Delete => quote!(execute),
    };

    Ok(quote! {
        #sig {
            let parameter = #parameter;
            Ok(::vernal_session::mapper::MapperProxy::#call(self, #name, &parameter)?)
        }
    })
}

fn generate_method_definition(method: &MapperMethod) -> TokenStream {
    let name = method.item.sig.ident.to_string();
    let kind = match method.attributes.kind {
        MethodKind::SelectOne => quote!(SelectOne),
        MethodKind::SelectList => quote!(SelectList),
        MethodKind::Insert => quote!(Insert),
        MethodKind::Update => quote!(Update),
        MethodKind::Delete => quote!(Delete),
    };
    let statement = method
        .attributes
        .statement
        .as_ref()
        .map(|statement| quote!(.with_statement(#statement)));

    quote! {
        ::vernal_session::mapper::MapperMethod::new(
            #name,
            ::vernal_session::mapper::MethodKind::#kind,
        )#statement
    }
}

pub fn generate_mapper(mut item: ItemTrait, args: &MapperAttributes) -> Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(Error::new(
            item.generics.span(),
            "Mappers cannot be generic!",
        ));
    }

    let methods: Vec<_> = item
        .items
        .iter_mut()
        .filter_map(|item| match item {
            TraitItem::Fn(item) => Some(item),
            _ => None,
        })
        .map(|item| {
            extract_method(item).map(|attributes| MapperMethod {
                item: item.clone(),
                attributes,
            })
        })
        .try_collect()?;

    let ident = &item.ident;
    let namespace = match &args.namespace {
        Some(namespace) => quote!(#namespace),
        None => quote!(concat!(module_path!(), "::", stringify!(#ident))),
    };

    let method_impls: Vec<_> = methods.iter().map(generate_method_impl).try_collect()?;
    let method_definitions = methods.iter().map(generate_method_definition);

    Ok(quote! {
        #item

        #[automatically_derived]
        impl #ident for ::vernal_session::mapper::MapperProxy {
            #(#method_impls)*
        }

        const _: () = {
            fn register() -> ::vernal_session::mapper::MapperDefinition {
                ::vernal_session::mapper::MapperDefinition::new(#namespace)
                    #(.with_method(#method_definitions))*
            }

            ::vernal_session::mapper::internal::submit! {
                ::vernal_session::mapper::internal::MapperRegisterer {
                    register
                }
            };
        };
    })
}
