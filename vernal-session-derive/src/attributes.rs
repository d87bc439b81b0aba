use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Error, LitStr, Token};

#[derive(Default)]
pub struct MapperAttributes {
    pub namespace: Option<LitStr>,
}

impl Parse for MapperAttributes {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut result = Self::default();
        while !input.is_empty() {
            let lookahead = input.lookahead1();
            if lookahead.peek(kw::namespace) {
                if result.namespace.is_some() {
                    return Err(Error::new(input.span(), "Namespace is already defined!"));
                }

                let _ = input.parse::<kw::namespace>()?;
                let _ = input.parse::<Token![=]>()?;
                result.namespace = Some(input.parse()?);
            } else if lookahead.peek(Token![,]) {
                let _ = input.parse::<Token![,]>()?;
            } else {
                return Err(lookahead.error());
            }
        }

        Ok(result)
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum MethodKind {
    SelectOne,
    SelectList,
    Insert,
    Update,
    Delete,
}

pub struct MethodAttributes {
    pub kind: MethodKind,
    pub statement: Option<LitStr>,
}

impl MethodAttributes {
    pub fn is_method_attribute(attribute: &Attribute) -> bool {
        ["select", "insert", "update", "delete"]
            .iter()
            .any(|name| attribute.path().is_ident(name))
    }
}

impl TryFrom<&Attribute> for MethodAttributes {
    type Error = Error;

    fn try_from(value: &Attribute) -> Result<Self, Self::Error> {
        let path = value.path();
        let mut kind = if path.is_ident("select") {
            MethodKind::SelectOne
        } else if path.is_ident("insert") {
            MethodKind::Insert
        } else if path.is_ident("update") {
            MethodKind::Update
        } else if path.is_ident("delete") {
            MethodKind::Delete
        } else {
            return Err(Error::new_spanned(value, "Unknown mapper method attribute!"));
        };

        let mut statement = None;
        if matches!(value.meta, syn::Meta::List(_)) {
            value.parse_nested_meta(|meta| {
                if meta.path.is_ident("list") {
                    if kind != MethodKind::SelectOne {
                        return Err(meta.error("Only select methods can return lists!"));
                    }

                    kind = MethodKind::SelectList;
                } else if meta.path.is_ident("statement") {
                    statement = Some(meta.value().and_then(|value| value.parse())?);
                } else {
                    return Err(meta.error("Unknown mapper method property!"));
                }

                Ok(())
            })?;
        }

        Ok(Self { kind, statement })
    }
}

mod kw {
    use syn::custom_keyword;

    custom_keyword!(namespace);
}
