use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Fields, Index};

macro_rules! has_attr {
    ($F:expr, $Attr:expr) => {
        $F.attrs.iter().any(|a| a.path().is_ident($Attr))
    };
}

/// Implements [wdopt::nn_traits::UpdateParams] for a struct, naming every
/// parameter after its field path.
///
/// Mark tensor fields with `#[param]` and fields holding other models with
/// `#[module]`. Unmarked fields are ignored by optimizers. Names are joined
/// with `.`, tuple struct fields are named by index.
///
/// The impl is generic over `Elem` and `Dev`. If the struct already has type
/// parameters with those names they are reused, so both of these work:
///
/// ```ignore
/// # use wdopt::prelude::*;
/// #[derive(Debug, Clone, wdopt::UpdateParams)]
/// pub struct LayerNorm<Elem: Dtype, Dev: Device<Elem>> {
///     #[param]
///     pub gamma: Tensor<Elem, Dev>,
///     #[param]
///     pub beta: Tensor<Elem, Dev>,
///     pub epsilon: f64,
/// }
///
/// #[derive(Debug, Clone, wdopt::UpdateParams)]
/// pub struct Encoder {
///     #[module]
///     pub layer_norm: LayerNorm<f32, Cpu>,
///     #[param]
///     pub bias: Tensor<f32, Cpu>,
/// }
/// ```
///
/// `Encoder` has the parameters `layer_norm.gamma`, `layer_norm.beta` and `bias`.
#[proc_macro_derive(UpdateParams, attributes(param, module))]
pub fn update_params(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let mut input = parse_macro_input!(input as DeriveInput);

    let struct_name = input.ident;

    let mut custom_generics = input.generics.clone();
    if !custom_generics.params.iter().any(
        |param| matches!(param, syn::GenericParam::Type(type_param) if type_param.ident == "Elem"),
    ) {
        custom_generics
            .params
            .push(parse_quote!(Elem: ::wdopt::prelude::Dtype));
    }

    if !custom_generics.params.iter().any(
        |param| matches!(param, syn::GenericParam::Type(type_param) if type_param.ident == "Dev"),
    ) {
        custom_generics
            .params
            .push(parse_quote!(Dev: ::wdopt::prelude::Device<Elem>));
    }

    let where_clause = input.generics.make_where_clause();
    let (updates, visits) = match &input.data {
        Data::Struct(ref obj) => match obj.fields {
            Fields::Named(ref fields) => {
                let mut updates = Vec::new();
                let mut visits = Vec::new();
                for f in fields.named.iter() {
                    if !has_attr!(f, "module") && !has_attr!(f, "param") {
                        continue;
                    }
                    let name = &f.ident;
                    let ty = &f.ty;
                    let name_str = name.as_ref().map(|n| n.to_string());
                    where_clause
                        .predicates
                        .push(parse_quote!(#ty: ::wdopt::nn_traits::UpdateParams<Elem, Dev>));
                    updates.push(quote_spanned!(f.span()=>::wdopt::nn_traits::UpdateParams::<Elem, Dev>::try_update_params(
                        &mut self.#name,
                        &::wdopt::nn_traits::join_location(location, #name_str),
                        optimizer,
                        gradients,
                        missing_tensors,
                    )?;));
                    visits.push(quote_spanned!(f.span()=>::wdopt::nn_traits::UpdateParams::<Elem, Dev>::visit_params(
                        &self.#name,
                        &::wdopt::nn_traits::join_location(location, #name_str),
                        f,
                    );));
                }
                (quote! { #(#updates)* }, quote! { #(#visits)* })
            }
            Fields::Unnamed(ref fields) => {
                let mut updates = Vec::new();
                let mut visits = Vec::new();
                for (i, f) in fields.unnamed.iter().enumerate() {
                    if !has_attr!(f, "module") && !has_attr!(f, "param") {
                        continue;
                    }
                    let index = Index::from(i);
                    let index_str = i.to_string();
                    let ty = &f.ty;
                    where_clause
                        .predicates
                        .push(parse_quote!(#ty: ::wdopt::nn_traits::UpdateParams<Elem, Dev>));
                    updates.push(quote_spanned!(f.span()=>::wdopt::nn_traits::UpdateParams::<Elem, Dev>::try_update_params(
                        &mut self.#index,
                        &::wdopt::nn_traits::join_location(location, #index_str),
                        optimizer,
                        gradients,
                        missing_tensors,
                    )?;));
                    visits.push(quote_spanned!(f.span()=>::wdopt::nn_traits::UpdateParams::<Elem, Dev>::visit_params(
                        &self.#index,
                        &::wdopt::nn_traits::join_location(location, #index_str),
                        f,
                    );));
                }
                (quote! { #(#updates)* }, quote! { #(#visits)* })
            }
            Fields::Unit => Default::default(),
        },
        Data::Enum(_) => unimplemented!("UpdateParams not implemented for enums."),
        Data::Union(_) => unimplemented!("UpdateParams not implemented for unions."),
    };

    let (impl_generics, _, _) = custom_generics.split_for_impl();
    let (_, ty_generics, where_clause) = input.generics.split_for_impl();

    proc_macro::TokenStream::from(quote! {
        impl #impl_generics ::wdopt::nn_traits::UpdateParams<Elem, Dev> for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn try_update_params<_Model, Optim: ::wdopt::nn_traits::Optimizer<_Model, Elem, Dev>>(
                &mut self,
                location: &str,
                optimizer: &mut Optim,
                gradients: &::wdopt::tensor::Gradients<Elem, Dev>,
                missing_tensors: &mut Vec<::wdopt::tensor::UniqueId>,
            ) -> Result<(), ::wdopt::tensor::Error> {
                #updates
                Ok(())
            }

            #[allow(unused_variables)]
            fn visit_params<_Visit: FnMut(&str, &::wdopt::tensor::Tensor<Elem, Dev>)>(
                &self,
                location: &str,
                f: &mut _Visit,
            ) {
                #visits
            }
        }
    })
}
