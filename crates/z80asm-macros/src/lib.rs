use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ExprArray};

mod parser;
use parser::{parse_asm_lines, placeholder_name};

fn parse_error(e: String) -> TokenStream {
    let error_msg = format!("Parse error: {}", e);
    TokenStream::from(quote! {
        compile_error!(#error_msg)
    })
}

/// Assembles Z80 source lines with the bundled instruction table.
///
/// ```ignore
/// let code = z80_asm!(["ld a,16", ["loop", ["dec a", "jr nz,loop"]], "ret"]);
/// ```
#[proc_macro]
pub fn z80_asm(input: TokenStream) -> TokenStream {
    let input_array = parse_macro_input!(input as ExprArray);

    let source = match parse_asm_lines(&input_array.elems) {
        Ok(source) => source,
        Err(e) => return parse_error(e),
    };
    if source.placeholder_count > 0 {
        return parse_error("Placeholders are only allowed in z80_asm_interpolator!".to_string());
    }

    let text = source.text();
    let expanded = quote! {
        {
            z80asm_common::Assembler::new()
                .assemble_source(#text)
                .into_bytes()
                .expect("Assembly failed")
        }
    };

    TokenStream::from(expanded)
}

/// Like [`z80_asm!`], but `{N}` markers become closure parameters.
///
/// ```ignore
/// let load = z80_asm_interpolator!(["ld a,{0}", "ld ({1}),a"]);
/// let code = load(Box::new(7u8), Box::new(0x8000u16));
/// ```
#[proc_macro]
pub fn z80_asm_interpolator(input: TokenStream) -> TokenStream {
    let input_array = parse_macro_input!(input as ExprArray);

    let source = match parse_asm_lines(&input_array.elems) {
        Ok(source) => source,
        Err(e) => return parse_error(e),
    };

    let text = source.text();
    let param_names: Vec<_> = (0..source.placeholder_count)
        .map(|i| syn::Ident::new(&format!("arg{}", i), proc_macro2::Span::call_site()))
        .collect();
    let defines: Vec<TokenStream2> = param_names
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let name = placeholder_name(i);
            quote! {
                .define(#name, z80asm_common::Z80Encodable::to_operand_value(&*#param))
            }
        })
        .collect();

    let expanded = quote! {
        {
            let source: &'static str = #text;

            move |#(#param_names: Box<dyn z80asm_common::Z80Encodable>),*| -> Vec<u8> {
                z80asm_common::Assembler::new()
                    #(#defines)*
                    .assemble_source(source)
                    .into_bytes()
                    .expect("Assembly failed")
            }
        }
    };

    TokenStream::from(expanded)
}
