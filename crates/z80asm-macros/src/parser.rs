use syn::{punctuated::Punctuated, Expr, ExprLit, Lit, Token};

/// Source lines collected from the macro input, with `{N}` markers
/// rewritten to `__argN`.
#[derive(Debug, Clone, Default)]
pub struct AsmSource {
    pub lines: Vec<String>,
    /// One more than the highest marker index seen.
    pub placeholder_count: usize,
}

impl AsmSource {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn placeholder_name(index: usize) -> String {
    format!("__arg{}", index)
}

pub fn parse_asm_lines(exprs: &Punctuated<Expr, Token![,]>) -> Result<AsmSource, String> {
    let mut source = AsmSource::default();
    collect_lines(exprs, &mut source)?;

    for (index, line) in source.lines.iter().enumerate() {
        z80asm_common::parser::parse_line(line, index + 1)
            .map_err(|d| format!("`{}`: {}", line.trim(), d.error))?;
    }

    Ok(source)
}

fn collect_lines(exprs: &Punctuated<Expr, Token![,]>, source: &mut AsmSource) -> Result<(), String> {
    for expr in exprs {
        match expr {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => {
                let (line, count) = substitute_markers(&s.value())?;
                source.placeholder_count = source.placeholder_count.max(count);
                source.lines.push(line);
            }

            // ["label", [lines...]] places a label in front of a block.
            Expr::Array(arr) => {
                let mut elems = arr.elems.iter();
                let label = match elems.next() {
                    Some(Expr::Lit(ExprLit {
                        lit: Lit::Str(s), ..
                    })) => s.value(),
                    _ => return Err("Block array must start with a string label".to_string()),
                };
                let inner = match (elems.next(), elems.next()) {
                    (Some(Expr::Array(inner)), None) => inner,
                    _ => return Err("Block must have an array of lines as second element".to_string()),
                };
                source.lines.push(format!("{}:", label));
                collect_lines(&inner.elems, source)?;
            }

            _ => return Err("Unsupported expression type in assembly".to_string()),
        }
    }
    Ok(())
}

/// Rewrites `{N}` to `__argN`; returns the line and one more than the
/// highest index used (0 if none).
fn substitute_markers(line: &str) -> Result<(String, usize), String> {
    let mut out = String::with_capacity(line.len());
    let mut count = 0;
    let mut rest = line;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("Unclosed placeholder in `{}`", line))?;
        let index: usize = after[..close]
            .trim()
            .parse()
            .map_err(|_| format!("Invalid placeholder `{{{}}}` in `{}`", &after[..close], line))?;
        out.push_str(&placeholder_name(index));
        count = count.max(index + 1);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok((out, count))
}
