//! Entrées synthétiques partagées par les benches.

use lumen_compiler::{Compiler, CompilerOptions};

/// Compilateur des benches : les littéraux répétés partagent leur constante.
pub fn bench_compiler() -> Compiler {
    Compiler::new(CompilerOptions { dedupe_constants: true, ..CompilerOptions::default() })
}

/// Expression arithmétique d'environ `terms` opérandes, déterministe.
///
/// Mélange les quatre opérateurs, des groupes et des négations ; les
/// littéraux restent sous 200 valeurs distinctes pour tenir dans un chunk
/// compilé par [`bench_compiler`].
pub fn synthetic_expr(terms: usize) -> String {
    const OPS: [&str; 4] = [" + ", " - ", " * ", " / "];
    let mut out = String::with_capacity(terms * 8);
    for i in 0..terms {
        if i > 0 {
            out.push_str(OPS[i % OPS.len()]);
        }
        let n = (i * 7) % 199 + 1;
        match i % 5 {
            0 => out.push_str(&format!("({n} + {})", n % 13 + 1)),
            1 => out.push_str(&format!("-{n}")),
            _ => out.push_str(&n.to_string()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_source_compiles() {
        let compiler = bench_compiler();
        for terms in [1, 10, 500, 4096] {
            let src = synthetic_expr(terms);
            assert!(!compiler.compile(&src).had_error(), "{src}");
        }
    }
}
