//! Deterministic artifact names.
//!
//! ```text
//! selector       Box`1              -> Box
//! instantiation  Map`2<Int, String> -> Map_Int_String
//! collision      Map_Int_String     -> Map_Int_String_1, Map_Int_String_2, ...
//! ```

use monomorph_core::QualifiedName;

/// Joins name segments and precedes numeric collision suffixes.
pub const SEPARATOR: char = '_';

/// Base name of a template's selector artifact.
pub fn selector_name(template: &QualifiedName) -> String {
    template.short_name().to_string()
}

/// Base name of an instantiation artifact.
pub fn instantiation_name(template: &QualifiedName, args: &[&QualifiedName]) -> String {
    let mut name = template.short_name().to_string();
    for arg in args {
        name.push(SEPARATOR);
        name.push_str(arg.short_name());
    }
    name
}

/// The `attempt`-th candidate for a base name; attempt 0 is the base itself.
pub fn candidate(base: &str, attempt: usize) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}{SEPARATOR}{attempt}")
    }
}
