//! The translator shared by the expression, pattern and query passes.
//!
//! Those three passes are mutually recursive (a FILTER holds an expression,
//! an EXISTS expression holds a group, a group holds a sub-select), so they
//! live as `impl` blocks on one `Translator` spread across their modules.

use crate::TranslateOptions;
use crate::ast::Prefixes;
use crate::compact::Compactor;

pub struct Translator<'a> {
    pub(crate) prefixes: &'a Prefixes,
    pub(crate) compactor: Compactor,
}

impl<'a> Translator<'a> {
    pub fn new(prefixes: &'a Prefixes) -> Self {
        Self::with_options(prefixes, &TranslateOptions::default())
    }

    pub fn with_options(prefixes: &'a Prefixes, options: &TranslateOptions) -> Self {
        Self {
            prefixes,
            compactor: Compactor::with_native_types(prefixes, options.native_types),
        }
    }
}
