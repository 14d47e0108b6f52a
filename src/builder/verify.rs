//! Post-link undefined symbol check.
//!
//! A relocatable link succeeds even when symbols are still missing, so the
//! linker's exit status proves nothing. After every successful assembly the
//! component object is listed with `nm -u` and any undefined symbol not on
//! the profile's allow-list fails the component.

use crate::builder::context::BuildContext;
use crate::builder::events::BuildEvent;
use crate::core::component::{Component, Verdict};
use crate::core::error::BuildError;
use crate::core::profile::ComponentProfile;
use crate::core::unit::OrderedSet;
use crate::util::hash::sha256_file;

/// Extract undefined symbols from `nm -u` output.
///
/// Accepts `U name`, `<addr> U name` and bare `name` lines. Weak references
/// (`w`, `v`), blank lines and `file.o:` headers are ignored. Each symbol is
/// reported once, in listing order.
pub fn parse_undefined_symbols(listing: &str) -> Vec<String> {
    let mut symbols = OrderedSet::new();

    for line in listing.lines() {
        let line = line.trim();
        if line.is_empty() || line.ends_with(':') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let symbol = match fields.as_slice() {
            [name] => Some(*name),
            ["U", name] | [_, "U", name] => Some(*name),
            _ => None,
        };

        if let Some(symbol) = symbol {
            symbols.insert(symbol.to_string());
        }
    }

    symbols.as_slice().to_vec()
}

/// Symbols not covered by the profile's allow-list.
pub fn disallowed(symbols: &[String], profile: &ComponentProfile) -> Vec<String> {
    symbols
        .iter()
        .filter(|s| !profile.symbol_allowed(s))
        .cloned()
        .collect()
}

pub struct UndefinedSymbolVerifier<'a> {
    ctx: &'a BuildContext,
}

impl<'a> UndefinedSymbolVerifier<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        UndefinedSymbolVerifier { ctx }
    }

    /// Inspect `component` and record the verdict in the registry.
    pub fn verify(&self, component: &Component) -> Result<Verdict, BuildError> {
        let inspection_failed = |command: String, output: String| {
            BuildError::SymbolInspectionFailed {
                component: component.name.clone(),
                command,
                output,
            }
        };

        let command = self
            .ctx
            .toolchain()
            .undefined_symbols_command(component.output());
        let listing = command
            .run()
            .map_err(|f| inspection_failed(f.command, f.output))?;

        let symbols = disallowed(&parse_undefined_symbols(&listing), self.ctx.profile());

        let verdict = if symbols.is_empty() {
            let digest = sha256_file(component.output()).map_err(|e| {
                inspection_failed(component.output().display().to_string(), format!("{:#}", e))
            })?;
            Verdict::Pass { digest }
        } else {
            Verdict::Fail { symbols }
        };

        self.ctx.record_verdict(&component.name, verdict.clone());
        self.ctx.emit(BuildEvent::Verified {
            component: component.name.clone(),
            passed: verdict.is_pass(),
            symbols: match verdict {
                Verdict::Fail { ref symbols } => symbols.clone(),
                Verdict::Pass { .. } => Vec::new(),
            },
        });

        Ok(verdict)
    }

    /// Like [`verify`](Self::verify), but a failing verdict is an error.
    pub fn check(&self, component: &Component) -> Result<Verdict, BuildError> {
        match self.verify(component)? {
            Verdict::Fail { symbols } => Err(BuildError::UndefinedSymbolError {
                component: component.name.clone(),
                symbols,
            }),
            pass => Ok(pass),
        }
    }
}
